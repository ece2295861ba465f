//! WebAssembly bindings for seqdraw

use serde::Serialize;
use seqdraw_core::{Document, DrawInstruction, SectionSummary, ViewState};
use wasm_bindgen::prelude::*;

#[derive(Serialize)]
struct DiagnosticJson {
    line: usize,
    message: String,
}

#[derive(Serialize)]
struct RenderJson<'a> {
    width: f64,
    height: f64,
    instructions: &'a [DrawInstruction],
    diagnostics: Vec<DiagnosticJson>,
    /// Sections the editor can offer to collapse
    sections: Vec<SectionSummary>,
}

fn diagnostics_json(diagnostics: &[seqdraw_core::Diagnostic]) -> Vec<DiagnosticJson> {
    diagnostics
        .iter()
        .map(|d| DiagnosticJson {
            line: d.line,
            message: d.kind.to_string(),
        })
        .collect()
}

fn view_state(collapsed: &[u32], expanded: &[u32]) -> ViewState {
    ViewState {
        collapsed_sections: collapsed.iter().map(|&line| line as usize).collect(),
        expanded_notes: expanded.iter().map(|&line| line as usize).collect(),
    }
}

/// Lay out a sequence diagram as JSON draw instructions
///
/// # Arguments
/// * `input` - The sequence diagram source code
/// * `collapsed` - Lines of the top-level sections to collapse
/// * `expanded` - Lines of the notes to show in full
///
/// # Returns
/// The rendering as JSON, or an error message
#[wasm_bindgen]
pub fn render(input: &str, collapsed: Vec<u32>, expanded: Vec<u32>) -> Result<String, String> {
    let doc = seqdraw_core::parse(input);
    let view = view_state(&collapsed, &expanded);
    let rendering = seqdraw_core::render(&doc, &view).map_err(|e| e.to_string())?;

    let json = RenderJson {
        width: rendering.width,
        height: rendering.height,
        instructions: &rendering.instructions,
        diagnostics: diagnostics_json(&rendering.diagnostics),
        sections: doc.top_level_sections(),
    };
    serde_json::to_string(&json).map_err(|e| e.to_string())
}

/// Parse a sequence diagram and return its document model as JSON
///
/// # Arguments
/// * `input` - The sequence diagram source code
///
/// # Returns
/// The parsed document as JSON, or an error message
#[wasm_bindgen]
pub fn parse_to_json(input: &str) -> Result<String, String> {
    let doc: Document = seqdraw_core::parse(input);
    serde_json::to_string(&doc).map_err(|e| e.to_string())
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(text: &str) -> serde_json::Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_render() {
        let result = render("Alice -> Bob: Hello", vec![], vec![]);
        assert!(result.is_ok());
        let value = json(&result.unwrap());
        let instructions = value["instructions"].as_array().unwrap();
        assert!(instructions.iter().any(|i| i["type"] == "arrow" && i["label"] == "Hello"));
        assert!(value["width"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_render_empty() {
        let result = render("", vec![], vec![]);
        assert!(result.unwrap_err().contains("nothing to render"));
    }

    #[test]
    fn test_render_collapsed() {
        let input = "== One ==\nA -> B: a\n== Two ==\nB -> C: b";
        let value = json(&render(input, vec![3], vec![]).unwrap());
        let dividers: Vec<&str> = value["instructions"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|i| i["type"] == "section_divider")
            .map(|i| i["label"].as_str().unwrap())
            .collect();
        assert_eq!(dividers, ["One", "Two (1 hidden)"]);
        assert_eq!(value["sections"][1]["message_count"], 1);
    }

    #[test]
    fn test_render_diagnostics() {
        let value = json(&render("A -> B: x\nend", vec![], vec![]).unwrap());
        assert_eq!(value["diagnostics"][0]["line"], 2);
        assert_eq!(
            value["diagnostics"][0]["message"],
            "`end` without an open block"
        );
    }

    #[test]
    fn test_parse_to_json() {
        let result = parse_to_json("Alice -> Bob: Hello");
        assert!(result.is_ok());
        let value = json(&result.unwrap());
        assert_eq!(value["participants"][0]["id"], "Alice");
        assert_eq!(value["elements"][0]["type"], "message");
    }

    #[test]
    fn test_version() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
    }
}
