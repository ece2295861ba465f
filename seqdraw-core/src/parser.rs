//! Parser for the seqdraw sequence diagram notation
//!
//! Parsing is line based. Each trimmed line is classified by a small nom
//! parser, then applied to a [`ParserState`] that tracks the open blocks by
//! indentation. Problems never abort the document: the offending line is
//! dropped and a [`Diagnostic`] is recorded.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_until, take_while1, take_while_m_n},
    character::complete::{char, i32 as signed, space0, space1},
    combinator::{opt, value},
    multi::{separated_list0, separated_list1},
    sequence::{delimited, preceded},
    IResult, Parser,
};
use std::collections::HashMap;

use crate::ast::*;

/// Columns a tab counts for when measuring indentation
const TAB_WIDTH: usize = 4;

/// One classified source line
#[derive(Debug, Clone, PartialEq)]
enum Line {
    Title(String),
    Option {
        key: String,
        value: String,
    },
    Participant {
        kind: ParticipantKind,
        name: String,
        alias: Option<String>,
        position: Option<i32>,
    },
    Message {
        from: String,
        to: String,
        label: String,
        return_label: Option<String>,
        is_async: bool,
    },
    BlockOpen {
        kind: BlockKind,
        label: String,
    },
    Else {
        label: String,
    },
    End,
    Section {
        label: String,
        color: Option<String>,
    },
    /// `text` is `None` for the opening line of a multi-line note
    Note {
        side: NoteSide,
        participants: Vec<String>,
        text: Option<String>,
    },
    Group {
        name: String,
        color: Option<String>,
        members: Vec<String>,
    },
}

impl Line {
    fn is_directive(&self) -> bool {
        matches!(self, Line::Title(_) | Line::Option { .. })
    }
}

/// Parse a complete diagram.
///
/// Never fails: unparseable lines end up in [`Document::diagnostics`].
pub fn parse(input: &str) -> Document {
    let mut state = ParserState::default();
    let lines: Vec<&str> = input.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let raw = lines[i];
        let line_no = i + 1;
        let trimmed = raw.trim();
        i += 1;

        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
            continue;
        }

        let parsed = match parse_line(trimmed) {
            Ok((_, parsed)) => parsed,
            Err(_) => {
                state.diagnose(line_no, DiagnosticKind::UnrecognizedLine(trimmed.to_string()));
                continue;
            }
        };

        // Multi-line note: swallow the body up to `end note`
        if let Line::Note {
            side,
            participants,
            text: None,
        } = parsed
        {
            let mut body = Vec::new();
            let mut terminated = false;
            while i < lines.len() {
                let note_line = lines[i].trim();
                i += 1;
                if note_line.eq_ignore_ascii_case("end note") {
                    terminated = true;
                    break;
                }
                body.push(note_line);
            }
            if !terminated {
                state.diagnose(line_no, DiagnosticKind::UnterminatedNote);
            }
            let indent = indentation(raw);
            state.apply(
                indent,
                line_no,
                Line::Note {
                    side,
                    participants,
                    text: Some(body.join("\n")),
                },
            );
            continue;
        }

        state.apply(indentation(raw), line_no, parsed);
    }

    state.finish()
}

fn indentation(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

/// A block whose closer has not been seen yet
struct OpenBlock {
    indent: usize,
    block: Block,
    in_else: bool,
}

/// Everything the line loop threads from one line to the next
#[derive(Default)]
struct ParserState {
    title: Option<String>,
    title_line: Option<usize>,
    options: DiagramOptions,
    participants: Vec<Participant>,
    participant_index: HashMap<String, usize>,
    messages: Vec<Message>,
    groups: Vec<Group>,
    diagnostics: Vec<Diagnostic>,
    root: Vec<Element>,
    open: Vec<OpenBlock>,
    structural_seen: bool,
}

impl ParserState {
    fn apply(&mut self, indent: usize, line_no: usize, line: Line) {
        if line.is_directive() {
            if self.structural_seen {
                let word = match &line {
                    Line::Title(_) => "title",
                    _ => "option",
                };
                self.diagnose(line_no, DiagnosticKind::LateDirective(word.to_string()));
            } else {
                self.apply_directive(line_no, line);
            }
            return;
        }
        self.structural_seen = true;

        match line {
            Line::End => {
                self.close_while(|open| open.indent > indent);
                if self.open.is_empty() {
                    self.diagnose(line_no, DiagnosticKind::UnmatchedEnd);
                } else {
                    self.close_top();
                }
            }
            Line::Else { label } => {
                self.close_while(|open| open.indent > indent);
                let kind = match self.open.last_mut() {
                    Some(open) if open.block.kind == BlockKind::If && !open.in_else => {
                        open.in_else = true;
                        open.block.else_line = Some(line_no);
                        open.block.else_label = (!label.is_empty()).then_some(label);
                        None
                    }
                    Some(open) if open.in_else => Some(DiagnosticKind::DuplicateElse),
                    _ => Some(DiagnosticKind::ElseWithoutIf),
                };
                if let Some(kind) = kind {
                    self.diagnose(line_no, kind);
                }
            }
            line => {
                self.close_while(|open| open.indent >= indent);
                self.apply_structural(indent, line_no, line);
            }
        }
    }

    fn apply_directive(&mut self, line_no: usize, line: Line) {
        match line {
            Line::Title(title) => {
                self.title = Some(title);
                self.title_line = Some(line_no);
            }
            Line::Option { key, value } => {
                let key_lower = key.to_ascii_lowercase();
                let value_lower = value.to_ascii_lowercase();
                match (key_lower.as_str(), value_lower.as_str()) {
                    ("activations", "on" | "true" | "show") => self.options.activations = true,
                    ("activations", "off" | "false" | "hide") => self.options.activations = false,
                    ("notes", "collapsed" | "collapse") => self.options.notes_collapsed = true,
                    ("notes", "expanded" | "expand") => self.options.notes_collapsed = false,
                    _ => self.diagnose(
                        line_no,
                        DiagnosticKind::UnknownOption(format!("{}={}", key, value)),
                    ),
                }
            }
            _ => {}
        }
    }

    fn apply_structural(&mut self, indent: usize, line_no: usize, line: Line) {
        match line {
            Line::Participant {
                kind,
                name,
                alias,
                position,
            } => {
                let (id, label) = match alias {
                    Some(alias) => (alias, name),
                    None => (name.clone(), name),
                };
                let index = self.mention(&id, line_no);
                let participant = &mut self.participants[index];
                participant.kind = kind;
                participant.label = label;
                participant.position = position;
            }
            Line::Message {
                from,
                to,
                label,
                return_label,
                is_async,
            } => {
                self.mention(&from, line_no);
                self.mention(&to, line_no);
                let index = self.messages.len();
                self.messages.push(Message {
                    from,
                    to,
                    label,
                    return_label,
                    is_async,
                    line: line_no,
                });
                self.push_element(Element::Message { index });
            }
            Line::BlockOpen { kind, label } => {
                self.open.push(OpenBlock {
                    indent,
                    block: Block {
                        kind,
                        label,
                        children: Vec::new(),
                        else_children: Vec::new(),
                        else_label: None,
                        else_line: None,
                        line: line_no,
                    },
                    in_else: false,
                });
            }
            Line::Section { label, color } => {
                self.push_element(Element::Section(Section {
                    label,
                    color,
                    line: line_no,
                }));
            }
            Line::Note {
                side,
                participants,
                text,
            } => {
                for p in &participants {
                    self.mention(p, line_no);
                }
                self.push_element(Element::Note(Note {
                    side,
                    participants,
                    text: text.unwrap_or_default(),
                    line: line_no,
                }));
            }
            Line::Group {
                name,
                color,
                members,
            } => {
                if members.is_empty() {
                    self.diagnose(line_no, DiagnosticKind::EmptyGroup(name.clone()));
                }
                for m in &members {
                    self.mention(m, line_no);
                }
                let index = self.groups.len();
                self.groups.push(Group {
                    name,
                    members,
                    color,
                    line: line_no,
                });
                self.push_element(Element::Group { index });
            }
            Line::Title(_) | Line::Option { .. } | Line::Else { .. } | Line::End => {}
        }
    }

    /// Register a participant on first mention and return its index
    fn mention(&mut self, id: &str, line_no: usize) -> usize {
        if let Some(&index) = self.participant_index.get(id) {
            return index;
        }
        let index = self.participants.len();
        self.participants.push(Participant {
            id: id.to_string(),
            label: id.to_string(),
            kind: ParticipantKind::Plain,
            position: None,
            line: line_no,
        });
        self.participant_index.insert(id.to_string(), index);
        index
    }

    fn push_element(&mut self, element: Element) {
        match self.open.last_mut() {
            Some(open) if open.in_else => open.block.else_children.push(element),
            Some(open) => open.block.children.push(element),
            None => self.root.push(element),
        }
    }

    fn close_top(&mut self) {
        if let Some(open) = self.open.pop() {
            self.push_element(Element::Block(open.block));
        }
    }

    fn close_while(&mut self, mut should_close: impl FnMut(&OpenBlock) -> bool) {
        while self.open.last().is_some_and(&mut should_close) {
            self.close_top();
        }
    }

    fn diagnose(&mut self, line: usize, kind: DiagnosticKind) {
        tracing::debug!(line, %kind, "diagram diagnostic");
        self.diagnostics.push(Diagnostic::new(line, kind));
    }

    fn finish(mut self) -> Document {
        while !self.open.is_empty() {
            self.close_top();
        }
        Document {
            title: self.title,
            title_line: self.title_line,
            options: self.options,
            participants: self.participants,
            messages: self.messages,
            elements: self.root,
            groups: self.groups,
            diagnostics: self.diagnostics,
        }
    }
}

fn fail(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))
}

/// Parse a single trimmed line
fn parse_line(input: &str) -> IResult<&str, Line> {
    alt((
        parse_section,
        parse_message,
        parse_note,
        parse_group,
        parse_participant_decl,
        parse_else,
        parse_end,
        parse_block_open,
        parse_option,
        parse_title,
    ))
    .parse(input)
}

/// Parse title
fn parse_title(input: &str) -> IResult<&str, Line> {
    let (input, _) = tag_no_case("title").parse(input)?;
    let (input, _) = space1.parse(input)?;
    Ok(("", Line::Title(input.trim().to_string())))
}

/// Parse option: `option key=value`
fn parse_option(input: &str) -> IResult<&str, Line> {
    let (input, _) = tag_no_case("option").parse(input)?;
    let (input, _) = space1.parse(input)?;
    let (input, key) = take_while1(|c: char| c.is_alphanumeric() || c == '_').parse(input)?;
    let (input, _) = (space0, char('='), space0).parse(input)?;
    let (_input, value) = take_while1(|c: char| !c.is_whitespace()).parse(input)?;

    Ok((
        "",
        Line::Option {
            key: key.to_string(),
            value: value.to_string(),
        },
    ))
}

/// Parse participant declaration: `database DB`, `service "Billing API" as Billing position -1`
fn parse_participant_decl(input: &str) -> IResult<&str, Line> {
    let (rest, word) = take_while1(|c: char| c.is_ascii_alphabetic()).parse(input)?;
    let kind = ParticipantKind::from_keyword(word).ok_or_else(|| fail(input))?;
    let (rest, _) = space1.parse(rest)?;
    let (rest, name) = parse_name(rest)?;
    let (rest, alias) = opt(preceded(
        (space1, tag_no_case("as"), space1),
        parse_identifier,
    ))
    .parse(rest)?;
    let (rest, position) =
        opt(preceded((space1, tag_no_case("position"), space1), signed)).parse(rest)?;
    if !rest.trim().is_empty() {
        return Err(fail(rest));
    }

    Ok((
        "",
        Line::Participant {
            kind,
            name: name.to_string(),
            alias: alias.map(|s| s.to_string()),
            position,
        },
    ))
}

/// Parse a name (quoted or unquoted)
fn parse_name(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_until("\""), char('"')),
        parse_identifier,
    ))
    .parse(input)
}

/// Parse an identifier (alphanumeric + underscore)
fn parse_identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_').parse(input)
}

/// Parse a message: `A -> B: text`, `A ~> B: text`, `A -> B: text <- reply`
fn parse_message(input: &str) -> IResult<&str, Line> {
    let (input, from) = parse_name(input)?;
    let (input, _) = space0.parse(input)?;
    let (input, is_async) = alt((value(false, tag("->")), value(true, tag("~>")))).parse(input)?;
    let (input, _) = space0.parse(input)?;
    let (input, to) = parse_name(input)?;
    let (input, _) = space0.parse(input)?;
    let (input, colon) = opt(char(':')).parse(input)?;
    if colon.is_none() && !input.trim().is_empty() {
        return Err(fail(input));
    }
    let (label, return_label) = split_return_label(input.trim());

    Ok((
        "",
        Line::Message {
            from: from.to_string(),
            to: to.to_string(),
            label,
            return_label,
            is_async,
        },
    ))
}

/// Split `request <- reply` into its call and return labels
fn split_return_label(text: &str) -> (String, Option<String>) {
    match text.rfind("<-") {
        Some(pos) => {
            let reply = text[pos + 2..].trim();
            let label = text[..pos].trim().to_string();
            (label, (!reply.is_empty()).then(|| reply.to_string()))
        }
        None => (text.to_string(), None),
    }
}

/// Split a trailing `(color)` off a label
fn split_color(text: &str) -> (String, Option<String>) {
    let text = text.trim();
    if let Some(body) = text.strip_suffix(')') {
        if let Some(open) = body.rfind('(') {
            let color = body[open + 1..].trim();
            if !color.is_empty() {
                return (body[..open].trim().to_string(), Some(color.to_string()));
            }
        }
    }
    (text.to_string(), None)
}

/// Parse section divider: `== Label ==`, `=== Label (blue) ===`
fn parse_section(input: &str) -> IResult<&str, Line> {
    let (input, _) = take_while_m_n(2, usize::MAX, |c: char| c == '=').parse(input)?;
    let body = input.trim_end();
    let inner = body.trim_end_matches('=');
    if body.len() - inner.len() < 2 {
        return Err(fail(input));
    }
    let (label, color) = split_color(inner);
    Ok(("", Line::Section { label, color }))
}

/// Parse note: `note left of A: text`, `note over A, B: text`, or a multi-line note opener
fn parse_note(input: &str) -> IResult<&str, Line> {
    let (input, _) = tag_no_case("note").parse(input)?;
    let (input, _) = space1.parse(input)?;

    let (input, side) = alt((
        value(
            NoteSide::Left,
            (tag_no_case("left"), space1, tag_no_case("of")),
        ),
        value(
            NoteSide::Right,
            (tag_no_case("right"), space1, tag_no_case("of")),
        ),
        value(NoteSide::Over, tag_no_case("over")),
    ))
    .parse(input)?;
    let (input, _) = space1.parse(input)?;

    let (input, participants) =
        separated_list1((space0, char(','), space0), parse_name).parse(input)?;
    let (input, _) = space0.parse(input)?;
    let (input, colon) = opt(char(':')).parse(input)?;

    let text = match colon {
        // A literal `\n` breaks an inline note into lines
        Some(_) => Some(input.trim().replace("\\n", "\n")),
        None if input.trim().is_empty() => None,
        None => return Err(fail(input)),
    };

    Ok((
        "",
        Line::Note {
            side,
            participants: participants.into_iter().map(|s| s.to_string()).collect(),
            text,
        },
    ))
}

/// Parse group: `group Backend (blue): API, DB`
fn parse_group(input: &str) -> IResult<&str, Line> {
    let (input, _) = tag_no_case("group").parse(input)?;
    let (input, _) = space1.parse(input)?;
    let (input, name) = parse_name(input)?;
    let (input, _) = space0.parse(input)?;
    let (input, color) =
        opt(delimited(char('('), take_until(")"), char(')'))).parse(input)?;
    let (input, _) = (space0, char(':'), space0).parse(input)?;
    let (input, members) =
        separated_list0((space0, char(','), space0), parse_name).parse(input)?;
    if !input.trim().is_empty() {
        return Err(fail(input));
    }

    Ok((
        "",
        Line::Group {
            name: name.to_string(),
            color: color.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            members: members.into_iter().map(|s| s.to_string()).collect(),
        },
    ))
}

/// Parse block start: `if condition`, `loop condition`, `opt`, `par`, `critical`
fn parse_block_open(input: &str) -> IResult<&str, Line> {
    let (rest, word) = take_while1(|c: char| c.is_ascii_alphabetic()).parse(input)?;
    let kind = BlockKind::from_keyword(word).ok_or_else(|| fail(input))?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return Err(fail(input));
    }
    Ok((
        "",
        Line::BlockOpen {
            kind,
            label: rest.trim().to_string(),
        },
    ))
}

/// Parse else: `else`, `else condition`
fn parse_else(input: &str) -> IResult<&str, Line> {
    let (rest, _) = tag_no_case("else").parse(input)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return Err(fail(input));
    }
    Ok((
        "",
        Line::Else {
            label: rest.trim().to_string(),
        },
    ))
}

/// Parse end
fn parse_end(input: &str) -> IResult<&str, Line> {
    if input.trim().eq_ignore_ascii_case("end") {
        Ok(("", Line::End))
    } else {
        Err(fail(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn message_labels(doc: &Document) -> Vec<&str> {
        doc.messages.iter().map(|m| m.label.as_str()).collect()
    }

    #[test]
    fn test_simple_message() {
        let doc = parse("Alice -> Bob: Hello");
        assert_eq!(doc.messages.len(), 1);
        let m = &doc.messages[0];
        assert_eq!(m.from, "Alice");
        assert_eq!(m.to, "Bob");
        assert_eq!(m.label, "Hello");
        assert!(!m.is_async);
        assert_eq!(m.line, 1);
        assert_eq!(doc.elements, vec![Element::Message { index: 0 }]);
        assert!(doc.diagnostics.is_empty());
    }

    #[test]
    fn test_async_message_and_return_label() {
        let doc = parse("A ~> B: notify\nA->B: fetch user <- user record");
        assert!(doc.messages[0].is_async);
        assert_eq!(doc.messages[0].return_label, None);
        assert_eq!(doc.messages[1].label, "fetch user");
        assert_eq!(doc.messages[1].return_label.as_deref(), Some("user record"));
    }

    #[test]
    fn test_message_without_label() {
        let doc = parse("A -> B");
        assert_eq!(doc.messages[0].label, "");
        assert!(doc.diagnostics.is_empty());
    }

    #[test]
    fn test_participants_in_first_mention_order() {
        let doc = parse("C -> A: x\nB -> C: y");
        let ids: Vec<&str> = doc.participants.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["C", "A", "B"]);
    }

    #[test]
    fn test_participant_decl() {
        let doc = parse("database \"User DB\" as DB position -1\nactor User\nUser -> DB: query");
        assert_eq!(doc.participants.len(), 2);
        let db = doc.participant("DB").unwrap();
        assert_eq!(db.label, "User DB");
        assert_eq!(db.kind, ParticipantKind::Database);
        assert_eq!(db.position, Some(-1));
        assert_eq!(doc.participant("User").unwrap().kind, ParticipantKind::Actor);
    }

    #[test]
    fn test_redeclaration_keeps_discovery_order() {
        let doc = parse("A -> B: x\nservice B position 0");
        let ids: Vec<&str> = doc.participants.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["A", "B"]);
        assert_eq!(doc.participants[1].kind, ParticipantKind::Service);
        assert_eq!(doc.participants[1].position, Some(0));
    }

    #[test]
    fn test_note() {
        let doc = parse("note over Alice, Bob: Hello");
        match &doc.elements[0] {
            Element::Note(note) => {
                assert_eq!(note.side, NoteSide::Over);
                assert_eq!(note.participants, ["Alice", "Bob"]);
                assert_eq!(note.text, "Hello");
            }
            other => panic!("Expected Note, got {:?}", other),
        }
        // Notes declare participants implicitly
        assert_eq!(doc.participants.len(), 2);
    }

    #[test]
    fn test_inline_note_line_breaks() {
        let doc = parse("note right of A: first\\nsecond");
        match &doc.elements[0] {
            Element::Note(note) => assert_eq!(note.text, "first\nsecond"),
            other => panic!("Expected Note, got {:?}", other),
        }
    }

    #[test]
    fn test_multiline_note() {
        let input = "note left of Alice\nLine 1\nLine 2\nend note\nAlice -> Bob: hi";
        let doc = parse(input);
        match &doc.elements[0] {
            Element::Note(note) => {
                assert_eq!(note.side, NoteSide::Left);
                assert_eq!(note.text, "Line 1\nLine 2");
                assert_eq!(note.line, 1);
            }
            other => panic!("Expected Note, got {:?}", other),
        }
        assert_eq!(doc.messages[0].line, 5);
    }

    #[test]
    fn test_unterminated_note() {
        let doc = parse("note right of A\nstill going");
        assert_eq!(
            doc.diagnostics,
            vec![Diagnostic::new(1, DiagnosticKind::UnterminatedNote)]
        );
        assert_eq!(doc.elements.len(), 1);
    }

    #[test]
    fn test_indented_block_with_else() {
        let input = "\
if authorized
  A -> B: ok
  loop each item
    B -> C: fetch
else denied
  A -> D: reject
A -> E: after";
        let doc = parse(input);
        assert!(doc.diagnostics.is_empty(), "{:?}", doc.diagnostics);
        assert_eq!(doc.elements.len(), 2);
        match &doc.elements[0] {
            Element::Block(block) => {
                assert_eq!(block.kind, BlockKind::If);
                assert_eq!(block.label, "authorized");
                assert_eq!(block.children.len(), 2);
                assert!(matches!(&block.children[1], Element::Block(inner) if inner.kind == BlockKind::Loop));
                assert_eq!(block.else_label.as_deref(), Some("denied"));
                assert_eq!(block.else_line, Some(5));
                assert_eq!(block.else_children, vec![Element::Message { index: 2 }]);
            }
            other => panic!("Expected Block, got {:?}", other),
        }
        assert_eq!(doc.elements[1], Element::Message { index: 3 });
        assert_eq!(message_labels(&doc), ["ok", "fetch", "reject", "after"]);
    }

    #[test]
    fn test_explicit_end_closes_block() {
        let doc = parse("opt cached\n  A -> B: hit\n  end\nA -> C: next");
        assert!(doc.diagnostics.is_empty());
        assert_eq!(doc.elements.len(), 2);
    }

    #[test]
    fn test_unmatched_end_is_reported_and_ignored() {
        let doc = parse("A -> B: x\nend\nB -> C: y");
        assert_eq!(
            doc.diagnostics,
            vec![Diagnostic::new(2, DiagnosticKind::UnmatchedEnd)]
        );
        assert_eq!(doc.messages.len(), 2);
        assert_eq!(doc.elements.len(), 2);
    }

    #[test]
    fn test_else_without_if() {
        let doc = parse("loop forever\n  A -> B: x\nelse\n  A -> C: y");
        assert_eq!(
            doc.diagnostics,
            vec![Diagnostic::new(3, DiagnosticKind::ElseWithoutIf)]
        );
        // The bad else is dropped, so the next line stays in the loop
        assert_eq!(doc.elements.len(), 1);
        match &doc.elements[0] {
            Element::Block(block) => {
                assert_eq!(block.children.len(), 2);
                assert!(!block.has_else());
            }
            other => panic!("Expected Block, got {:?}", other),
        }

        let doc = parse("else\nA -> B: x");
        assert_eq!(doc.diagnostics[0].kind, DiagnosticKind::ElseWithoutIf);
    }

    #[test]
    fn test_duplicate_else() {
        let doc = parse("if a\n  A -> B: x\nelse\n  A -> B: y\nelse\n  A -> B: z");
        assert_eq!(doc.diagnostics[0], Diagnostic::new(5, DiagnosticKind::DuplicateElse));
        match &doc.elements[0] {
            Element::Block(block) => assert_eq!(block.else_children.len(), 2),
            other => panic!("Expected Block, got {:?}", other),
        }
    }

    #[test]
    fn test_section() {
        let doc = parse("== Login ==\nA -> B: x\n=== Checkout (blue) ===");
        assert_eq!(
            doc.elements[0],
            Element::Section(Section {
                label: "Login".to_string(),
                color: None,
                line: 1
            })
        );
        assert_eq!(
            doc.elements[2],
            Element::Section(Section {
                label: "Checkout".to_string(),
                color: Some("blue".to_string()),
                line: 3
            })
        );
    }

    #[test]
    fn test_group() {
        let doc = parse("group Backend (green): API, DB\nWeb -> API: call");
        assert_eq!(
            doc.groups,
            vec![Group {
                name: "Backend".to_string(),
                members: vec!["API".to_string(), "DB".to_string()],
                color: Some("green".to_string()),
                line: 1,
            }]
        );
        assert_eq!(doc.elements[0], Element::Group { index: 0 });
        let ids: Vec<&str> = doc.participants.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["API", "DB", "Web"]);
    }

    #[test]
    fn test_empty_group() {
        let doc = parse("group Nobody:");
        assert_eq!(
            doc.diagnostics[0].kind,
            DiagnosticKind::EmptyGroup("Nobody".to_string())
        );
    }

    #[test]
    fn test_directives() {
        let doc = parse("title Checkout\noption activations=off\noption notes=collapsed\nA -> B: x");
        assert_eq!(doc.title.as_deref(), Some("Checkout"));
        assert_eq!(doc.title_line, Some(1));
        assert!(!doc.options.activations);
        assert!(doc.options.notes_collapsed);
    }

    #[test]
    fn test_late_directive() {
        let doc = parse("A -> B: x\noption activations=off");
        assert!(doc.options.activations);
        assert_eq!(
            doc.diagnostics,
            vec![Diagnostic::new(2, DiagnosticKind::LateDirective("option".to_string()))]
        );
    }

    #[test]
    fn test_unknown_option() {
        let doc = parse("option colour=red");
        assert_eq!(
            doc.diagnostics[0].kind,
            DiagnosticKind::UnknownOption("colour=red".to_string())
        );
    }

    #[test]
    fn test_comment_and_garbage() {
        let doc = parse("# comment\n// also a comment\n???\nA -> B: ok");
        assert_eq!(doc.messages.len(), 1);
        assert_eq!(
            doc.diagnostics,
            vec![Diagnostic::new(3, DiagnosticKind::UnrecognizedLine("???".to_string()))]
        );
    }

    #[test]
    fn test_quoted_names() {
        let doc = parse(r#""Web App" -> "Auth: v2": login"#);
        assert_eq!(doc.messages[0].from, "Web App");
        assert_eq!(doc.messages[0].to, "Auth: v2");
        assert_eq!(doc.messages[0].label, "login");
    }

    #[test]
    fn test_tab_indentation() {
        let doc = parse("if x\n\tA -> B: y\nA -> C: z");
        assert_eq!(doc.elements.len(), 2);
    }
}
