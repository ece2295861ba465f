//! Layout pass: turns a document into positioned draw instructions
//!
//! Participants are ordered first, then spaced horizontally from the label
//! widths between neighbors. The vertical pass lives in `spacing`; this
//! module combines both axes and emits instructions in paint order.

use serde::Serialize;
use std::collections::HashMap;

use crate::activation::compute_activations;
use crate::ast::*;
use crate::ordering::resolve_order;
use crate::sequence::{build_render_sequence, renderable_steps, StepKind};
use crate::spacing::{resolve_spacing, FramePlacement, NotePlacement, SpacingLayout, ViewState};

/// Layout configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Padding around the diagram
    pub padding: f64,
    /// Minimum distance between neighboring participant centers
    pub participant_gap: f64,
    /// Minimum width of a participant box
    pub participant_width: f64,
    /// Height of participant header/footer box
    pub header_height: f64,
    /// Title height (when title exists)
    pub title_height: f64,
    /// Vertical advance of one arrow
    pub step_height: f64,
    /// Space between the row above a block and its top border or else divider
    pub block_top_padding: f64,
    /// Space taken by a block label, and by an else divider
    pub block_header_height: f64,
    /// Space below the last row of a block
    pub block_footer_padding: f64,
    /// Extra space between a block and the element after it
    pub sibling_gap: f64,
    /// Space above and below a section divider
    pub section_padding: f64,
    pub note_line_height: f64,
    pub note_padding: f64,
    /// Space above a note
    pub note_gap: f64,
    /// Minimum width of a note box
    pub note_width: f64,
    /// Activation box width
    pub activation_width: f64,
    /// Horizontal shift per nested activation
    pub activation_depth_offset: f64,
    /// Height of a self-call loop
    pub self_call_height: f64,
    /// Width of a self-call loop
    pub self_call_width: f64,
    /// Estimated width of one character of label text
    pub char_width: f64,
    /// Distance between a block frame and the participants it spans
    pub frame_margin: f64,
    /// Inset per level of block nesting
    pub frame_inset: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            padding: 10.0,
            participant_gap: 140.0,
            participant_width: 90.0,
            header_height: 40.0,
            title_height: 40.0,
            step_height: 40.0,
            block_top_padding: 10.0,
            block_header_height: 28.0,
            block_footer_padding: 12.0,
            sibling_gap: 10.0,
            section_padding: 16.0,
            note_line_height: 16.0,
            note_padding: 6.0,
            note_gap: 8.0,
            note_width: 120.0,
            activation_width: 10.0,
            activation_depth_offset: 5.0,
            self_call_height: 20.0,
            self_call_width: 30.0,
            char_width: 7.0,
            frame_margin: 10.0,
            frame_inset: 8.0,
        }
    }
}

impl Config {
    /// Set the outer padding
    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding;
        self
    }

    /// Set the minimum participant gap
    pub fn with_participant_gap(mut self, gap: f64) -> Self {
        self.participant_gap = gap;
        self
    }

    /// Set the vertical advance per arrow
    pub fn with_step_height(mut self, height: f64) -> Self {
        self.step_height = height;
        self
    }

    /// Set the space around section dividers
    pub fn with_section_padding(mut self, padding: f64) -> Self {
        self.section_padding = padding;
        self
    }

    /// Set the per-character width used to estimate label sizes
    pub fn with_char_width(mut self, width: f64) -> Self {
        self.char_width = width;
        self
    }

    /// Set activation bar width and per-depth shift
    pub fn with_activation_geometry(mut self, width: f64, depth_offset: f64) -> Self {
        self.activation_width = width;
        self.activation_depth_offset = depth_offset;
        self
    }
}

/// Why a document could not be laid out
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("nothing to render: the diagram has no participants")]
    Empty,
}

/// One positioned shape. Every variant carries the source line it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DrawInstruction {
    Title {
        text: String,
        x: f64,
        y: f64,
        line: usize,
    },
    GroupBox {
        name: String,
        color: Option<String>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        line: usize,
    },
    BlockFrame {
        kind: BlockKind,
        label: String,
        depth: usize,
        x1: f64,
        x2: f64,
        y1: f64,
        y2: f64,
        else_y: Option<f64>,
        else_label: Option<String>,
        else_line: Option<usize>,
        line: usize,
    },
    Lifeline {
        participant: String,
        x: f64,
        y1: f64,
        y2: f64,
        line: usize,
    },
    Activation {
        participant: String,
        depth: usize,
        x: f64,
        y1: f64,
        y2: f64,
        line: usize,
    },
    Arrow {
        kind: StepKind,
        from: String,
        to: String,
        from_x: f64,
        to_x: f64,
        y: f64,
        label: String,
        is_async: bool,
        /// Drawn as a loop to the right of the lifeline
        self_loop: bool,
        message_index: usize,
        line: usize,
    },
    Note {
        side: NoteSide,
        participants: Vec<String>,
        /// Full text, or the first line plus an ellipsis when collapsed
        text: String,
        expanded: bool,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        anchor_y: Option<f64>,
        line: usize,
    },
    SectionDivider {
        label: String,
        color: Option<String>,
        x1: f64,
        x2: f64,
        y: f64,
        collapsed: bool,
        collapsible: bool,
        hidden_messages: usize,
        line: usize,
    },
    ParticipantBox {
        participant: String,
        label: String,
        kind: ParticipantKind,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        footer: bool,
        line: usize,
    },
}

impl DrawInstruction {
    /// Paint order, back to front
    fn layer(&self) -> u8 {
        match self {
            DrawInstruction::Title { .. } => 0,
            DrawInstruction::GroupBox { .. } => 1,
            DrawInstruction::BlockFrame { .. } => 2,
            DrawInstruction::Lifeline { .. } => 3,
            DrawInstruction::Activation { .. } => 4,
            DrawInstruction::Arrow { .. } => 5,
            DrawInstruction::Note { .. } => 6,
            DrawInstruction::SectionDivider { .. } => 7,
            DrawInstruction::ParticipantBox { .. } => 8,
        }
    }

    /// Source line this shape maps back to
    pub fn line(&self) -> usize {
        match self {
            DrawInstruction::Title { line, .. }
            | DrawInstruction::GroupBox { line, .. }
            | DrawInstruction::BlockFrame { line, .. }
            | DrawInstruction::Lifeline { line, .. }
            | DrawInstruction::Activation { line, .. }
            | DrawInstruction::Arrow { line, .. }
            | DrawInstruction::Note { line, .. }
            | DrawInstruction::SectionDivider { line, .. }
            | DrawInstruction::ParticipantBox { line, .. } => *line,
        }
    }
}

/// A laid-out diagram
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rendering {
    pub width: f64,
    pub height: f64,
    pub instructions: Vec<DrawInstruction>,
    /// Parser diagnostics followed by ordering diagnostics
    pub diagnostics: Vec<Diagnostic>,
}

const TEXT_PADDING: f64 = 20.0;
const NOTE_OFFSET: f64 = 10.0;
const ELLIPSIS: &str = "…";

/// Estimate the width of the widest line of `text` (character count, not font metrics)
fn estimate_text_width(text: &str, char_width: f64) -> f64 {
    let widest = text.lines().map(|line| line.chars().count()).max().unwrap_or(0);
    widest as f64 * char_width
}

fn participant_box_width(participant: &Participant, config: &Config) -> f64 {
    (estimate_text_width(&participant.label, config.char_width) + TEXT_PADDING)
        .max(config.participant_width)
}

/// Calculate gaps between neighboring participant centers from label lengths
fn calculate_participant_gaps(
    doc: &Document,
    slot_of: &HashMap<&str, usize>,
    widths: &[f64],
    config: &Config,
) -> Vec<f64> {
    if widths.len() <= 1 {
        return vec![];
    }
    let mut gaps = vec![config.participant_gap; widths.len() - 1];

    for message in &doc.messages {
        let (Some(&from), Some(&to)) = (
            slot_of.get(message.from.as_str()),
            slot_of.get(message.to.as_str()),
        ) else {
            continue;
        };
        let label_width = estimate_text_width(&message.label, config.char_width) + TEXT_PADDING;

        if from == to {
            // Self-call labels sit to the right of the loop
            if let Some(gap) = gaps.get_mut(from) {
                let needed = config.self_call_width + label_width + widths[from + 1] / 2.0;
                *gap = gap.max(needed);
            }
            continue;
        }

        let return_width = message
            .return_label
            .as_deref()
            .map(|label| estimate_text_width(label, config.char_width) + TEXT_PADDING)
            .unwrap_or(0.0);
        let (lo, hi) = (from.min(to), from.max(to));
        // Spread the needed width across every gap the arrow crosses
        let needed = label_width.max(return_width) / (hi - lo) as f64;
        for gap in &mut gaps[lo..hi] {
            *gap = gap.max(needed);
        }
    }

    for (i, gap) in gaps.iter_mut().enumerate() {
        let needed_for_names = (widths[i] + widths[i + 1]) / 2.0 + TEXT_PADDING;
        *gap = gap.max(needed_for_names);
    }

    gaps
}

/// Horizontal placement of participants, in display order
struct Columns<'a> {
    config: &'a Config,
    participants: Vec<&'a Participant>,
    centers: HashMap<&'a str, f64>,
    widths: HashMap<&'a str, f64>,
}

impl<'a> Columns<'a> {
    fn new(doc: &'a Document, order: &[usize], config: &'a Config) -> Self {
        let participants: Vec<&Participant> =
            order.iter().filter_map(|&i| doc.participants.get(i)).collect();
        let slot_of: HashMap<&str, usize> = participants
            .iter()
            .enumerate()
            .map(|(slot, p)| (p.id.as_str(), slot))
            .collect();
        let widths: Vec<f64> = participants
            .iter()
            .map(|p| participant_box_width(p, config))
            .collect();
        let gaps = calculate_participant_gaps(doc, &slot_of, &widths, config);

        let mut centers = HashMap::new();
        let mut x = config.padding + widths.first().copied().unwrap_or(0.0) / 2.0;
        for (slot, p) in participants.iter().enumerate() {
            centers.insert(p.id.as_str(), x);
            x += gaps.get(slot).copied().unwrap_or(0.0);
        }

        Self {
            config,
            widths: participants
                .iter()
                .map(|p| p.id.as_str())
                .zip(widths)
                .collect(),
            participants,
            centers,
        }
    }

    fn x(&self, id: &str) -> f64 {
        self.centers.get(id).copied().unwrap_or(0.0)
    }

    fn width(&self, id: &str) -> f64 {
        self.widths
            .get(id)
            .copied()
            .unwrap_or(self.config.participant_width)
    }

    fn left(&self, id: &str) -> f64 {
        self.x(id) - self.width(id) / 2.0
    }

    fn right(&self, id: &str) -> f64 {
        self.x(id) + self.width(id) / 2.0
    }

    /// Outer edge of the rightmost participant box
    fn content_right(&self) -> f64 {
        self.participants
            .iter()
            .map(|p| self.right(&p.id))
            .fold(self.config.padding, f64::max)
    }
}

/// Lay out a document with the default configuration
pub fn render(doc: &Document, view: &ViewState) -> Result<Rendering, RenderError> {
    render_with_config(doc, view, Config::default())
}

/// Lay out a document with a custom configuration
pub fn render_with_config(
    doc: &Document,
    view: &ViewState,
    config: Config,
) -> Result<Rendering, RenderError> {
    if doc.is_empty() {
        return Err(RenderError::Empty);
    }

    let order = resolve_order(&doc.participants, &doc.groups);
    let columns = Columns::new(doc, &order.order, &config);
    let steps = build_render_sequence(&doc.messages);

    let title_space = if doc.title.is_some() {
        config.title_height
    } else {
        0.0
    };
    let header_y = config.padding + title_space;
    let content_top = header_y + config.header_height;
    let spacing = resolve_spacing(doc, &steps, view, &config, content_top);
    let footer_y = spacing.bottom + config.step_height / 2.0;
    let height = footer_y + config.header_height + config.padding;

    let mut instructions = Vec::new();
    let mut right_edge = columns.content_right();

    // Arrows
    for (index, step) in renderable_steps(&steps) {
        let Some(y) = spacing.step_y.get(index).copied().flatten() else {
            continue;
        };
        let line = doc
            .messages
            .get(step.message_index)
            .map_or(0, |m| m.line);
        let from_x = columns.x(&step.from);
        let to_x = columns.x(&step.to);
        let self_loop = step.is_self();
        if self_loop {
            let label_width = estimate_text_width(&step.label, config.char_width);
            right_edge = right_edge.max(from_x + config.self_call_width + label_width + TEXT_PADDING);
        }
        instructions.push(DrawInstruction::Arrow {
            kind: step.kind,
            from: step.from.clone(),
            to: step.to.clone(),
            from_x,
            to_x,
            y,
            label: step.label.clone(),
            is_async: step.is_async,
            self_loop,
            message_index: step.message_index,
            line,
        });
    }

    // Activations
    if doc.options.activations {
        for activation in compute_activations(&steps) {
            let start = spacing.step_y.get(activation.start_step).copied().flatten();
            let end = spacing.step_y.get(activation.end_step).copied().flatten();
            let (Some(y1), Some(y2)) = (start, end) else {
                continue;
            };
            let line = steps
                .get(activation.start_step)
                .and_then(|step| doc.messages.get(step.message_index))
                .map_or(0, |m| m.line);
            let x = columns.x(&activation.participant) - config.activation_width / 2.0
                + activation.depth as f64 * config.activation_depth_offset;
            instructions.push(DrawInstruction::Activation {
                participant: activation.participant,
                depth: activation.depth,
                x,
                y1,
                y2,
                line,
            });
        }
    }

    // Notes
    for placement in &spacing.notes {
        let note = note_instruction(placement, &columns, &config);
        if let DrawInstruction::Note { x, width, .. } = &note {
            right_edge = right_edge.max(x + width);
        }
        instructions.push(note);
    }

    // Block frames
    for frame in &spacing.frames {
        let (x1, x2) = frame_bounds(frame, &columns, &config);
        right_edge = right_edge.max(x2);
        instructions.push(DrawInstruction::BlockFrame {
            kind: frame.kind,
            label: frame.label.clone(),
            depth: frame.depth,
            x1,
            x2,
            y1: frame.top,
            y2: frame.bottom,
            else_y: frame.else_y,
            else_label: frame.else_label.clone(),
            else_line: frame.else_line,
            line: frame.line,
        });
    }

    let width = right_edge + config.padding;

    push_participants(&mut instructions, &columns, header_y, footer_y, &config);
    push_groups(&mut instructions, doc, &columns, header_y, footer_y, &config);
    push_dividers(&mut instructions, &spacing, width, &config);

    if let Some(text) = &doc.title {
        instructions.push(DrawInstruction::Title {
            text: text.clone(),
            x: width / 2.0,
            y: config.padding + config.title_height / 2.0,
            line: doc.title_line.unwrap_or(1),
        });
    }

    instructions.sort_by_key(DrawInstruction::layer);

    let mut diagnostics = doc.diagnostics.clone();
    diagnostics.extend(order.diagnostics);

    tracing::debug!(
        participants = columns.participants.len(),
        steps = steps.len(),
        instructions = instructions.len(),
        width,
        height,
        "diagram laid out"
    );

    Ok(Rendering {
        width,
        height,
        instructions,
        diagnostics,
    })
}

fn note_instruction(placement: &NotePlacement, columns: &Columns, config: &Config) -> DrawInstruction {
    let note = &placement.note;
    let text = if placement.expanded {
        note.text.clone()
    } else {
        let first = note.text.lines().next().unwrap_or("");
        let more = note.text.lines().nth(1).is_some();
        if more {
            format!("{}{}", first, ELLIPSIS)
        } else {
            first.to_string()
        }
    };
    let width = (estimate_text_width(&text, config.char_width) + config.note_padding * 2.0)
        .max(config.note_width);

    let centers: Vec<f64> = note.participants.iter().map(|p| columns.x(p)).collect();
    let min_x = centers.iter().copied().fold(f64::INFINITY, f64::min);
    let max_x = centers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (x, width) = match note.side {
        NoteSide::Left => (min_x - NOTE_OFFSET - width, width),
        NoteSide::Right => (max_x + NOTE_OFFSET, width),
        NoteSide::Over => {
            let span = (max_x - min_x) + config.note_width / 2.0;
            let width = width.max(span);
            ((min_x + max_x) / 2.0 - width / 2.0, width)
        }
    };

    DrawInstruction::Note {
        side: note.side,
        participants: note.participants.clone(),
        text,
        expanded: placement.expanded,
        x: x.max(0.0),
        y: placement.y,
        width,
        height: placement.height,
        anchor_y: placement.anchor_y,
        line: note.line,
    }
}

/// Block x boundaries from the participants involved and the label length
fn frame_bounds(frame: &FramePlacement, columns: &Columns, config: &Config) -> (f64, f64) {
    let involved = frame
        .participants
        .iter()
        .filter(|p| columns.centers.contains_key(p.as_str()));
    let min_left = involved
        .clone()
        .map(|p| columns.left(p))
        .fold(f64::INFINITY, f64::min);
    let max_right = involved.map(|p| columns.right(p)).fold(f64::NEG_INFINITY, f64::max);

    let (mut x1, mut x2) = if min_left.is_finite() && max_right.is_finite() {
        (min_left - config.frame_margin, max_right + config.frame_margin)
    } else {
        (config.padding, columns.content_right())
    };

    let tab = format!("{} [{}]", frame.kind.as_str(), frame.label);
    let min_label_width = estimate_text_width(&tab, config.char_width) + TEXT_PADDING * 2.0;
    if x2 - x1 < min_label_width {
        x2 = x1 + min_label_width;
    }

    // Nested frames sit inside their parent
    let inset = frame.depth as f64 * config.frame_inset;
    let max_inset = ((x2 - x1 - min_label_width) / 2.0).max(0.0);
    let inset = inset.min(max_inset);
    x1 += inset;
    x2 -= inset;

    (x1, x2)
}

fn push_participants(
    instructions: &mut Vec<DrawInstruction>,
    columns: &Columns,
    header_y: f64,
    footer_y: f64,
    config: &Config,
) {
    for participant in &columns.participants {
        let id = participant.id.as_str();
        let x = columns.x(id);
        let width = columns.width(id);
        instructions.push(DrawInstruction::Lifeline {
            participant: participant.id.clone(),
            x,
            y1: header_y + config.header_height,
            y2: footer_y,
            line: participant.line,
        });
        for (y, footer) in [(header_y, false), (footer_y, true)] {
            instructions.push(DrawInstruction::ParticipantBox {
                participant: participant.id.clone(),
                label: participant.label.clone(),
                kind: participant.kind,
                x: x - width / 2.0,
                y,
                width,
                height: config.header_height,
                footer,
                line: participant.line,
            });
        }
    }
}

/// Boxes around groups whose members ended up side by side
fn push_groups(
    instructions: &mut Vec<DrawInstruction>,
    doc: &Document,
    columns: &Columns,
    header_y: f64,
    footer_y: f64,
    config: &Config,
) {
    for group in &doc.groups {
        let mut slots: Vec<usize> = columns
            .participants
            .iter()
            .enumerate()
            .filter(|(_, p)| group.members.contains(&p.id))
            .map(|(slot, _)| slot)
            .collect();
        slots.sort_unstable();
        let (Some(&first), Some(&last)) = (slots.first(), slots.last()) else {
            continue;
        };
        if last - first + 1 != slots.len() {
            tracing::debug!(group = %group.name, "group members are not adjacent, skipping box");
            continue;
        }

        let half_margin = config.padding / 2.0;
        let x1 = columns.left(&columns.participants[first].id) - half_margin;
        let x2 = columns.right(&columns.participants[last].id) + half_margin;
        let y = header_y - half_margin;
        instructions.push(DrawInstruction::GroupBox {
            name: group.name.clone(),
            color: group.color.clone(),
            x: x1,
            y,
            width: x2 - x1,
            height: footer_y + config.header_height + half_margin - y,
            line: group.line,
        });
    }
}

fn push_dividers(
    instructions: &mut Vec<DrawInstruction>,
    spacing: &SpacingLayout,
    width: f64,
    config: &Config,
) {
    for divider in &spacing.dividers {
        instructions.push(DrawInstruction::SectionDivider {
            label: divider.display_label.clone(),
            color: divider.section.color.clone(),
            x1: config.padding,
            x2: width - config.padding,
            y: divider.y,
            collapsed: divider.collapsed,
            collapsible: divider.collapsible,
            hidden_messages: divider.hidden_messages,
            line: divider.section.line,
        });
    }
}
