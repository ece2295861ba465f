//! Vertical layout: turns the render sequence into Y coordinates
//!
//! The element tree is walked in document order while a cursor advances
//! through the step list. Each message element places every step up to and
//! including its own call, so returns land right before the message that
//! triggered them. Blocks add header space and drain their own trailing
//! returns before the frame closes. Sections only ever drain steps of
//! earlier messages, which keeps a divider's position independent of
//! anything collapsed after it.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::ast::{Block, BlockKind, Document, Element, Note, Section};
use crate::renderer::Config;
use crate::sequence::{RenderStep, StepKind};

/// Host-controlled view toggles, keyed by source line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    /// Top-level sections currently collapsed
    pub collapsed_sections: BTreeSet<usize>,
    /// Notes that show their full text
    pub expanded_notes: BTreeSet<usize>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collapse the section declared on `line`
    pub fn with_collapsed_section(mut self, line: usize) -> Self {
        self.collapsed_sections.insert(line);
        self
    }

    /// Expand the note declared on `line`
    pub fn with_expanded_note(mut self, line: usize) -> Self {
        self.expanded_notes.insert(line);
        self
    }
}

/// Half-open range of message indices owned by a subtree.
///
/// Document order makes every subtree's messages contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MessageSpan {
    pub start: usize,
    pub end: usize,
}

impl MessageSpan {
    fn single(index: usize) -> Self {
        Self {
            start: index,
            end: index + 1,
        }
    }

    pub fn first(&self) -> Option<usize> {
        (self.start < self.end).then_some(self.start)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start..self.end).contains(&index)
    }
}

fn merge(a: Option<MessageSpan>, b: Option<MessageSpan>) -> Option<MessageSpan> {
    match (a, b) {
        (Some(a), Some(b)) => Some(MessageSpan {
            start: a.start.min(b.start),
            end: a.end.max(b.end),
        }),
        (a, None) => a,
        (None, b) => b,
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BlockSpans {
    children: Option<MessageSpan>,
    else_children: Option<MessageSpan>,
    whole: Option<MessageSpan>,
}

/// Message spans of every block, filled by a single tree fold
#[derive(Debug, Default)]
struct SpanIndex {
    blocks: HashMap<usize, BlockSpans>,
}

impl SpanIndex {
    fn build(elements: &[Element]) -> Self {
        let mut index = Self::default();
        index.fold_elements(elements);
        index
    }

    fn fold_elements(&mut self, elements: &[Element]) -> Option<MessageSpan> {
        elements
            .iter()
            .map(|element| self.fold_element(element))
            .fold(None, merge)
    }

    fn fold_element(&mut self, element: &Element) -> Option<MessageSpan> {
        match element {
            Element::Message { index } => Some(MessageSpan::single(*index)),
            Element::Block(block) => {
                let children = self.fold_elements(&block.children);
                let else_children = self.fold_elements(&block.else_children);
                let whole = merge(children, else_children);
                self.blocks.insert(
                    block.line,
                    BlockSpans {
                        children,
                        else_children,
                        whole,
                    },
                );
                whole
            }
            Element::Section(_) | Element::Note(_) | Element::Group { .. } => None,
        }
    }

    fn block(&self, line: usize) -> BlockSpans {
        self.blocks.get(&line).copied().unwrap_or_default()
    }
}

/// Top-level sections with the messages each one owns.
///
/// A section owns everything after it up to the next top-level section.
pub(crate) fn section_spans(elements: &[Element]) -> Vec<(&Section, MessageSpan)> {
    let mut index = SpanIndex::default();
    let mut result = Vec::new();
    let mut current: Option<(&Section, usize)> = None;
    let mut cursor = 0;

    for element in elements {
        if let Element::Section(section) = element {
            if let Some((prev, start)) = current.take() {
                result.push((prev, MessageSpan { start, end: cursor }));
            }
            current = Some((section, cursor));
        } else if let Some(span) = index.fold_element(element) {
            cursor = span.end;
        }
    }
    if let Some((prev, start)) = current {
        result.push((prev, MessageSpan { start, end: cursor }));
    }
    result
}

/// Placed section divider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DividerPlacement {
    pub section: Section,
    /// Label with the hidden-message count appended when collapsed
    pub display_label: String,
    pub y: f64,
    pub collapsed: bool,
    /// Only top-level sections can be collapsed
    pub collapsible: bool,
    pub hidden_messages: usize,
}

/// Placed block frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FramePlacement {
    pub kind: BlockKind,
    pub label: String,
    pub line: usize,
    pub depth: usize,
    pub top: f64,
    pub bottom: f64,
    pub else_y: Option<f64>,
    pub else_label: Option<String>,
    pub else_line: Option<usize>,
    /// Participants touched by anything inside the frame
    pub participants: Vec<String>,
}

/// Placed note
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotePlacement {
    pub note: Note,
    pub y: f64,
    pub height: f64,
    /// Y of the closest message call above the note
    pub anchor_y: Option<f64>,
    pub expanded: bool,
}

/// Result of the vertical pass
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SpacingLayout {
    /// Y of every step in the full sequence; `None` when collapsed away
    pub step_y: Vec<Option<f64>>,
    pub dividers: Vec<DividerPlacement>,
    pub frames: Vec<FramePlacement>,
    pub notes: Vec<NotePlacement>,
    /// Y where the last content ends
    pub bottom: f64,
}

impl SpacingLayout {
    pub fn visible_steps(&self) -> usize {
        self.step_y.iter().filter(|y| y.is_some()).count()
    }
}

/// Assign Y coordinates to steps, frames, dividers, and notes.
///
/// Pure with respect to `view`: the same document and view always yield the
/// same layout.
pub fn resolve_spacing(
    doc: &Document,
    steps: &[RenderStep],
    view: &ViewState,
    config: &Config,
    origin: f64,
) -> SpacingLayout {
    let sections: HashMap<usize, MessageSpan> = section_spans(&doc.elements)
        .into_iter()
        .map(|(section, span)| (section.line, span))
        .collect();

    let mut message_hidden = vec![false; doc.messages.len()];
    for (line, span) in &sections {
        if view.collapsed_sections.contains(line) {
            for hidden in &mut message_hidden[span.start..span.end] {
                *hidden = true;
            }
        }
    }

    let mut call_step = vec![0; doc.messages.len()];
    for (i, step) in steps.iter().enumerate() {
        if step.kind == StepKind::Call {
            if let Some(slot) = call_step.get_mut(step.message_index) {
                *slot = i;
            }
        }
    }

    let mut pass = SpacingPass {
        config,
        doc,
        view,
        steps,
        spans: SpanIndex::build(&doc.elements),
        sections,
        message_hidden,
        call_step,
        next_step: 0,
        y: origin,
        last_call_y: None,
        layout: SpacingLayout {
            step_y: vec![None; steps.len()],
            ..SpacingLayout::default()
        },
    };
    pass.walk(&doc.elements, 0, false);
    pass.drain_until(steps.len());
    pass.layout.bottom = pass.y;

    tracing::debug!(
        steps = steps.len(),
        visible = pass.layout.visible_steps(),
        frames = pass.layout.frames.len(),
        bottom = pass.y,
        "spacing resolved"
    );
    pass.layout
}

struct SpacingPass<'a> {
    config: &'a Config,
    doc: &'a Document,
    view: &'a ViewState,
    steps: &'a [RenderStep],
    spans: SpanIndex,
    sections: HashMap<usize, MessageSpan>,
    message_hidden: Vec<bool>,
    call_step: Vec<usize>,
    next_step: usize,
    y: f64,
    last_call_y: Option<f64>,
    layout: SpacingLayout,
}

impl<'a> SpacingPass<'a> {
    fn walk(&mut self, elements: &'a [Element], depth: usize, inherited_hidden: bool) {
        let mut hidden = inherited_hidden;
        let mut after_block = false;

        for element in elements {
            if let Element::Group { .. } = element {
                continue;
            }
            let is_top_section = depth == 0 && matches!(element, Element::Section(_));
            let visible = !hidden || is_top_section;
            if visible && after_block {
                self.y += self.config.sibling_gap;
            }
            after_block = false;

            match element {
                Element::Message { index } => self.place_message(*index),
                Element::Block(block) => {
                    self.place_block(block, depth, hidden);
                    after_block = visible;
                }
                Element::Section(section) if depth == 0 => {
                    hidden = self.place_top_section(section);
                }
                Element::Section(section) => {
                    if visible {
                        self.place_divider(section.clone(), false, false, 0);
                    }
                }
                Element::Note(note) => {
                    if visible {
                        self.place_note(note);
                    }
                }
                Element::Group { .. } => {}
            }
        }
    }

    fn place_message(&mut self, index: usize) {
        let Some(&call) = self.call_step.get(index) else {
            return;
        };
        self.drain_until(call + 1);
        let message = &self.doc.messages[index];
        if message.is_self_call() && !message.is_async {
            self.drain_until(call + 2);
        }
    }

    fn place_block(&mut self, block: &'a Block, depth: usize, hidden: bool) {
        if hidden {
            self.walk(&block.children, depth + 1, true);
            self.walk(&block.else_children, depth + 1, true);
            return;
        }

        let spans = self.spans.block(block.line);
        if let Some(first) = spans.whole.and_then(|s| s.first()) {
            self.drain_until(self.call_step[first]);
        }

        self.y += self.config.block_top_padding;
        let top = self.y;
        self.y += self.config.block_header_height;
        self.walk(&block.children, depth + 1, false);
        if let Some(span) = spans.children {
            self.drain_returns_within(span);
        }

        let mut else_y = None;
        if block.has_else() {
            if let Some(first) = spans.else_children.and_then(|s| s.first()) {
                self.drain_until(self.call_step[first]);
            }
            self.y += self.config.block_top_padding;
            else_y = Some(self.y);
            self.y += self.config.block_header_height;
            self.walk(&block.else_children, depth + 1, false);
        }
        if let Some(span) = spans.whole {
            self.drain_returns_within(span);
        }

        self.y += self.config.block_footer_padding;
        let mut participants = Vec::new();
        collect_participants(&block.children, self.doc, &mut participants);
        collect_participants(&block.else_children, self.doc, &mut participants);

        self.layout.frames.push(FramePlacement {
            kind: block.kind,
            label: block.label.clone(),
            line: block.line,
            depth,
            top,
            bottom: self.y,
            else_y,
            else_label: block.else_label.clone(),
            else_line: block.else_line,
            participants,
        });
    }

    /// Place a top-level divider; returns whether its content is collapsed
    fn place_top_section(&mut self, section: &Section) -> bool {
        let span = self.sections.get(&section.line).copied().unwrap_or_default();
        let collapsed = self.view.collapsed_sections.contains(&section.line);
        self.drain_while(|step| step.message_index < span.start);
        let hidden_messages = if collapsed { span.len() } else { 0 };
        self.place_divider(section.clone(), collapsed, true, hidden_messages);
        collapsed
    }

    fn place_divider(
        &mut self,
        section: Section,
        collapsed: bool,
        collapsible: bool,
        hidden_messages: usize,
    ) {
        self.y += self.config.section_padding;
        let display_label = if collapsed {
            format!("{} ({} hidden)", section.label, hidden_messages)
        } else {
            section.label.clone()
        };
        self.layout.dividers.push(DividerPlacement {
            section,
            display_label,
            y: self.y,
            collapsed,
            collapsible,
            hidden_messages,
        });
        self.y += self.config.section_padding;
    }

    fn place_note(&mut self, note: &Note) {
        let expanded =
            !self.doc.options.notes_collapsed || self.view.expanded_notes.contains(&note.line);
        let lines = if expanded {
            note.text.lines().count().max(1)
        } else {
            1
        };
        let height = lines as f64 * self.config.note_line_height + self.config.note_padding * 2.0;
        self.y += self.config.note_gap;
        self.layout.notes.push(NotePlacement {
            note: note.clone(),
            y: self.y,
            height,
            anchor_y: self.last_call_y,
            expanded,
        });
        self.y += height;
    }

    /// Place steps up to (not including) `end`
    fn drain_until(&mut self, end: usize) {
        while self.next_step < end.min(self.steps.len()) {
            self.place_next();
        }
    }

    fn drain_while(&mut self, mut keep: impl FnMut(&RenderStep) -> bool) {
        let steps = self.steps;
        while let Some(step) = steps.get(self.next_step) {
            if !keep(step) {
                break;
            }
            self.place_next();
        }
    }

    /// Place the returns of `span` that directly follow the current cursor
    fn drain_returns_within(&mut self, span: MessageSpan) {
        self.drain_while(|step| step.kind == StepKind::Return && span.contains(step.message_index));
    }

    fn place_next(&mut self) {
        let index = self.next_step;
        self.next_step += 1;
        let step = &self.steps[index];
        if self.message_hidden.get(step.message_index).copied().unwrap_or(false) {
            return;
        }

        match step.kind {
            StepKind::Call => {
                self.y += self.config.step_height;
                self.layout.step_y[index] = Some(self.y);
                self.last_call_y = Some(self.y);
                if step.is_self() {
                    self.y += self.config.self_call_height;
                }
            }
            // Self returns close the loop drawn by their call
            StepKind::Return if step.is_self() => {
                self.layout.step_y[index] = Some(self.y);
            }
            StepKind::Return => {
                self.y += self.config.step_height;
                self.layout.step_y[index] = Some(self.y);
            }
        }
    }
}

fn collect_participants(elements: &[Element], doc: &Document, out: &mut Vec<String>) {
    let add = |id: &str, out: &mut Vec<String>| {
        if !out.iter().any(|p| p == id) {
            out.push(id.to_string());
        }
    };
    for element in elements {
        match element {
            Element::Message { index } => {
                if let Some(message) = doc.messages.get(*index) {
                    add(&message.from, out);
                    add(&message.to, out);
                }
            }
            Element::Note(note) => {
                for p in &note.participants {
                    add(p, out);
                }
            }
            Element::Block(block) => {
                collect_participants(&block.children, doc, out);
                collect_participants(&block.else_children, doc, out);
            }
            Element::Section(_) | Element::Group { .. } => {}
        }
    }
}
