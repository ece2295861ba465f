//! Document model for sequence diagrams

use serde::Serialize;
use std::fmt;

/// Diagram options (parsed from option directives)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiagramOptions {
    /// Draw activation bars on lifelines
    pub activations: bool,
    /// Render notes as a one-line placeholder unless the host expands them
    pub notes_collapsed: bool,
}

impl Default for DiagramOptions {
    fn default() -> Self {
        Self {
            activations: true,
            notes_collapsed: false,
        }
    }
}

/// A parsed sequence diagram
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Document {
    /// Optional title
    pub title: Option<String>,
    /// Line of the title directive
    pub title_line: Option<usize>,
    /// Diagram options
    pub options: DiagramOptions,
    /// Participants in discovery order
    pub participants: Vec<Participant>,
    /// Every message in document order, regardless of nesting
    pub messages: Vec<Message>,
    /// Element tree mirroring the source nesting
    pub elements: Vec<Element>,
    /// Declared groups in declaration order
    pub groups: Vec<Group>,
    /// Non-fatal problems found while parsing
    pub diagnostics: Vec<Diagnostic>,
}

impl Document {
    /// Look up a participant by id
    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// True when there is nothing to draw
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Top-level sections with the messages they own, in document order.
    ///
    /// These are the sections a host can offer to collapse.
    pub fn top_level_sections(&self) -> Vec<SectionSummary> {
        crate::spacing::section_spans(&self.elements)
            .into_iter()
            .map(|(section, span)| SectionSummary {
                line: section.line,
                label: section.label.clone(),
                color: section.color.clone(),
                first_message: span.first(),
                message_count: span.len(),
            })
            .collect()
    }
}

/// A participant in the sequence diagram
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    /// Identifier used in messages
    pub id: String,
    /// Display label
    pub label: String,
    /// Shape of the participant
    pub kind: ParticipantKind,
    /// Requested 0-based slot; negative values count from the end
    pub position: Option<i32>,
    /// Line of the declaration, or of the first mention
    pub line: usize,
}

/// Kind of participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    #[default]
    Plain,
    Actor,
    Database,
    Service,
    Queue,
    Cache,
    Networking,
    Frontend,
    External,
    Gateway,
}

impl ParticipantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantKind::Plain => "participant",
            ParticipantKind::Actor => "actor",
            ParticipantKind::Database => "database",
            ParticipantKind::Service => "service",
            ParticipantKind::Queue => "queue",
            ParticipantKind::Cache => "cache",
            ParticipantKind::Networking => "networking",
            ParticipantKind::Frontend => "frontend",
            ParticipantKind::External => "external",
            ParticipantKind::Gateway => "gateway",
        }
    }

    /// Match a declaration keyword (case-insensitive)
    pub fn from_keyword(word: &str) -> Option<Self> {
        let kind = match word.to_ascii_lowercase().as_str() {
            "participant" => ParticipantKind::Plain,
            "actor" => ParticipantKind::Actor,
            "database" => ParticipantKind::Database,
            "service" => ParticipantKind::Service,
            "queue" => ParticipantKind::Queue,
            "cache" => ParticipantKind::Cache,
            "networking" => ParticipantKind::Networking,
            "frontend" => ParticipantKind::Frontend,
            "external" => ParticipantKind::External,
            "gateway" => ParticipantKind::Gateway,
            _ => return None,
        };
        Some(kind)
    }
}

/// A message between participants
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub label: String,
    /// Label drawn on the inferred return arrow
    pub return_label: Option<String>,
    /// Fire-and-forget (`~>`); never receives a return
    pub is_async: bool,
    pub line: usize,
}

impl Message {
    pub fn is_self_call(&self) -> bool {
        self.from == self.to
    }
}

/// A node of the element tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    /// Index into `Document::messages`
    Message { index: usize },
    Block(Block),
    Section(Section),
    Note(Note),
    /// Index into `Document::groups`
    Group { index: usize },
}

/// Conditional or loop frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub kind: BlockKind,
    pub label: String,
    pub children: Vec<Element>,
    pub else_children: Vec<Element>,
    /// Text after `else`, if any
    pub else_label: Option<String>,
    /// Line of the `else` divider
    pub else_line: Option<usize>,
    pub line: usize,
}

impl Block {
    pub fn has_else(&self) -> bool {
        self.else_line.is_some()
    }
}

/// Block kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// Conditional, may carry an else branch
    If,
    Loop,
    /// Optional
    Opt,
    /// Parallel
    Par,
    Critical,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::If => "if",
            BlockKind::Loop => "loop",
            BlockKind::Opt => "opt",
            BlockKind::Par => "par",
            BlockKind::Critical => "critical",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        let kind = match word.to_ascii_lowercase().as_str() {
            "if" => BlockKind::If,
            "loop" => BlockKind::Loop,
            "opt" => BlockKind::Opt,
            "par" => BlockKind::Par,
            "critical" => BlockKind::Critical,
            _ => return None,
        };
        Some(kind)
    }
}

/// Labeled divider between phases of the diagram
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub label: String,
    pub color: Option<String>,
    pub line: usize,
}

/// Top-level section as seen by a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    pub line: usize,
    pub label: String,
    pub color: Option<String>,
    /// First message owned by the section
    pub first_message: Option<usize>,
    pub message_count: usize,
}

/// Note position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteSide {
    /// Left of participant
    Left,
    /// Right of participant
    Right,
    /// Over participant(s)
    Over,
}

/// Note
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub side: NoteSide,
    pub participants: Vec<String>,
    /// Lines are separated by `\n`
    pub text: String,
    pub line: usize,
}

/// Named set of participants kept side by side
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub name: String,
    pub members: Vec<String>,
    pub color: Option<String>,
    pub line: usize,
}

/// A non-fatal problem tied to a source line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub line: usize,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(line: usize, kind: DiagnosticKind) -> Self {
        Self { line, kind }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}

/// What went wrong on a line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum DiagnosticKind {
    #[error("`end` without an open block")]
    UnmatchedEnd,
    #[error("`else` outside of an `if` block")]
    ElseWithoutIf,
    #[error("block already has an `else` branch")]
    DuplicateElse,
    #[error("note is missing `end note`")]
    UnterminatedNote,
    #[error("`{0}` must appear before the first diagram line")]
    LateDirective(String),
    #[error("unknown option `{0}`")]
    UnknownOption(String),
    #[error("unrecognized line `{0}`")]
    UnrecognizedLine(String),
    #[error("group `{0}` has no members")]
    EmptyGroup(String),
    #[error("position {requested} for `{participant}` is taken, placed at {placed}")]
    PositionConflict {
        participant: String,
        requested: usize,
        placed: usize,
    },
}
