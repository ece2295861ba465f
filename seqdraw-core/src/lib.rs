//! seqdraw-core: parses the seqdraw sequence-diagram notation and lays it out
//! as positioned draw instructions
//!
//! # Example
//!
//! ```
//! use seqdraw_core::{parse, render, DrawInstruction, ViewState};
//!
//! let input = r#"
//! title Checkout
//! actor User
//! User -> Api: place order <- order id
//! if in stock
//!   Api -> Db: reserve
//! else
//!   Api ~> Mail: backorder notice
//! "#;
//!
//! let doc = parse(input);
//! assert!(doc.diagnostics.is_empty());
//!
//! let rendering = render(&doc, &ViewState::default()).unwrap();
//! let arrows = rendering
//!     .instructions
//!     .iter()
//!     .filter(|i| matches!(i, DrawInstruction::Arrow { .. }))
//!     .count();
//! assert_eq!(arrows, 4);
//! ```
//!
//! # Collapsing sections
//!
//! ```
//! use seqdraw_core::{parse, render, ViewState};
//!
//! let doc = parse("== Login ==\nA -> B: hello\n== Browse ==\nA -> C: list");
//! let browse = &doc.top_level_sections()[1];
//! let view = ViewState::new().with_collapsed_section(browse.line);
//! let rendering = render(&doc, &view).unwrap();
//! assert!(rendering.height < render(&doc, &ViewState::default()).unwrap().height);
//! ```

pub mod activation;
pub mod ast;
pub mod ordering;
pub mod parser;
pub mod renderer;
pub mod sequence;
pub mod spacing;

pub use activation::{compute_activations, Activation};
pub use ast::*;
pub use ordering::{resolve_order, ParticipantOrder};
pub use parser::parse;
pub use renderer::{render, render_with_config, Config, DrawInstruction, RenderError, Rendering};
pub use sequence::{build_render_sequence, renderable_steps, RenderStep, StepKind};
pub use spacing::{resolve_spacing, SpacingLayout, ViewState};
