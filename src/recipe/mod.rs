//! Recipe documents: model and parser.
//!
//! A recipe is a YAML document describing an ordered list of steps:
//!
//! ```yaml
//! name: release
//! description: Build and announce a release
//! tags: [ci, release]
//! context:
//!   channel: stable
//! steps:
//!   - id: build
//!     type: bash
//!     command: cargo build --release
//!     output: build_log
//!     timeout: 900
//!
//!   - id: notes
//!     type: agent
//!     agent: "docs:release-notes"
//!     prompt: "Summarize this build log: {{build_log}}"
//!     condition: channel == "stable"
//! ```
//!
//! The parser is the only place the `type` string is interpreted; everything
//! downstream matches on [`StepKind`].

mod model;
mod parser;


pub use model::{Recipe, Step, StepKind};
pub use parser::{DEFAULT_TIMEOUT_SECONDS, ParseError, Parser, parse};
