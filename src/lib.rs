//! Blockpatch: streaming block-edit parser and safe file patcher.
//!
//! A text-generation backend proposes source edits in a constrained wire
//! dialect; blockpatch parses that dialect as it streams and applies the
//! resulting edits to a workspace without silently losing prior work.
//!
//! # Architecture
//!
//! Every wire action compiles down to one primitive: a line-range
//! [`Replacement`] over a file's pre-edit snapshot, bundled per file into a
//! [`FileEdit`]. The [`StreamParser`] is a three-state machine (prose,
//! header, code) that drives a pluggable [`Dialect`]; the [`MutationEngine`]
//! materializes the finished batch on disk.
//!
//! # Safety
//!
//! - Only tracked, in-scope files may be edited; paths cannot escape the
//!   workspace root
//! - Snapshot fingerprints detect out-of-band changes before overwriting
//! - Deletions and conflicting overwrites require interactive confirmation,
//!   defaulting to "no"
//! - Atomic file writes (tempfile + fsync + rename)
//! - Overlapping replacement ranges are rejected before anything is written
//!
//! # Example
//!
//! ```no_run
//! use blockpatch::{
//!     by_name, MutationEngine, ScriptedInteraction, SessionContext, StreamParser,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut ctx = SessionContext::new("/path/to/workspace");
//! ctx.track("src/main.rs")?;
//!
//! let dialect = by_name("block").expect("known dialect");
//! let mut transcript = String::new();
//! let mut parser = StreamParser::new(&ctx, dialect.as_ref(), &mut transcript);
//! parser.push("model response, possibly one token at a time");
//! let outcome = parser.finish()?;
//!
//! let mut interaction = ScriptedInteraction::always(true);
//! let mut engine = MutationEngine::new(&mut ctx, &mut interaction);
//! for result in engine.apply(outcome.edits)? {
//!     println!("{}", result);
//! }
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod edit;
pub mod engine;
pub mod interact;
pub mod parser;

// Re-exports
pub use context::{FileSnapshot, ScopeError, SessionContext};
pub use edit::{EditAction, EditError, FileEdit, Replacement};
pub use engine::{ApplyError, EditOutcome, MutationEngine};
pub use interact::{Interaction, ScriptedInteraction, TerminalInteraction};
pub use parser::dialect::{by_name, DecodedHeader, Dialect, RenameMap, DIALECT_NAMES};
pub use parser::display::DisplayInformation;
pub use parser::{ParseError, ParseOutcome, ProseSink, StreamParser};
