//! Local runner and control surface for an external multi-agent pipeline ("crew").
//!
//! The pipeline itself is an opaque collaborator: this crate only prepares its
//! inputs, edits its configuration documents, launches its command-line tool
//! and reads back what it produced. The layout keeps a strict separation:
//!
//! - **[`core`]**: Pure logic (run inputs, outcome classification). No I/O.
//! - **[`io`]**: Side-effecting operations (filesystem, child processes).
//!
//! [`pipeline`] ties the two together for the non-interactive `crew run` entry
//! point; the web UI lives in the separate `crew-ui` crate.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
