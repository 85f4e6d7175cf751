//! CodeAtlas git integration: revision-to-revision change detection and
//! workspace sync using libgit2.
//!
//! The diff computer's own job is normalization: relative paths, workspace
//! filtering, added/modified/removed classification. The one failure mode it
//! must never hide: an unresolvable before-revision becomes an explicit
//! full-rescan signal, not an empty diff.

pub mod diff;
pub mod errors;

pub use diff::{DiffComputer, DiffOutcome};
pub use errors::{GitIntegrationError, Result};
