//! Diff-and-apply reconciliation engine.
//!
//! Takes an ordered sequence of desired-state realm documents, compares each
//! against the live server state, and applies only the deltas needed —
//! never destroying resources the documents do not mention unless prune
//! mode is explicitly enabled. A content-digest checkpoint per realm makes
//! re-runs of already-applied sequences a no-op.

pub mod diff;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod order;
pub mod reconciler;
pub mod source;

pub use error::{EngineError, Result};
pub use reconciler::{ReconcileOptions, Reconciler, RunReport, SnapshotOutcome};
pub use source::{DirectorySource, DocumentSource, RawDocument, VecSource};
