use thiserror::Error;

use realmsync_client::ClientError;
use realmsync_core::CoreError;

/// Engine error taxonomy.
///
/// Every variant halts the run: skipping a failed snapshot would let a later
/// snapshot apply against state its predecessors never produced.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Malformed document {document}: {message}")]
    MalformedDocument { document: String, message: String },

    #[error("Dependency cycle between resource kinds: {}", kinds.join(" -> "))]
    DependencyCycle { kinds: Vec<String> },

    /// A remote call failed outside of the apply phase (fetching live state,
    /// reading checkpoints). Transient retries already happened below the
    /// client boundary.
    #[error("Remote operation failed: {0}")]
    Remote(#[from] ClientError),

    /// One or more operations of a snapshot failed after earlier ones
    /// landed. Reports exactly which operations succeeded so an operator can
    /// diagnose drift before re-running.
    #[error(
        "Partial apply of snapshot {sequence_index} for realm {realm}: \
         {} operation(s) applied, failed at {failed}: {source}",
        applied.len()
    )]
    PartialApplyFailure {
        realm: String,
        sequence_index: u64,
        applied: Vec<String>,
        failed: String,
        #[source]
        source: ClientError,
    },

    #[error("Model error: {0}")]
    Core(#[from] CoreError),
}

impl EngineError {
    pub fn malformed(document: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            document: document.into(),
            message: message.into(),
        }
    }

    /// True when the underlying cause was a transient remote failure whose
    /// retries are already exhausted; a later re-run may succeed unchanged.
    pub fn is_remote_unavailable(&self) -> bool {
        match self {
            Self::Remote(e) => e.is_transient(),
            Self::PartialApplyFailure { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

/// Convenience result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
