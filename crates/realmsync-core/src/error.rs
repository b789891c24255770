use thiserror::Error;

/// Core error types for realmsync model operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown resource kind: {0}")]
    UnknownKind(String),

    #[error("Resource kind already registered: {0}")]
    DuplicateKind(String),

    #[error("Invalid identity key for {kind}: {message}")]
    InvalidIdentity { kind: String, message: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new UnknownKind error
    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        Self::UnknownKind(kind.into())
    }

    /// Create a new DuplicateKind error
    pub fn duplicate_kind(kind: impl Into<String>) -> Self {
        Self::DuplicateKind(kind.into())
    }

    /// Create a new InvalidIdentity error
    pub fn invalid_identity(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
