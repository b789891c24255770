use thiserror::Error;

/// Errors surfaced by remote-resource clients and checkpoint stores.
///
/// Transient failures are retried inside the client; `Unavailable` is what
/// remains once retries are exhausted, and it is the only variant callers
/// should treat as possibly-transient.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Remote server unavailable: {message}")]
    Unavailable { message: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("No read-back path for write-only field {field} on kind {kind}")]
    Unsupported { kind: String, field: String },

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    pub fn unsupported(kind: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Unsupported {
            kind: kind.into(),
            field: field.into(),
        }
    }

    /// True when a retry of the whole run may succeed without changes.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Convenience result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ClientError::unavailable("connection refused");
        assert_eq!(
            err.to_string(),
            "Remote server unavailable: connection refused"
        );
        assert!(err.is_transient());

        let err = ClientError::api(409, "already exists");
        assert_eq!(err.to_string(), "API error (HTTP 409): already exists");
        assert!(!err.is_transient());

        let err = ClientError::unsupported("roles", "secret");
        assert_eq!(
            err.to_string(),
            "No read-back path for write-only field secret on kind roles"
        );
    }
}
