//! Ledger client error types.

/// Errors from ledger queries and commands.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// HTTP transport error.
    #[error("HTTP error calling {method}: {source}")]
    Http {
        /// JSON-RPC method.
        method: String,
        /// Underlying transport failure.
        source: reqwest::Error,
    },

    /// The node returned a non-2xx status.
    #[error("ledger RPC {method} returned {status}: {body}")]
    Status {
        /// JSON-RPC method.
        method: String,
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The node returned a JSON-RPC error object.
    #[error("ledger RPC {method} failed: {message} (code {code})")]
    Rpc {
        /// JSON-RPC method.
        method: String,
        /// Error code, 0 when absent.
        code: i64,
        /// Error message.
        message: String,
    },

    /// Response body is not valid JSON.
    #[error("failed to deserialize response from {method}: {source}")]
    Deserialization {
        /// JSON-RPC method.
        method: String,
        /// Underlying decode failure.
        source: reqwest::Error,
    },

    /// Response is JSON but not of the expected shape.
    #[error("malformed response from {method}: {reason}")]
    Malformed {
        /// JSON-RPC method.
        method: String,
        /// What was wrong.
        reason: String,
    },

    /// A backend without an HTTP transport (such as the in-memory ledger)
    /// refused the call.
    #[error("ledger backend unavailable: {0}")]
    Unavailable(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl LedgerError {
    /// Whether repeating the same query may succeed: transport failures,
    /// timeouts and 5xx statuses.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Deserialization { source, .. } => source.is_timeout(),
            Self::Rpc { .. } | Self::Malformed { .. } | Self::Unavailable(_) | Self::Config(_) => {
                false
            }
        }
    }

    /// JSON-RPC method the error belongs to, when known.
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Http { method, .. }
            | Self::Status { method, .. }
            | Self::Rpc { method, .. }
            | Self::Deserialization { method, .. }
            | Self::Malformed { method, .. } => Some(method),
            Self::Unavailable(_) | Self::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_error_display() {
        let err = LedgerError::Rpc {
            method: "sendBasicTransactionWithData".into(),
            code: -32602,
            message: "Invalid params".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sendBasicTransactionWithData"));
        assert!(msg.contains("-32602"));
        assert_eq!(err.method(), Some("sendBasicTransactionWithData"));
    }

    #[test]
    fn status_error_display() {
        let err = LedgerError::Status {
            method: "getBlockNumber".into(),
            status: 503,
            body: "busy".into(),
        };
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn transient_classification() {
        let status = |status| LedgerError::Status {
            method: "getBlockNumber".into(),
            status,
            body: String::new(),
        };
        assert!(status(503).is_transient());
        assert!(status(500).is_transient());
        assert!(!status(404).is_transient());
        assert!(!LedgerError::Rpc {
            method: "getBlockNumber".into(),
            code: -1,
            message: "nope".into(),
        }
        .is_transient());
        assert!(!LedgerError::Unavailable("offline".into()).is_transient());
    }

    #[test]
    fn unavailable_has_no_method() {
        let err = LedgerError::Unavailable("offline".into());
        assert!(err.method().is_none());
        assert!(err.to_string().contains("offline"));
    }
}
