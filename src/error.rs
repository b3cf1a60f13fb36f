//! Error types for workspace-gate
//!
//! Errors carry the context needed to decide what happens next in an
//! authentication pass: validation errors go back to the user as a field
//! error, everything else is logged and aborts the pass.

use thiserror::Error;

/// Main error type for workspace-gate operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error other than a 404
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Remote call failed before producing an API response (timeout, connect, client setup)
    #[error("transport error [{operation}]: {message}")]
    Transport {
        /// The remote operation that failed (e.g., "list_bindings")
        operation: String,
        /// Description of what failed
        message: String,
    },

    /// User submission rejected
    #[error("validation error for {field}: {message}")]
    Validation {
        /// Form field the error is attached to
        field: String,
        /// Message key shown next to the field
        message: String,
    },

    /// A referenced resource does not exist
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Resource kind
        kind: String,
        /// Resource namespace
        namespace: String,
        /// Resource name
        name: String,
    },

    /// Stored assignment references a binding discovery no longer returns
    #[error("binding '{binding}' assigned to '{username}' is not bound to the user")]
    ConsistencyFault {
        /// User whose attributes are stale
        username: String,
        /// Binding name stored in the user's attributes
        binding: String,
    },

    /// Some replica patches failed after retries; the ones before them stay applied
    #[error("failed to set replicas for '{username}' on bindings: {}", .failed.join(", "))]
    PartialEnforcement {
        /// User being enforced
        username: String,
        /// Bindings whose patch did not land
        failed: Vec<String>,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a transport error for the given operation
    pub fn transport(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error attached to a form field
    pub fn validation(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create a consistency fault for a stale assignment
    pub fn consistency_fault(username: impl Into<String>, binding: impl Into<String>) -> Self {
        Self::ConsistencyFault {
            username: username.into(),
            binding: binding.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Kube { source } => match source {
                kube::Error::Api(ae) => ae.code == 409 || ae.code == 429 || ae.code >= 500,
                _ => true,
            },
            Self::PartialEnforcement { .. } => true,
            Self::Validation { .. }
            | Self::NotFound { .. }
            | Self::ConsistencyFault { .. }
            | Self::Config(_)
            | Self::Serialization(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_the_field() {
        let err = Error::validation("workspace_name", "workspaceNameInvalid");
        assert_eq!(
            err.to_string(),
            "validation error for workspace_name: workspaceNameInvalid"
        );
        assert!(matches!(err, Error::Validation { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn transport_errors_are_retryable() {
        let err = Error::transport("patch_binding_replicas", "timed out after 10s");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("patch_binding_replicas"));
    }

    #[test]
    fn partial_enforcement_lists_failed_bindings() {
        let err = Error::PartialEnforcement {
            username: "alice".to_string(),
            failed: vec!["b1".to_string(), "b2".to_string()],
        };
        assert!(err.to_string().ends_with("b1, b2"));
        assert!(err.is_retryable());
    }

    #[test]
    fn api_errors_retry_only_on_server_side_codes() {
        let api_err = |code: u16| {
            Error::from(kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message: "boom".to_string(),
                reason: "Whatever".to_string(),
                code,
            }))
        };
        assert!(api_err(503).is_retryable());
        assert!(api_err(409).is_retryable());
        assert!(!api_err(403).is_retryable());
        assert!(!api_err(422).is_retryable());
    }

    #[test]
    fn consistency_fault_is_not_retryable() {
        let err = Error::consistency_fault("alice", "gone-binding");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("gone-binding"));
    }
}
