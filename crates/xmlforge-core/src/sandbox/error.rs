//! Error types for the sandbox module.

/// Errors produced by the sandbox layer.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Execution timed out after {limit_ms}ms")]
    Timeout { limit_ms: u64 },

    #[error("Execution aborted: {reason}")]
    Aborted { reason: String },

    #[error("could not start sandbox worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("invalid sandbox configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = std::result::Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_error_display() {
        let err = SandboxError::Timeout { limit_ms: 5000 };
        assert_eq!(err.to_string(), "Execution timed out after 5000ms");

        let err = SandboxError::Aborted {
            reason: "index out of bounds".into(),
        };
        assert_eq!(err.to_string(), "Execution aborted: index out of bounds");

        let err = SandboxError::InvalidConfig("max_parallel_pairs must be at least 1".into());
        assert!(err.to_string().contains("invalid sandbox configuration"));
    }
}
