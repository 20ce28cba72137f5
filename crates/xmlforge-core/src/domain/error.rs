//! Domain-level error taxonomy for xmlforge.

/// Errors raised by job submission and the job registry.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("invalid job: {0}")]
    InvalidJob(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("job {0} is already running")]
    JobRunning(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for xmlforge domain operations.
pub type Result<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forge_error_display() {
        let err = ForgeError::InvalidJob("at least one XML pair is required".to_string());
        assert_eq!(
            err.to_string(),
            "invalid job: at least one XML pair is required"
        );

        let err = ForgeError::JobNotFound("abc".to_string());
        assert!(err.to_string().contains("job not found"));

        let err = ForgeError::JobRunning("abc".to_string());
        assert_eq!(err.to_string(), "job abc is already running");
    }

    #[test]
    fn test_serde_error_converts() {
        let err: ForgeError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, ForgeError::Serialization(_)));
    }
}
