//! Resource policy applied to every candidate run.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use xmlforge_script::ExecutionLimits;

use super::error::{SandboxError, SandboxResult};
use crate::domain::DEFAULT_LANGUAGE;

/// Limits and scheduling for the execution engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SandboxPolicy {
    /// Interpreter ceilings for each load and each call.
    pub limits: ExecutionLimits,
    /// Wall-clock bound for loading and for each pair (milliseconds).
    pub pair_timeout_ms: u64,
    /// Pairs evaluated at once.
    pub max_parallel_pairs: usize,
    /// Candidate language tags the engine will run.
    pub accepted_languages: Vec<String>,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            limits: ExecutionLimits::default(),
            pair_timeout_ms: 5_000,
            max_parallel_pairs: 4,
            accepted_languages: vec![DEFAULT_LANGUAGE.to_string()],
        }
    }
}

impl SandboxPolicy {
    pub fn validate(&self) -> SandboxResult<()> {
        if self.pair_timeout_ms == 0 {
            return Err(SandboxError::InvalidConfig(
                "pair_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.max_parallel_pairs == 0 {
            return Err(SandboxError::InvalidConfig(
                "max_parallel_pairs must be at least 1".into(),
            ));
        }
        if self.limits.max_operations == 0 || self.limits.max_call_depth == 0 {
            return Err(SandboxError::InvalidConfig(
                "max_operations and max_call_depth must be at least 1".into(),
            ));
        }
        if self.accepted_languages.is_empty() {
            return Err(SandboxError::InvalidConfig(
                "at least one candidate language must be accepted".into(),
            ));
        }
        Ok(())
    }

    pub fn pair_timeout(&self) -> Duration {
        Duration::from_millis(self.pair_timeout_ms)
    }

    /// Interpreter limits carrying the per-pair deadline.
    pub fn call_limits(&self) -> ExecutionLimits {
        self.limits.clone().with_timeout(self.pair_timeout())
    }

    pub fn accepts(&self, language: &str) -> bool {
        let language = language.trim();
        self.accepted_languages
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = SandboxPolicy::default();
        assert_eq!(policy.pair_timeout_ms, 5_000);
        assert_eq!(policy.max_parallel_pairs, 4);
        assert!(policy.validate().is_ok());
        assert_eq!(
            policy.call_limits().timeout,
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_language_matching() {
        let policy = SandboxPolicy::default();
        assert!(policy.accepts("xform"));
        assert!(policy.accepts(" XForm "));
        assert!(!policy.accepts("python"));
    }

    #[test]
    fn test_invalid_policies() {
        let policy = SandboxPolicy {
            max_parallel_pairs: 0,
            ..SandboxPolicy::default()
        };
        assert!(matches!(policy.validate(), Err(SandboxError::InvalidConfig(_))));

        let policy = SandboxPolicy {
            pair_timeout_ms: 0,
            ..SandboxPolicy::default()
        };
        assert!(policy.validate().is_err());

        let policy = SandboxPolicy {
            accepted_languages: Vec::new(),
            ..SandboxPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_policy_serde_defaults() {
        let policy: SandboxPolicy =
            serde_json::from_str(r#"{"pair_timeout_ms": 250, "limits": {"max_operations": 10}}"#)
                .unwrap();
        assert_eq!(policy.pair_timeout_ms, 250);
        assert_eq!(policy.limits.max_operations, 10);
        assert_eq!(policy.limits.max_call_depth, 64);
        assert_eq!(policy.max_parallel_pairs, 4);
    }
}
