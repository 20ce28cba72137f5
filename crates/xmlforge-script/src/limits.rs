use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Deepest nesting of lists and maps inside one another.
pub const MAX_VALUE_DEPTH: usize = 64;

/// Resource ceilings enforced while a program runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionLimits {
    /// Evaluation steps (statements, expressions, loop turns, native work units).
    pub max_operations: u64,
    pub max_call_depth: usize,
    /// Bytes for strings, items for lists and maps.
    pub max_value_len: usize,
    pub max_print_bytes: usize,
    /// Wall-clock bound for one call; checked cooperatively.
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_operations: 2_000_000,
            max_call_depth: 64,
            max_value_len: 1_000_000,
            max_print_bytes: 16 * 1024,
            timeout: None,
        }
    }
}

impl ExecutionLimits {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
