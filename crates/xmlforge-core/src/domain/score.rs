//! Per-pair and aggregate verdicts for one candidate.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Verdict for a single pair.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreDetail {
    pub pair_id: String,
    pub passed: bool,

    #[serde(rename = "expected_snippet", default)]
    pub expected_excerpt: String,

    #[serde(rename = "actual_snippet", default)]
    pub actual_excerpt: String,

    /// Diff report or failure description; empty on pass.
    #[serde(rename = "diff", default)]
    pub diagnostic: String,
}

impl ScoreDetail {
    pub fn passed(pair_id: impl Into<String>, expected: String, actual: String) -> Self {
        Self {
            pair_id: pair_id.into(),
            passed: true,
            expected_excerpt: expected,
            actual_excerpt: actual,
            diagnostic: String::new(),
        }
    }

    pub fn failed(
        pair_id: impl Into<String>,
        expected: String,
        actual: String,
        diagnostic: String,
    ) -> Self {
        Self {
            pair_id: pair_id.into(),
            passed: false,
            expected_excerpt: expected,
            actual_excerpt: actual,
            diagnostic,
        }
    }
}

/// Aggregate result of running one candidate against every pair.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreResult {
    pub total_pairs: usize,
    pub passed_pairs: usize,
    pub accuracy: f64,

    /// Same order as the pairs that were scored.
    #[serde(default)]
    pub details: Vec<ScoreDetail>,

    /// Whole-run failure, such as a candidate that does not load.
    #[serde(
        rename = "error_message",
        default,
        serialize_with = "none_as_empty",
        deserialize_with = "empty_as_none"
    )]
    pub top_level_error: Option<String>,
}

impl ScoreResult {
    /// Aggregate per-pair details, keeping their order.
    pub fn from_details(details: Vec<ScoreDetail>) -> Self {
        let total_pairs = details.len();
        let passed_pairs = details.iter().filter(|d| d.passed).count();
        Self {
            total_pairs,
            passed_pairs,
            accuracy: round_accuracy(passed_pairs, total_pairs),
            details,
            top_level_error: None,
        }
    }

    /// A run that never reached per-pair execution.
    pub fn run_failure(total_pairs: usize, error: impl Into<String>) -> Self {
        Self {
            total_pairs,
            passed_pairs: 0,
            accuracy: 0.0,
            details: Vec::new(),
            top_level_error: Some(error.into()),
        }
    }

    pub fn failed_details(&self) -> impl Iterator<Item = &ScoreDetail> {
        self.details.iter().filter(|d| !d.passed)
    }
}

/// `passed / total` rounded to four decimal places; zero when there are no pairs.
pub fn round_accuracy(passed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let ratio = passed as f64 / total as f64;
    (ratio * 10_000.0).round() / 10_000.0
}

fn none_as_empty<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_deref().unwrap_or(""))
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
