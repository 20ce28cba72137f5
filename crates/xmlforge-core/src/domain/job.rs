//! Jobs and their lifecycle.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::candidate::CandidateCode;
use super::error::{ForgeError, Result};
use super::pair::DocumentPair;
use super::rules::RuleSet;
use super::score::ScoreResult;

/// Where a job is in the analyze/generate/test loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Analyzing,
    Generating,
    Testing,
    Iterating,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Analyzing => "analyzing",
            Self::Generating => "generating",
            Self::Testing => "testing",
            Self::Iterating => "iterating",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables chosen at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    pub max_iterations: u32,
    pub accuracy_threshold: f64,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            accuracy_threshold: 0.95,
        }
    }
}

impl JobOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(ForgeError::InvalidJob(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.accuracy_threshold > 0.0 && self.accuracy_threshold <= 1.0) {
            return Err(ForgeError::InvalidJob(format!(
                "accuracy_threshold must be in (0, 1], got {}",
                self.accuracy_threshold
            )));
        }
        Ok(())
    }
}

/// A learning task: example pairs plus everything the loop has produced so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "job_id")]
    pub id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,

    #[serde(rename = "xml_pairs")]
    pub pairs: Vec<DocumentPair>,

    #[serde(rename = "analysis")]
    pub rule_set: Option<RuleSet>,

    #[serde(rename = "generated_code")]
    pub candidate: Option<CandidateCode>,

    #[serde(rename = "test_result")]
    pub score: Option<ScoreResult>,

    pub current_iteration: u32,
    pub max_iterations: u32,
    pub accuracy_threshold: f64,
    pub message: String,
}

impl Job {
    /// Validate `pairs` and `options` and create a pending job.
    pub fn new(pairs: Vec<DocumentPair>, options: JobOptions) -> Result<Self> {
        if pairs.is_empty() {
            return Err(ForgeError::InvalidJob(
                "at least one XML pair is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for pair in &pairs {
            if !seen.insert(pair.id.as_str()) {
                return Err(ForgeError::InvalidJob(format!(
                    "duplicate pair id '{}'",
                    pair.id
                )));
            }
        }
        options.validate()?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            pairs,
            rule_set: None,
            candidate: None,
            score: None,
            current_iteration: 0,
            max_iterations: options.max_iterations,
            accuracy_threshold: options.accuracy_threshold,
            message: String::new(),
        })
    }

    /// Back to pending with every loop product cleared. Pairs and options stay.
    pub fn reset(&mut self) {
        self.status = JobStatus::Pending;
        self.rule_set = None;
        self.candidate = None;
        self.score = None;
        self.current_iteration = 0;
        self.message.clear();
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.score.as_ref().map(|s| s.accuracy)
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.id.clone(),
            status: self.status,
            message: self.message.clone(),
        }
    }
}

/// Listing entry for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs() -> Vec<DocumentPair> {
        vec![DocumentPair::new("<a/>", "<b/>")]
    }

    #[test]
    fn test_new_job_defaults() {
        let job = Job::new(pairs(), JobOptions::default()).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.max_iterations, 5);
        assert_eq!(job.accuracy_threshold, 0.95);
        assert_eq!(job.current_iteration, 0);
        assert!(job.accuracy().is_none());
    }

    #[test]
    fn test_validation() {
        assert!(Job::new(Vec::new(), JobOptions::default()).is_err());

        let zero = JobOptions {
            max_iterations: 0,
            ..JobOptions::default()
        };
        assert!(Job::new(pairs(), zero).is_err());

        for threshold in [0.0, -0.5, 1.5, f64::NAN] {
            let options = JobOptions {
                accuracy_threshold: threshold,
                ..JobOptions::default()
            };
            assert!(options.validate().is_err(), "threshold {threshold} accepted");
        }

        let dup = vec![
            DocumentPair::new("<a/>", "<b/>").with_id("x"),
            DocumentPair::new("<c/>", "<d/>").with_id("x"),
        ];
        let err = Job::new(dup, JobOptions::default()).unwrap_err();
        assert!(err.to_string().contains("duplicate pair id 'x'"));
    }

    #[test]
    fn test_reset_clears_loop_products() {
        let mut job = Job::new(pairs(), JobOptions::default()).unwrap();
        job.status = JobStatus::Completed;
        job.rule_set = Some(RuleSet::default());
        job.candidate = Some(CandidateCode::new("x"));
        job.score = Some(ScoreResult::from_details(Vec::new()));
        job.current_iteration = 3;
        job.message = "done".to_string();

        job.reset();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.rule_set.is_none() && job.candidate.is_none() && job.score.is_none());
        assert_eq!(job.current_iteration, 0);
        assert!(job.message.is_empty());
        assert_eq!(job.pairs.len(), 1);
    }

    #[test]
    fn test_status_serde_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Iterating).unwrap(),
            "\"iterating\""
        );
        let status: JobStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert!(status.is_terminal());
        assert!(!JobStatus::Testing.is_terminal());
        assert_eq!(JobStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_job_wire_names() {
        let job = Job::new(pairs(), JobOptions::default()).unwrap();
        let json = serde_json::to_value(&job).unwrap();
        assert!(json.get("job_id").is_some());
        assert!(json.get("xml_pairs").is_some());
        assert!(json["analysis"].is_null());
        assert!(json["generated_code"].is_null());
        assert!(json["test_result"].is_null());
        assert_eq!(json["status"], "pending");
    }
}
