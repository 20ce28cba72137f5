//! Domain models for xmlforge.
//!
//! Canonical definitions for the entities that flow through a job:
//! - `DocumentPair`: one input/expected-output example
//! - `RuleSet`: mapping rules proposed by the analyzer, forwarded untouched
//! - `CandidateCode`: one generated transformation attempt
//! - `ScoreResult` / `ScoreDetail`: verdicts from running a candidate
//! - `Job`: a submitted learning task and its externally visible state
//!
//! Serde field names match the JSON exchanged with the collaborator services.

pub mod candidate;
pub mod error;
pub mod job;
pub mod pair;
pub mod rules;
pub mod score;

pub use candidate::{CandidateCode, SourceDigest, DEFAULT_LANGUAGE};
pub use error::{ForgeError, Result};
pub use job::{Job, JobOptions, JobStatus, JobSummary};
pub use pair::{pairs_from_lists, DocumentPair};
pub use rules::{FieldMapping, RuleSet, TransformationRule};
pub use score::{round_accuracy, ScoreDetail, ScoreResult};
