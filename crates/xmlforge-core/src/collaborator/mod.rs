//! The three services a job depends on.
//!
//! - [`Analyzer`]: example pairs (+ feedback) to a [`RuleSet`]
//! - [`Generator`]: rule set + pairs (+ feedback) to a [`CandidateCode`]
//! - [`Tester`]: candidate + pairs to a [`ScoreResult`]
//!
//! [`http`] talks to remote services over JSON; [`local`] scores candidates
//! in-process with the sandbox engine.

pub mod http;
pub mod local;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{CandidateCode, DocumentPair, RuleSet, ScoreResult};

pub use http::{HttpAnalyzer, HttpGenerator, HttpTester, ServiceClient};
pub use local::LocalTester;

/// Which collaborator a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Analyzer,
    Generator,
    Tester,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Service::Analyzer => "Analyzer",
            Service::Generator => "Generator",
            Service::Tester => "Tester",
        })
    }
}

/// A collaborator call that did not produce a usable result.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("[{service}] {status}: {detail}")]
    Status {
        service: Service,
        status: u16,
        detail: String,
    },

    #[error("[{service}] request failed: {source}")]
    Transport {
        service: Service,
        #[source]
        source: reqwest::Error,
    },

    #[error("[{service}] invalid response: {source}")]
    Decode {
        service: Service,
        #[source]
        source: serde_json::Error,
    },
}

impl CollaboratorError {
    pub fn service(&self) -> Service {
        match self {
            CollaboratorError::Status { service, .. }
            | CollaboratorError::Transport { service, .. }
            | CollaboratorError::Decode { service, .. } => *service,
        }
    }
}

/// Result type for collaborator calls.
pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, pairs: &[DocumentPair], feedback: &str) -> CollaboratorResult<RuleSet>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        rules: &RuleSet,
        pairs: &[DocumentPair],
        feedback: &str,
    ) -> CollaboratorResult<CandidateCode>;
}

#[async_trait]
pub trait Tester: Send + Sync {
    async fn test(
        &self,
        candidate: &CandidateCode,
        pairs: &[DocumentPair],
    ) -> CollaboratorResult<ScoreResult>;
}

/// The set of collaborators an orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub analyzer: Arc<dyn Analyzer>,
    pub generator: Arc<dyn Generator>,
    pub tester: Arc<dyn Tester>,
}

impl Collaborators {
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        generator: Arc<dyn Generator>,
        tester: Arc<dyn Tester>,
    ) -> Self {
        Self {
            analyzer,
            generator,
            tester,
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_format() {
        let err = CollaboratorError::Status {
            service: Service::Analyzer,
            status: 503,
            detail: "LLM provider unavailable".into(),
        };
        assert_eq!(err.to_string(), "[Analyzer] 503: LLM provider unavailable");
        assert_eq!(err.service(), Service::Analyzer);
    }

    #[test]
    fn test_decode_error_format() {
        let source = serde_json::from_str::<RuleSet>("[").unwrap_err();
        let err = CollaboratorError::Decode {
            service: Service::Generator,
            source,
        };
        assert!(err.to_string().starts_with("[Generator] invalid response: "));
        assert!(std::error::Error::source(&err).is_some());
    }
}
