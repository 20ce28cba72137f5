//! In-memory collaborators (testing only).
//!
//! Each fake records what it was called with and answers from a script, so
//! orchestrator tests can assert on the exact sequence of calls without a
//! network or a reasoning service.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::collaborator::{
    Analyzer, CollaboratorError, CollaboratorResult, Generator, Service, Tester,
};
use crate::domain::{CandidateCode, DocumentPair, RuleSet, ScoreResult};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A canned non-success response.
#[derive(Debug, Clone)]
struct Failure {
    status: u16,
    detail: String,
}

impl Failure {
    fn error(&self, service: Service) -> CollaboratorError {
        CollaboratorError::Status {
            service,
            status: self.status,
            detail: self.detail.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeAnalyzer
// ---------------------------------------------------------------------------

/// Returns the same rule set every time, or fails every time.
#[derive(Debug, Default)]
pub struct FakeAnalyzer {
    rules: RuleSet,
    failure: Option<Failure>,
    feedback_seen: Mutex<Vec<String>>,
}

impl FakeAnalyzer {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    pub fn failing(status: u16, detail: &str) -> Self {
        Self {
            failure: Some(Failure {
                status,
                detail: detail.to_string(),
            }),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        lock(&self.feedback_seen).len()
    }

    /// Feedback text received by each call, in order.
    pub fn feedback_seen(&self) -> Vec<String> {
        lock(&self.feedback_seen).clone()
    }
}

#[async_trait]
impl Analyzer for FakeAnalyzer {
    async fn analyze(&self, _pairs: &[DocumentPair], feedback: &str) -> CollaboratorResult<RuleSet> {
        lock(&self.feedback_seen).push(feedback.to_string());
        match &self.failure {
            Some(failure) => Err(failure.error(Service::Analyzer)),
            None => Ok(self.rules.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeGenerator
// ---------------------------------------------------------------------------

/// Hands out scripted candidates in order, repeating the last one.
#[derive(Debug, Default)]
pub struct FakeGenerator {
    candidates: Vec<CandidateCode>,
    failure: Option<Failure>,
    feedback_seen: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new(candidates: Vec<CandidateCode>) -> Self {
        Self {
            candidates,
            ..Self::default()
        }
    }

    /// Always the same program.
    pub fn with_source(source: &str) -> Self {
        Self::new(vec![CandidateCode::new(source)])
    }

    pub fn failing(status: u16, detail: &str) -> Self {
        Self {
            failure: Some(Failure {
                status,
                detail: detail.to_string(),
            }),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        lock(&self.feedback_seen).len()
    }

    pub fn feedback_seen(&self) -> Vec<String> {
        lock(&self.feedback_seen).clone()
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(
        &self,
        _rules: &RuleSet,
        _pairs: &[DocumentPair],
        feedback: &str,
    ) -> CollaboratorResult<CandidateCode> {
        let call = {
            let mut seen = lock(&self.feedback_seen);
            seen.push(feedback.to_string());
            seen.len() - 1
        };
        if let Some(failure) = &self.failure {
            return Err(failure.error(Service::Generator));
        }
        let index = call.min(self.candidates.len().saturating_sub(1));
        Ok(self
            .candidates
            .get(index)
            .cloned()
            .unwrap_or_else(|| CandidateCode::new("")))
    }
}

// ---------------------------------------------------------------------------
// ScriptedTester
// ---------------------------------------------------------------------------

/// Returns scripted scores in order, repeating the last one.
#[derive(Debug, Default)]
pub struct ScriptedTester {
    scores: Vec<ScoreResult>,
    failure: Option<Failure>,
    delay: Option<Duration>,
    candidates_seen: Mutex<Vec<CandidateCode>>,
}

impl ScriptedTester {
    pub fn new(scores: Vec<ScoreResult>) -> Self {
        Self {
            scores,
            ..Self::default()
        }
    }

    pub fn failing(status: u16, detail: &str) -> Self {
        Self {
            failure: Some(Failure {
                status,
                detail: detail.to_string(),
            }),
            ..Self::default()
        }
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        lock(&self.candidates_seen).len()
    }

    /// Candidates received by each call, in order.
    pub fn candidates_seen(&self) -> Vec<CandidateCode> {
        lock(&self.candidates_seen).clone()
    }
}

#[async_trait]
impl Tester for ScriptedTester {
    async fn test(
        &self,
        candidate: &CandidateCode,
        pairs: &[DocumentPair],
    ) -> CollaboratorResult<ScoreResult> {
        let call = {
            let mut seen = lock(&self.candidates_seen);
            seen.push(candidate.clone());
            seen.len() - 1
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = &self.failure {
            return Err(failure.error(Service::Tester));
        }
        let index = call.min(self.scores.len().saturating_sub(1));
        Ok(self
            .scores
            .get(index)
            .cloned()
            .unwrap_or_else(|| ScoreResult::from_details(Vec::with_capacity(pairs.len()))))
    }
}
