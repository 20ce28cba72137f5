//! In-process tester backed by the sandbox engine.

use async_trait::async_trait;

use super::{CollaboratorResult, Tester};
use crate::domain::{CandidateCode, DocumentPair, ScoreResult};
use crate::sandbox::SandboxEngine;

/// Scores candidates without leaving the process. Never fails: candidate
/// faults are part of the returned score.
#[derive(Debug, Clone, Default)]
pub struct LocalTester {
    engine: SandboxEngine,
}

impl LocalTester {
    pub fn new(engine: SandboxEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tester for LocalTester {
    async fn test(
        &self,
        candidate: &CandidateCode,
        pairs: &[DocumentPair],
    ) -> CollaboratorResult<ScoreResult> {
        Ok(self.engine.score(candidate, pairs).await)
    }
}
