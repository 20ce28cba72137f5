//! Scoring a candidate against every example pair.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::debug;
use xmlforge_script::{Invocation, LoadError, Program, ReturnValue, ENTRY_POINT};

use super::execution::run_isolated;
use super::policy::SandboxPolicy;
use super::source::extract_source;
use crate::compare::{compare, excerpt};
use crate::domain::{CandidateCode, DocumentPair, ScoreDetail, ScoreResult};
use crate::obs;

/// Characters of each document quoted in a pair verdict.
pub const EXCERPT_CHARS: usize = 300;

/// Longest runtime error description kept in a diagnostic.
const MAX_ERROR_CHARS: usize = 2_000;

/// Longest captured `print` output kept in a diagnostic.
const MAX_PRINTED_CHARS: usize = 1_000;

/// Runs candidates under a [`SandboxPolicy`].
#[derive(Debug, Clone, Default)]
pub struct SandboxEngine {
    policy: SandboxPolicy,
}

impl SandboxEngine {
    pub fn new(policy: SandboxPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    /// Load `candidate` and score it against `pairs`.
    ///
    /// A candidate that cannot be loaded fails the whole run with no per-pair
    /// details. Otherwise every pair gets a detail, in the order of `pairs`.
    pub async fn score(&self, candidate: &CandidateCode, pairs: &[DocumentPair]) -> ScoreResult {
        let digest = candidate.digest();
        let program = match self.load(candidate).await {
            Ok(program) => program,
            Err(reason) => {
                obs::emit_sandbox_load_failed(digest.short(), &reason);
                return ScoreResult::run_failure(pairs.len(), reason);
            }
        };

        let parallelism = self.policy.max_parallel_pairs.max(1);
        let runs: Vec<_> = pairs
            .iter()
            .map(|pair| self.run_pair(Arc::clone(&program), pair.clone()))
            .collect();
        let details: Vec<ScoreDetail> = stream::iter(runs).buffered(parallelism).collect().await;

        let score = ScoreResult::from_details(details);
        debug!(
            candidate = %digest.short(),
            passed = score.passed_pairs,
            total = score.total_pairs,
            "candidate scored"
        );
        score
    }

    /// Load the candidate on a worker, returning the whole-run failure text on error.
    pub async fn load(&self, candidate: &CandidateCode) -> Result<Arc<Program>, String> {
        if !self.policy.accepts(&candidate.language) {
            return Err(format!(
                "Failed to load generated code: unsupported candidate language '{}'",
                candidate.language
            ));
        }
        let source = extract_source(&candidate.source).to_string();
        let limits = self.policy.call_limits();
        let loaded = run_isolated("xmlforge-load", self.policy.pair_timeout(), move || {
            xmlforge_script::load(&source, &limits)
        })
        .await;

        match loaded {
            Ok(Ok(program)) => Ok(Arc::new(program)),
            Ok(Err(err)) => Err(load_failure_text(&err)),
            Err(err) => Err(format!("Failed to load generated code: {err}")),
        }
    }

    async fn run_pair(&self, program: Arc<Program>, pair: DocumentPair) -> ScoreDetail {
        let input = pair.input.clone();
        let limits = self.policy.call_limits();
        let called = run_isolated("xmlforge-pair", self.policy.pair_timeout(), move || {
            program.call_entry(&input, &limits)
        })
        .await;

        let expected = excerpt(&pair.output, EXCERPT_CHARS);
        let detail = match called {
            Ok(invocation) => judge(&pair, invocation, expected),
            Err(err) => ScoreDetail::failed(&pair.id, expected, String::new(), err.to_string()),
        };
        if !detail.passed {
            let reason = detail.diagnostic.lines().next().unwrap_or("");
            obs::emit_sandbox_pair_failed(&pair.id, reason);
        }
        detail
    }
}

/// Whole-run failure text for a candidate that did not load.
pub fn load_failure_text(err: &LoadError) -> String {
    match err {
        LoadError::Syntax { .. } => format!("Syntax error in generated code: {err}"),
        LoadError::MissingEntryPoint { .. } => {
            format!("Generated code does not define a '{ENTRY_POINT}' function.")
        }
        LoadError::EntryPointSignature { params, .. } => format!(
            "Generated code defines '{ENTRY_POINT}' with {params} parameter(s); expected exactly 1."
        ),
        other => format!("Failed to load generated code: {other}"),
    }
}

fn judge(pair: &DocumentPair, invocation: Invocation, expected: String) -> ScoreDetail {
    let Invocation {
        outcome, printed, ..
    } = invocation;

    let detail = match outcome {
        Err(err) => ScoreDetail::failed(
            &pair.id,
            expected,
            String::new(),
            format!("Runtime error: {}", excerpt(&err.to_string(), MAX_ERROR_CHARS)),
        ),
        Ok(ReturnValue::Other {
            type_name,
            rendered,
        }) => ScoreDetail::failed(
            &pair.id,
            expected,
            excerpt(&rendered, EXCERPT_CHARS),
            format!("{ENTRY_POINT} returned {type_name}, expected str."),
        ),
        Ok(ReturnValue::Text(actual)) => {
            let comparison = compare(&pair.output, &actual);
            let actual = excerpt(&actual, EXCERPT_CHARS);
            if comparison.is_equal() {
                return ScoreDetail::passed(&pair.id, expected, actual);
            }
            ScoreDetail::failed(&pair.id, expected, actual, comparison.report())
        }
    };

    with_printed(detail, &printed)
}

fn with_printed(mut detail: ScoreDetail, printed: &str) -> ScoreDetail {
    if !printed.trim().is_empty() {
        detail.diagnostic.push_str("\n\nCaptured output:\n");
        detail
            .diagnostic
            .push_str(&excerpt(printed, MAX_PRINTED_CHARS));
    }
    detail
}
