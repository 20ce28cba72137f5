//! JSON-over-HTTP collaborators.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{Analyzer, CollaboratorError, CollaboratorResult, Generator, Service, Tester};
use crate::domain::{CandidateCode, DocumentPair, RuleSet, ScoreResult};

/// Uniform per-request timeout for collaborator calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Characters of an error body kept in a status error.
const MAX_DETAIL_CHARS: usize = 500;

/// Shared HTTP client for all collaborator services.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: Client,
}

impl ServiceClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// POST `body` as JSON and decode a JSON reply.
    ///
    /// Any status of 400 or above becomes [`CollaboratorError::Status`]. No
    /// retries happen at this level.
    pub async fn post_json<B, T>(&self, service: Service, url: &str, body: &B) -> CollaboratorResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(service = %service, url = %url, "collaborator request");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| CollaboratorError::Transport { service, source })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let text = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Status {
                service,
                status: status.as_u16(),
                detail: error_detail(&text),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| CollaboratorError::Transport { service, source })?;
        serde_json::from_slice(&bytes).map_err(|source| CollaboratorError::Decode { service, source })
    }
}

/// Human-readable detail from an error body: the `detail` field of a JSON
/// object, else the object itself, else the raw text. Bounded in length.
pub fn error_detail(body: &str) -> String {
    let detail = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(detail)) => detail.clone(),
            Some(other) => other.to_string(),
            None => serde_json::Value::Object(map).to_string(),
        },
        _ => body.to_string(),
    };
    detail.chars().take(MAX_DETAIL_CHARS).collect()
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

fn is_blank(feedback: &&str) -> bool {
    feedback.is_empty()
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    xml_pairs: &'a [DocumentPair],
    #[serde(skip_serializing_if = "is_blank")]
    feedback: &'a str,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    xml_pairs: &'a [DocumentPair],
    analysis: &'a RuleSet,
    #[serde(skip_serializing_if = "is_blank")]
    feedback: &'a str,
}

#[derive(Serialize)]
struct TestRequest<'a> {
    xml_pairs: &'a [DocumentPair],
    code: &'a str,
    language: &'a str,
}

/// `POST {base}/analyze`.
#[derive(Debug, Clone)]
pub struct HttpAnalyzer {
    client: ServiceClient,
    base_url: String,
}

impl HttpAnalyzer {
    pub fn new(client: ServiceClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Analyzer for HttpAnalyzer {
    async fn analyze(&self, pairs: &[DocumentPair], feedback: &str) -> CollaboratorResult<RuleSet> {
        let body = AnalyzeRequest {
            xml_pairs: pairs,
            feedback,
        };
        self.client
            .post_json(Service::Analyzer, &endpoint(&self.base_url, "analyze"), &body)
            .await
    }
}

/// `POST {base}/generate`.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: ServiceClient,
    base_url: String,
}

impl HttpGenerator {
    pub fn new(client: ServiceClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(
        &self,
        rules: &RuleSet,
        pairs: &[DocumentPair],
        feedback: &str,
    ) -> CollaboratorResult<CandidateCode> {
        let body = GenerateRequest {
            xml_pairs: pairs,
            analysis: rules,
            feedback,
        };
        self.client
            .post_json(Service::Generator, &endpoint(&self.base_url, "generate"), &body)
            .await
    }
}

/// `POST {base}/test`, for a tester running as its own service.
#[derive(Debug, Clone)]
pub struct HttpTester {
    client: ServiceClient,
    base_url: String,
}

impl HttpTester {
    pub fn new(client: ServiceClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Tester for HttpTester {
    async fn test(
        &self,
        candidate: &CandidateCode,
        pairs: &[DocumentPair],
    ) -> CollaboratorResult<ScoreResult> {
        let body = TestRequest {
            xml_pairs: pairs,
            code: &candidate.source,
            language: &candidate.language,
        };
        self.client
            .post_json(Service::Tester, &endpoint(&self.base_url, "test"), &body)
            .await
    }
}
