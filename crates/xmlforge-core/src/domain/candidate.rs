//! Generated transformation candidates.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Language tag of the restricted transformation language.
pub const DEFAULT_LANGUAGE: &str = "xform";

/// One generated attempt at the transformation.
///
/// Never mutated once produced; the next iteration yields a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCode {
    #[serde(rename = "code")]
    pub source: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "first_iteration")]
    pub iteration: u32,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn first_iteration() -> u32 {
    1
}

impl CandidateCode {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            language: default_language(),
            description: String::new(),
            iteration: 1,
        }
    }

    /// Same candidate tagged with a different iteration number.
    pub fn for_iteration(self, iteration: u32) -> Self {
        Self { iteration, ..self }
    }

    pub fn digest(&self) -> SourceDigest {
        SourceDigest::of(&self.source)
    }
}

/// SHA-256 of a candidate's source text, used to tell candidates apart in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceDigest(String);

impl SourceDigest {
    pub fn of(source: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for SourceDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_defaults() {
        let candidate: CandidateCode = serde_json::from_str(r#"{"code": "fn f() {}"}"#).unwrap();
        assert_eq!(candidate.language, "xform");
        assert_eq!(candidate.iteration, 1);
        assert_eq!(candidate.source, "fn f() {}");
    }

    #[test]
    fn test_for_iteration_keeps_source() {
        let candidate = CandidateCode::new("x").for_iteration(3);
        assert_eq!(candidate.iteration, 3);
        assert_eq!(candidate.source, "x");
    }

    #[test]
    fn test_digest_is_stable_hex() {
        let a = CandidateCode::new("fn transform_xml(i) { return i; }").digest();
        let b = SourceDigest::of("fn transform_xml(i) { return i; }");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert_eq!(a.short().len(), 12);
        assert_ne!(a, SourceDigest::of("other"));
    }
}
