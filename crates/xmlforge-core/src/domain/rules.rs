//! Mapping rules proposed by the analyzer.
//!
//! The core never interprets these beyond forwarding them to the generator,
//! so unknown fields are preserved on a round trip.

use serde::{Deserialize, Serialize};

/// How one source location maps onto one target location.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(default)]
    pub source_path: String,
    #[serde(default)]
    pub target_path: String,
    /// "1:1", "1:N", "N:1" or "constant".
    #[serde(default)]
    pub mapping_type: String,
    #[serde(default)]
    pub description: String,
}

/// A rule that is not a plain field mapping: value transforms, conditionals, sorting.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformationRule {
    #[serde(default)]
    pub rule_id: String,
    #[serde(default)]
    pub rule_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// Output of the analyze step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub field_mappings: Vec<FieldMapping>,
    pub transformation_rules: Vec<TransformationRule>,
    pub input_schema_summary: String,
    pub output_schema_summary: String,
    pub notes: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RuleSet {
    /// No mappings and no rules: nothing for a generator to work from.
    pub fn is_empty(&self) -> bool {
        self.field_mappings.is_empty() && self.transformation_rules.is_empty()
    }
}
