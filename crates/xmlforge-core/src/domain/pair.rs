//! Example document pairs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ForgeError, Result};

/// One input document and the output the transformation must produce for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPair {
    #[serde(rename = "input_xml")]
    pub input: String,

    #[serde(rename = "output_xml")]
    pub output: String,

    /// Short token used to refer to the pair in reports.
    #[serde(rename = "pair_id", default = "new_pair_id")]
    pub id: String,
}

impl DocumentPair {
    /// Create a pair with a fresh 8-character id.
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            id: new_pair_id(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

fn new_pair_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Zip separately supplied input and output documents into pairs.
pub fn pairs_from_lists(inputs: Vec<String>, outputs: Vec<String>) -> Result<Vec<DocumentPair>> {
    if inputs.len() != outputs.len() {
        return Err(ForgeError::InvalidJob(format!(
            "the number of input and output documents must match ({} vs {})",
            inputs.len(),
            outputs.len()
        )));
    }
    Ok(inputs
        .into_iter()
        .zip(outputs)
        .map(|(input, output)| DocumentPair::new(input, output))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_ids_are_short_and_distinct() {
        let a = DocumentPair::new("<a/>", "<b/>");
        let b = DocumentPair::new("<a/>", "<b/>");
        assert_eq!(a.id.len(), 8);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_wire_names_and_default_id() {
        let pair: DocumentPair =
            serde_json::from_str(r#"{"input_xml": "<a/>", "output_xml": "<b/>"}"#).unwrap();
        assert_eq!(pair.input, "<a/>");
        assert_eq!(pair.id.len(), 8);

        let json = serde_json::to_value(pair.with_id("p1")).unwrap();
        assert_eq!(json["pair_id"], "p1");
        assert_eq!(json["output_xml"], "<b/>");
    }

    #[test]
    fn test_pairs_from_lists_requires_matching_counts() {
        let err = pairs_from_lists(vec!["<a/>".into()], vec![]).unwrap_err();
        assert!(err.to_string().contains("must match"));

        let pairs = pairs_from_lists(vec!["<a/>".into()], vec!["<b/>".into()]).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].output, "<b/>");
    }
}
