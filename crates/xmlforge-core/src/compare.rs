//! Namespace-insensitive structural comparison of XML documents.
//!
//! Elements are matched by position: children are compared pairwise up to the
//! shorter list, and a count mismatch is reported once for the parent. Only
//! local names are compared, so `<x:b xmlns:x="u">` and `<b>` are the same
//! element. An element's text is the character data that precedes its first
//! child element, trimmed; comments and processing instructions are ignored.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use roxmltree::{Document, Node};
use xmlforge_script::xmltree::{check_nesting, MAX_XML_DEPTH};

/// Number of differences listed in a report before it is truncated.
pub const MAX_REPORTED_DIFFERENCES: usize = 20;

/// Longest text or attribute value quoted in a difference.
const MAX_VALUE_CHARS: usize = 200;

/// Which side of a comparison a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Expected,
    Actual,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Expected => f.write_str("expected"),
            Side::Actual => f.write_str("actual"),
        }
    }
}

/// One recorded divergence between the expected and actual documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Difference {
    Parse {
        side: Side,
        message: String,
    },
    /// Element names differ; `path` is the parent's path.
    Tag {
        path: String,
        expected: String,
        actual: String,
    },
    Text {
        path: String,
        expected: String,
        actual: String,
    },
    Attributes {
        path: String,
        expected: BTreeMap<String, String>,
        actual: BTreeMap<String, String>,
    },
    ChildCount {
        path: String,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difference::Parse { side, message } => {
                write!(f, "XML parse error in {side} document: {message}")
            }
            Difference::Tag {
                path,
                expected,
                actual,
            } => write!(f, "Tag mismatch at {path}: '{expected}' vs '{actual}'"),
            Difference::Text {
                path,
                expected,
                actual,
            } => write!(f, "Text at {path}: '{expected}' vs '{actual}'"),
            Difference::Attributes {
                path,
                expected,
                actual,
            } => {
                write!(f, "Attributes at {path}: ")?;
                write_attributes(f, expected)?;
                f.write_str(" vs ")?;
                write_attributes(f, actual)
            }
            Difference::ChildCount {
                path,
                expected,
                actual,
            } => write!(f, "Child count at {path}: {expected} vs {actual}"),
        }
    }
}

fn write_attributes(f: &mut fmt::Formatter<'_>, attrs: &BTreeMap<String, String>) -> fmt::Result {
    f.write_str("{")?;
    for (i, (name, value)) in attrs.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{name}=\"{value}\"")?;
    }
    f.write_str("}")
}

/// Verdict of comparing two documents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Comparison {
    pub differences: Vec<Difference>,
}

impl Comparison {
    pub fn is_equal(&self) -> bool {
        self.differences.is_empty()
    }

    /// Numbered report of the first [`MAX_REPORTED_DIFFERENCES`] differences.
    pub fn report(&self) -> String {
        if self.differences.is_empty() {
            return "XML documents are identical.".to_string();
        }
        let mut lines = Vec::with_capacity(MAX_REPORTED_DIFFERENCES + 2);
        lines.push(format!("Found {} difference(s):", self.differences.len()));
        for (i, diff) in self
            .differences
            .iter()
            .take(MAX_REPORTED_DIFFERENCES)
            .enumerate()
        {
            lines.push(format!("  {}. {diff}", i + 1));
        }
        if self.differences.len() > MAX_REPORTED_DIFFERENCES {
            lines.push(format!(
                "  ... and {} more",
                self.differences.len() - MAX_REPORTED_DIFFERENCES
            ));
        }
        lines.join("\n")
    }
}

/// Compare `expected` against `actual`. Never fails: unparseable input is
/// reported as a single difference.
pub fn compare(expected: &str, actual: &str) -> Comparison {
    let expected_doc = match parse(expected) {
        Ok(doc) => doc,
        Err(message) => return parse_failure(Side::Expected, message),
    };
    let actual_doc = match parse(actual) {
        Ok(doc) => doc,
        Err(message) => return parse_failure(Side::Actual, message),
    };
    Comparison {
        differences: compare_trees(expected_doc.root_element(), actual_doc.root_element()),
    }
}

/// Shorthand for `compare(expected, actual).report()`.
pub fn diff_report(expected: &str, actual: &str) -> String {
    compare(expected, actual).report()
}

// Documents nested beyond MAX_XML_DEPTH are refused before roxmltree sees them.
fn parse(text: &str) -> Result<Document<'_>, String> {
    check_nesting(text, MAX_XML_DEPTH)?;
    Document::parse(text.trim()).map_err(|e| e.to_string())
}

fn parse_failure(side: Side, message: String) -> Comparison {
    Comparison {
        differences: vec![Difference::Parse { side, message }],
    }
}

// Depth-first, children visited in document order. An explicit stack keeps
// deep documents off the call stack.
fn compare_trees(expected: Node<'_, '_>, actual: Node<'_, '_>) -> Vec<Difference> {
    let mut differences = Vec::new();
    let mut stack: Vec<(Node<'_, '_>, Node<'_, '_>, Rc<str>)> =
        vec![(expected, actual, Rc::from(""))];

    while let Some((e, a, parent)) = stack.pop() {
        let tag = e.tag_name().name();
        let other = a.tag_name().name();
        if tag != other {
            let path = if parent.is_empty() { "/" } else { &parent };
            differences.push(Difference::Tag {
                path: path.to_string(),
                expected: tag.to_string(),
                actual: other.to_string(),
            });
            continue;
        }
        let path: Rc<str> = Rc::from(format!("{parent}/{tag}"));

        let (expected_text, actual_text) = (leading_text(e), leading_text(a));
        if expected_text.trim() != actual_text.trim() {
            differences.push(Difference::Text {
                path: path.to_string(),
                expected: excerpt(&expected_text, MAX_VALUE_CHARS),
                actual: excerpt(&actual_text, MAX_VALUE_CHARS),
            });
        }

        let (expected_attrs, actual_attrs) = (attributes(e), attributes(a));
        if expected_attrs != actual_attrs {
            differences.push(Difference::Attributes {
                path: path.to_string(),
                expected: quoted(&expected_attrs),
                actual: quoted(&actual_attrs),
            });
        }

        let expected_children: Vec<_> = e.children().filter(Node::is_element).collect();
        let actual_children: Vec<_> = a.children().filter(Node::is_element).collect();
        if expected_children.len() != actual_children.len() {
            differences.push(Difference::ChildCount {
                path: path.to_string(),
                expected: expected_children.len(),
                actual: actual_children.len(),
            });
        }
        for (c1, c2) in expected_children.into_iter().zip(actual_children).rev() {
            stack.push((c1, c2, Rc::clone(&path)));
        }
    }
    differences
}

fn leading_text(node: Node<'_, '_>) -> String {
    let mut text = String::new();
    for child in node.children() {
        if child.is_element() {
            break;
        }
        if let Some(t) = child.text().filter(|_| child.is_text()) {
            text.push_str(t);
        }
    }
    text
}

fn attributes<'a>(node: Node<'a, '_>) -> BTreeMap<&'a str, &'a str> {
    node.attributes()
        .map(|attr| (attr.name(), attr.value()))
        .collect()
}

fn quoted(attrs: &BTreeMap<&str, &str>) -> BTreeMap<String, String> {
    attrs
        .iter()
        .map(|(name, value)| (name.to_string(), excerpt(value, MAX_VALUE_CHARS)))
        .collect()
}

/// Trim `text` and cut it to `max_chars` characters, marking the cut with `...`.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_documents() {
        let doc = r#"<a x="1"><b>t</b><b/></a>"#;
        let result = compare(doc, doc);
        assert!(result.is_equal());
        assert_eq!(result.report(), "XML documents are identical.");
    }

    #[test]
    fn test_namespace_prefixes_are_ignored() {
        let result = compare(r#"<a xmlns:x="u"><x:b>1</x:b></a>"#, "<a><b>1</b></a>");
        assert!(result.is_equal(), "{}", result.report());

        let result = compare(
            r#"<a xmlns:p="urn:p" p:id="7"/>"#,
            r#"<a id="7"/>"#,
        );
        assert!(result.is_equal(), "{}", result.report());
    }

    #[test]
    fn test_text_is_trimmed_and_path_uses_tags() {
        let result = compare(
            "<Root><Code><Value>5</Value></Code></Root>",
            "<Root><Code><Value> 05 </Value></Code></Root>",
        );
        assert_eq!(
            result.differences,
            vec![Difference::Text {
                path: "/Root/Code/Value".into(),
                expected: "5".into(),
                actual: "05".into(),
            }]
        );
        assert_eq!(
            result.report(),
            "Found 1 difference(s):\n  1. Text at /Root/Code/Value: '5' vs '05'"
        );

        assert!(compare("<a>  x\n</a>", "<a>x</a>").is_equal());
    }

    #[test]
    fn test_tag_mismatch_stops_descent() {
        let result = compare("<r><a><x>1</x></a></r>", "<r><b><y>2</y></b></r>");
        assert_eq!(result.differences.len(), 1);
        assert_eq!(
            result.differences[0].to_string(),
            "Tag mismatch at /r: 'a' vs 'b'"
        );

        let root = compare("<a/>", "<b/>");
        assert_eq!(root.differences[0].to_string(), "Tag mismatch at /: 'a' vs 'b'");
    }

    #[test]
    fn test_attribute_set_is_one_difference() {
        let result = compare(r#"<a x="1" y="2" z="3"/>"#, r#"<a x="9" y="8"/>"#);
        assert_eq!(result.differences.len(), 1);
        assert_eq!(
            result.differences[0].to_string(),
            r#"Attributes at /a: {x="1", y="2", z="3"} vs {x="9", y="8"}"#
        );
    }

    #[test]
    fn test_text_mismatch_still_compares_children() {
        let result = compare("<a>t<b>1</b></a>", "<a>u<b>2</b></a>");
        let lines: Vec<String> = result.differences.iter().map(|d| d.to_string()).collect();
        assert_eq!(
            lines,
            vec!["Text at /a: 't' vs 'u'", "Text at /a/b: '1' vs '2'"]
        );
    }

    #[test]
    fn test_child_count_then_positional_children() {
        let result = compare("<a><b>1</b><c/><d/></a>", "<a><c/><b>1</b></a>");
        let lines: Vec<String> = result.differences.iter().map(|d| d.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "Child count at /a: 3 vs 2",
                "Tag mismatch at /a: 'b' vs 'c'",
                "Tag mismatch at /a: 'c' vs 'b'",
            ]
        );
    }

    #[test]
    fn test_differences_in_document_order() {
        let result = compare(
            "<r><a><x>1</x></a><b>2</b></r>",
            "<r><a><x>9</x></a><b>8</b></r>",
        );
        let lines: Vec<String> = result.differences.iter().map(|d| d.to_string()).collect();
        assert_eq!(
            lines,
            vec!["Text at /r/a/x: '1' vs '9'", "Text at /r/b: '2' vs '8'"]
        );
    }

    #[test]
    fn test_leading_text_only() {
        // Text after the first child element is not part of the element's text.
        assert!(compare("<a>x<b/>tail</a>", "<a>x<b/>other</a>").is_equal());
        assert!(compare("<a>x<!-- c -->y<b/></a>", "<a>xy<b/></a>").is_equal());
        assert!(compare("<a><![CDATA[1 < 2]]></a>", "<a>1 &lt; 2</a>").is_equal());
    }

    #[test]
    fn test_parse_errors_are_single_differences() {
        let result = compare("<a>", "<a/>");
        assert!(!result.is_equal());
        assert_eq!(result.differences.len(), 1);
        assert!(result.differences[0]
            .to_string()
            .starts_with("XML parse error in expected document:"));

        let result = compare("<a/>", "not xml");
        assert!(result.differences[0]
            .to_string()
            .starts_with("XML parse error in actual document:"));
    }

    #[test]
    fn test_dtd_is_refused() {
        let doc = r#"<!DOCTYPE a [<!ENTITY e "x">]><a>&e;</a>"#;
        let result = compare("<a>x</a>", doc);
        assert!(matches!(
            result.differences[0],
            Difference::Parse {
                side: Side::Actual,
                ..
            }
        ));
    }

    #[test]
    fn test_report_truncates_at_twenty() {
        let expected: String = format!(
            "<r>{}</r>",
            (0..25).map(|i| format!("<v>{i}</v>")).collect::<String>()
        );
        let actual: String = format!("<r>{}</r>", "<v>x</v>".repeat(25));
        let result = compare(&expected, &actual);
        assert_eq!(result.differences.len(), 25);

        let report = result.report();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "Found 25 difference(s):");
        assert_eq!(lines.len(), 22);
        assert!(lines[20].starts_with("  20. "));
        assert_eq!(lines[21], "  ... and 5 more");
    }

    #[test]
    fn test_exactly_twenty_has_no_trailer() {
        let expected = format!("<r>{}</r>", "<v>1</v>".repeat(20));
        let actual = format!("<r>{}</r>", "<v>2</v>".repeat(20));
        let report = diff_report(&expected, &actual);
        assert_eq!(report.lines().count(), 21);
        assert!(!report.contains("more"));
    }

    #[test]
    fn test_comparison_is_idempotent() {
        let (e, a) = ("<a><b x='1'>t</b></a>", "<a><b x='2'>u</b><c/></a>");
        assert_eq!(compare(e, a), compare(e, a));
    }

    #[test]
    fn test_documents_at_depth_limit_compare() {
        let depth = MAX_XML_DEPTH;
        let doc = format!("{}{}", "<n>".repeat(depth), "</n>".repeat(depth));
        assert!(compare(&doc, &doc).is_equal());
    }

    #[test]
    fn test_overly_deep_documents_are_parse_errors() {
        let depth = 50_000;
        let deep = format!("{}{}", "<n>".repeat(depth), "</n>".repeat(depth));

        let report = diff_report("<n/>", &deep);
        assert!(report.contains("XML parse error in actual document"), "{report}");
        assert!(report.contains("nesting exceeds 256"), "{report}");

        let comparison = compare(&deep, "<n/>");
        assert!(matches!(
            comparison.differences.as_slice(),
            [Difference::Parse { side: Side::Expected, .. }]
        ));
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("  abc  ", 5), "abc");
        assert_eq!(excerpt("abcdef", 3), "abc...");
        assert_eq!(excerpt("ééé", 2), "éé...");
        assert_eq!(excerpt("abc", 3), "abc");
    }
}
