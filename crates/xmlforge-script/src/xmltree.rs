//! Mutable XML element tree manipulated by candidate programs.
//!
//! Elements are reference-counted and carry a weak parent link so that
//! `append` can move nodes, refuse cycles and keep every tree within
//! [`MAX_XML_DEPTH`] levels. The depth bound keeps recursive traversal and
//! drop well inside a worker thread's stack.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Deepest element nesting a tree may reach.
pub const MAX_XML_DEPTH: usize = 256;

pub type NodeRef = Rc<RefCell<Element>>;

#[derive(Debug, Clone)]
pub enum XmlChild {
    Element(NodeRef),
    Text(String),
}

#[derive(Debug, Default)]
pub struct Element {
    /// Namespace-local name.
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlChild>,
    parent: Weak<RefCell<Element>>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> NodeRef {
        Rc::new(RefCell::new(Element {
            name: name.into(),
            ..Default::default()
        }))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attribute(&mut self, name: &str, value: String) {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) {
        self.attributes.retain(|(key, _)| key != name);
    }

    /// Element children, skipping text.
    pub fn element_children(&self) -> Vec<NodeRef> {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlChild::Element(node) => Some(Rc::clone(node)),
                XmlChild::Text(_) => None,
            })
            .collect()
    }

    /// Concatenated direct text children.
    pub fn direct_text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlChild::Text(text) => Some(text.as_str()),
                XmlChild::Element(_) => None,
            })
            .collect()
    }

    /// Replace all direct text with a single leading text node.
    pub fn set_text(&mut self, text: String) {
        self.children
            .retain(|child| matches!(child, XmlChild::Element(_)));
        if !text.is_empty() {
            self.children.insert(0, XmlChild::Text(text));
        }
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.parent.upgrade()
    }
}

/// Why a structural edit was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    Cycle,
    TooDeep { depth: usize },
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeError::Cycle => write!(f, "cannot append a node to itself or its own descendant"),
            TreeError::TooDeep { depth } => write!(
                f,
                "resulting tree would be {depth} levels deep (limit {MAX_XML_DEPTH})"
            ),
        }
    }
}

/// Depth of `node` counted from its root (root = 1).
pub fn depth_of(node: &NodeRef) -> usize {
    let mut depth = 1;
    let mut current = node.borrow().parent();
    while let Some(parent) = current {
        depth += 1;
        current = parent.borrow().parent();
    }
    depth
}

/// Height of the subtree under `node` (leaf = 1). Also returns its node count.
pub fn height_and_size(node: &NodeRef) -> (usize, usize) {
    let mut stack = vec![(Rc::clone(node), 1usize)];
    let mut height = 0;
    let mut size = 0;
    while let Some((current, level)) = stack.pop() {
        size += 1;
        height = height.max(level);
        for child in current.borrow().element_children() {
            stack.push((child, level + 1));
        }
    }
    (height, size)
}

/// Append `child` to `parent`, detaching it from any previous parent.
pub fn append_child(parent: &NodeRef, child: &NodeRef) -> Result<(), TreeError> {
    let mut cursor = Some(Rc::clone(parent));
    while let Some(node) = cursor {
        if Rc::ptr_eq(&node, child) {
            return Err(TreeError::Cycle);
        }
        cursor = node.borrow().parent();
    }

    let (height, _) = height_and_size(child);
    let depth = depth_of(parent) + height;
    if depth > MAX_XML_DEPTH {
        return Err(TreeError::TooDeep { depth });
    }

    detach(child);
    child.borrow_mut().parent = Rc::downgrade(parent);
    parent
        .borrow_mut()
        .children
        .push(XmlChild::Element(Rc::clone(child)));
    Ok(())
}

/// Remove `node` from its parent's child list, if it has one.
pub fn detach(node: &NodeRef) {
    let Some(parent) = node.borrow().parent() else {
        return;
    };
    parent.borrow_mut().children.retain(|c| match c {
        XmlChild::Element(existing) => !Rc::ptr_eq(existing, node),
        XmlChild::Text(_) => true,
    });
    node.borrow_mut().parent = Weak::new();
}

/// Drop every child of `node`.
pub fn clear_children(node: &NodeRef) {
    let children = std::mem::take(&mut node.borrow_mut().children);
    for child in children {
        if let XmlChild::Element(element) = child {
            element.borrow_mut().parent = Weak::new();
        }
    }
}

/// Detached deep copy.
pub fn deep_copy(node: &NodeRef) -> NodeRef {
    let source = node.borrow();
    let copy = Rc::new(RefCell::new(Element {
        name: source.name.clone(),
        attributes: source.attributes.clone(),
        children: Vec::with_capacity(source.children.len()),
        parent: Weak::new(),
    }));
    for child in &source.children {
        let cloned = match child {
            XmlChild::Text(text) => XmlChild::Text(text.clone()),
            XmlChild::Element(element) => {
                let sub = deep_copy(element);
                sub.borrow_mut().parent = Rc::downgrade(&copy);
                XmlChild::Element(sub)
            }
        };
        copy.borrow_mut().children.push(cloned);
    }
    copy
}

/// All descendant text in document order.
pub fn all_text(node: &NodeRef) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &NodeRef, out: &mut String) {
    for child in &node.borrow().children {
        match child {
            XmlChild::Text(text) => out.push_str(text),
            XmlChild::Element(element) => collect_text(element, out),
        }
    }
}

/// Reject markup nested deeper than `max` elements without building anything.
///
/// A single linear pass over the text that counts start and end tags. It
/// skips comments, CDATA sections, processing instructions and declarations,
/// and honors quoted attribute values. It does not validate; malformed input
/// that passes is left for the parser to report.
pub fn check_nesting(text: &str, max: usize) -> Result<(), String> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while let Some(offset) = find_byte(b'<', &bytes[i..]) {
        let start = i + offset;
        let rest = &bytes[start..];
        i = if rest.starts_with(b"<!--") {
            skip_past(bytes, start + 4, b"-->")
        } else if rest.starts_with(b"<![CDATA[") {
            skip_past(bytes, start + 9, b"]]>")
        } else if rest.starts_with(b"<?") {
            skip_past(bytes, start + 2, b"?>")
        } else if rest.starts_with(b"<!") {
            skip_past(bytes, start + 2, b">")
        } else if rest.starts_with(b"</") {
            depth = depth.saturating_sub(1);
            skip_past(bytes, start + 2, b">")
        } else {
            let (end, self_closing) = start_tag_end(bytes, start + 1);
            if !self_closing {
                depth += 1;
                if depth > max {
                    return Err(format!("document nesting exceeds {max} levels"));
                }
            }
            end
        };
    }
    Ok(())
}

fn find_byte(needle: u8, haystack: &[u8]) -> Option<usize> {
    haystack.iter().position(|&b| b == needle)
}

fn skip_past(bytes: &[u8], from: usize, terminator: &[u8]) -> usize {
    bytes[from.min(bytes.len())..]
        .windows(terminator.len())
        .position(|w| w == terminator)
        .map_or(bytes.len(), |at| from + at + terminator.len())
}

// Offset just past the `>` closing a start tag, and whether it was `/>`.
fn start_tag_end(bytes: &[u8], from: usize) -> (usize, bool) {
    let mut quote: Option<u8> = None;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return (i + 1, i > from && bytes[i - 1] == b'/'),
            None => {}
        }
        i += 1;
    }
    (bytes.len(), false)
}

/// Parse a document into a detached tree rooted at its document element.
///
/// Namespace prefixes are dropped from element and attribute names;
/// namespace declarations are not carried over. DTDs are refused, as is
/// nesting beyond [`MAX_XML_DEPTH`], which is checked before parsing.
pub fn parse_document(text: &str) -> Result<NodeRef, String> {
    check_nesting(text, MAX_XML_DEPTH)?;
    let doc = roxmltree::Document::parse(text.trim()).map_err(|e| e.to_string())?;
    build(doc.root_element(), 1)
}

fn build(source: roxmltree::Node<'_, '_>, depth: usize) -> Result<NodeRef, String> {
    if depth > MAX_XML_DEPTH {
        return Err(format!("document nesting exceeds {MAX_XML_DEPTH} levels"));
    }
    let element = Element::new(source.tag_name().name());
    {
        let mut target = element.borrow_mut();
        for attr in source.attributes() {
            target
                .attributes
                .push((attr.name().to_string(), attr.value().to_string()));
        }
    }
    for child in source.children() {
        if child.is_element() {
            let sub = build(child, depth + 1)?;
            sub.borrow_mut().parent = Rc::downgrade(&element);
            element.borrow_mut().children.push(XmlChild::Element(sub));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                element
                    .borrow_mut()
                    .children
                    .push(XmlChild::Text(text.to_string()));
            }
        }
    }
    Ok(element)
}

/// Output exceeded the size cap while serializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputTooLarge;

/// Serialize `node` into `out`, failing once `out` exceeds `limit` bytes.
pub fn serialize_into(node: &NodeRef, out: &mut String, limit: usize) -> Result<(), OutputTooLarge> {
    let element = node.borrow();
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        escape_into(value, true, out);
        out.push('"');
    }
    if element.children.is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
        for child in &element.children {
            match child {
                XmlChild::Text(text) => escape_into(text, false, out),
                XmlChild::Element(sub) => serialize_into(sub, out, limit)?,
            }
            if out.len() > limit {
                return Err(OutputTooLarge);
            }
        }
        out.push_str("</");
        out.push_str(&element.name);
        out.push('>');
    }
    if out.len() > limit {
        return Err(OutputTooLarge);
    }
    Ok(())
}

/// Escape markup characters. Attribute values also escape quotes and newlines.
pub fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\n' if attribute => out.push_str("&#10;"),
            other => out.push(other),
        }
    }
}

/// Valid element/attribute name for output.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

/// Elements matching a `/`-separated path relative to `node`.
///
/// Segments are local names or `*`; `.` stays on the current node. A leading
/// `.//` searches all descendants for the first segment.
pub fn find_path(node: &NodeRef, path: &str) -> Vec<NodeRef> {
    let (descendant, rest) = match path.strip_prefix(".//") {
        Some(rest) => (true, rest),
        None => (false, path.trim_start_matches("./")),
    };
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let Some((first, tail)) = segments.split_first() else {
        return vec![Rc::clone(node)];
    };

    let mut current: Vec<NodeRef> = if descendant {
        let mut found = Vec::new();
        collect_descendants(node, first, &mut found);
        found
    } else {
        step(&[Rc::clone(node)], first)
    };
    for segment in tail {
        current = step(&current, segment);
    }
    current
}

fn step(nodes: &[NodeRef], segment: &str) -> Vec<NodeRef> {
    if segment == "." {
        return nodes.to_vec();
    }
    nodes
        .iter()
        .flat_map(|node| node.borrow().element_children())
        .filter(|child| segment == "*" || child.borrow().name == segment)
        .collect()
}

fn collect_descendants(node: &NodeRef, name: &str, out: &mut Vec<NodeRef>) {
    for child in node.borrow().element_children() {
        if name == "*" || child.borrow().name == name {
            out.push(Rc::clone(&child));
        }
        collect_descendants(&child, name, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialize(node: &NodeRef) -> String {
        let mut out = String::new();
        serialize_into(node, &mut out, usize::MAX).unwrap();
        out
    }

    #[test]
    fn test_parse_strips_namespace_prefixes() {
        let root = parse_document(r#"<a xmlns:x="urn:x"><x:b x:id="1">v</x:b></a>"#).unwrap();
        assert_eq!(serialize(&root), r#"<a><b id="1">v</b></a>"#);
    }

    #[test]
    fn test_append_moves_node_between_parents() {
        let a = Element::new("a");
        let b = Element::new("b");
        let c = Element::new("c");
        append_child(&a, &c).unwrap();
        append_child(&b, &c).unwrap();
        assert_eq!(serialize(&a), "<a/>");
        assert_eq!(serialize(&b), "<b><c/></b>");
    }

    #[test]
    fn test_append_refuses_cycle() {
        let a = Element::new("a");
        let b = Element::new("b");
        append_child(&a, &b).unwrap();
        assert_eq!(append_child(&b, &a), Err(TreeError::Cycle));
        assert_eq!(append_child(&a, &a), Err(TreeError::Cycle));
    }

    #[test]
    fn test_append_refuses_excessive_depth() {
        let root = Element::new("n");
        let mut tip = Rc::clone(&root);
        for _ in 1..MAX_XML_DEPTH {
            let next = Element::new("n");
            append_child(&tip, &next).unwrap();
            tip = next;
        }
        let extra = Element::new("n");
        assert!(matches!(
            append_child(&tip, &extra),
            Err(TreeError::TooDeep { .. })
        ));
    }

    #[test]
    fn test_find_path_variants() {
        let root =
            parse_document("<r><a><b>1</b><b>2</b></a><c><b>3</b></c></r>").unwrap();
        assert_eq!(find_path(&root, "a/b").len(), 2);
        assert_eq!(find_path(&root, "*/b").len(), 3);
        assert_eq!(find_path(&root, ".//b").len(), 3);
        assert_eq!(find_path(&root, "c/b")[0].borrow().direct_text(), "3");
        assert!(find_path(&root, "missing").is_empty());
    }

    #[test]
    fn test_serialize_escapes_and_limit() {
        let node = Element::new("v");
        node.borrow_mut().set_attribute("q", "a\"b".into());
        node.borrow_mut().set_text("x < y & z".into());
        assert_eq!(serialize(&node), r#"<v q="a&quot;b">x &lt; y &amp; z</v>"#);

        let mut out = String::new();
        assert_eq!(serialize_into(&node, &mut out, 4), Err(OutputTooLarge));
    }

    #[test]
    fn test_deep_copy_is_detached() {
        let root = parse_document("<r><a k=\"1\">t</a></r>").unwrap();
        let a = find_path(&root, "a").remove(0);
        let copy = deep_copy(&a);
        assert!(copy.borrow().parent().is_none());
        copy.borrow_mut().set_attribute("k", "2".into());
        assert_eq!(a.borrow().attribute("k"), Some("1"));
    }

    #[test]
    fn test_nesting_scan_counts_elements_only() {
        let doc = r#"<a><!-- <x><y> --><b k="<c>" j='/>'><![CDATA[<d><e>]]><?pi <f>?><g/></b></a>"#;
        assert!(check_nesting(doc, 2).is_ok());
        assert!(check_nesting(doc, 1).is_err());
        assert!(check_nesting("<a><b></b><c></c></a>", 2).is_ok());
    }

    #[test]
    fn test_nesting_scan_tolerates_truncated_markup() {
        assert!(check_nesting("<a><!-- open", 1).is_ok());
        assert!(check_nesting("<a k=\"", 1).is_ok());
        assert!(check_nesting("<", 1).is_ok());
    }

    #[test]
    fn test_parse_rejects_deep_documents_up_front() {
        let ok = format!("{}{}", "<n>".repeat(MAX_XML_DEPTH), "</n>".repeat(MAX_XML_DEPTH));
        assert!(parse_document(&ok).is_ok());

        let depth = 100_000;
        let deep = format!("{}{}", "<n>".repeat(depth), "</n>".repeat(depth));
        let err = parse_document(&deep).unwrap_err();
        assert!(err.contains("nesting exceeds 256"), "{err}");
    }

    #[test]
    fn test_dtd_is_refused() {
        let doc = r#"<!DOCTYPE r [<!ENTITY e "x">]><r>&e;</r>"#;
        assert!(parse_document(doc).is_err());
    }
}
