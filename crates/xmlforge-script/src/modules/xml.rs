//! `xml`: build, inspect and serialize element trees.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::builtins::NativeFunction;
use crate::error::{RuntimeError, RuntimeErrorKind, RuntimeResult};
use crate::runtime::Runtime;
use crate::value::{Args, Value};
use crate::xmltree::{self, Element, NodeRef, XmlChild};

pub static FUNCTIONS: &[NativeFunction] = &[
    NativeFunction::pure("xml::parse", 1, 1, parse),
    NativeFunction::pure("xml::element", 1, 3, element),
    NativeFunction::pure("xml::text_element", 2, 2, text_element),
    NativeFunction::pure("xml::name", 1, 1, name),
    NativeFunction::pure("xml::text", 1, 1, text),
    NativeFunction::pure("xml::set_text", 2, 2, set_text),
    NativeFunction::pure("xml::all_text", 1, 1, all_text),
    NativeFunction::pure("xml::attr", 2, 3, attr),
    NativeFunction::pure("xml::set_attr", 3, 3, set_attr),
    NativeFunction::pure("xml::remove_attr", 2, 2, remove_attr),
    NativeFunction::pure("xml::attrs", 1, 1, attrs),
    NativeFunction::pure("xml::children", 1, 2, children),
    NativeFunction::pure("xml::find", 2, 2, find),
    NativeFunction::pure("xml::find_all", 2, 2, find_all),
    NativeFunction::pure("xml::find_text", 2, 3, find_text),
    NativeFunction::pure("xml::append", 2, 2, append),
    NativeFunction::pure("xml::remove_children", 1, 2, remove_children),
    NativeFunction::pure("xml::copy", 1, 1, copy),
    NativeFunction::pure("xml::serialize", 1, 1, serialize),
    NativeFunction::pure("xml::serialize_with_declaration", 1, 1, serialize_with_declaration),
    NativeFunction::pure("xml::escape", 1, 1, escape),
];

const DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

fn xml_error(message: impl Into<String>) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::Xml, message)
}

fn checked_name(name: &str) -> RuntimeResult<&str> {
    if xmltree::is_valid_name(name) {
        Ok(name)
    } else {
        Err(xml_error(format!("invalid XML name {name:?}")))
    }
}

/// Text before the first child element.
fn leading_text(node: &NodeRef) -> String {
    node.borrow()
        .children
        .iter()
        .map_while(|child| match child {
            XmlChild::Text(text) => Some(text.as_str()),
            XmlChild::Element(_) => None,
        })
        .collect()
}

fn parse(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let source = args.str(0)?;
    rt.charge(source.len() as u64 / 32)?;
    let root = xmltree::parse_document(&source).map_err(|e| xml_error(format!("parse error: {e}")))?;
    let (_, nodes) = xmltree::height_and_size(&root);
    rt.charge(nodes as u64)?;
    Ok(Value::Node(root))
}

fn element(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    rt.tick()?;
    let tag = args.str(0)?;
    let node = Element::new(checked_name(&tag)?);
    match args.opt(1) {
        None | Some(Value::Null) => {}
        Some(Value::Map(entries)) => {
            let limit = rt.limits().max_value_len;
            let mut target = node.borrow_mut();
            for (key, value) in entries.iter() {
                target.set_attribute(checked_name(key)?, value.render(limit)?);
            }
        }
        Some(_) => return Err(args.mismatch(1, "map")),
    }
    if let Some(text) = args.opt_str(2)? {
        node.borrow_mut().set_text(text.to_string());
    }
    Ok(Value::Node(node))
}

fn text_element(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    rt.tick()?;
    let tag = args.str(0)?;
    let node = Element::new(checked_name(&tag)?);
    let content = match args.get(1) {
        Value::Null => String::new(),
        other => other.render(rt.limits().max_value_len)?,
    };
    node.borrow_mut().set_text(content);
    Ok(Value::Node(node))
}

fn name(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let node = args.node(0)?;
    let tag = node.borrow().name.clone();
    Ok(Value::str(tag))
}

fn text(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(Value::str(leading_text(&args.node(0)?)))
}

fn set_text(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let node = args.node(0)?;
    let content = match args.get(1) {
        Value::Null => String::new(),
        other => other.render(rt.limits().max_value_len)?,
    };
    node.borrow_mut().set_text(content);
    Ok(Value::Null)
}

fn all_text(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let node = args.node(0)?;
    let (_, nodes) = xmltree::height_and_size(&node);
    rt.charge(nodes as u64)?;
    let collected = xmltree::all_text(&node);
    rt.check_len(collected.len())?;
    Ok(Value::str(collected))
}

fn attr(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let node = args.node(0)?;
    let key = args.str(1)?;
    let found = node.borrow().attribute(&key).map(Value::str);
    Ok(found.unwrap_or_else(|| args.opt(2).cloned().unwrap_or(Value::Null)))
}

fn set_attr(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let node = args.node(0)?;
    let key = args.str(1)?;
    let value = args.get(2).render(rt.limits().max_value_len)?;
    node.borrow_mut().set_attribute(checked_name(&key)?, value);
    Ok(Value::Null)
}

fn remove_attr(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let node = args.node(0)?;
    node.borrow_mut().remove_attribute(&args.str(1)?);
    Ok(Value::Null)
}

fn attrs(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let node = args.node(0)?;
    let entries: BTreeMap<String, Value> = node
        .borrow()
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), Value::str(v)))
        .collect();
    Ok(Value::map(entries))
}

fn children(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let node = args.node(0)?;
    let filter = args.opt_str(1)?;
    let kids = node.borrow().element_children();
    rt.charge(kids.len() as u64 / 8)?;
    let items = kids
        .into_iter()
        .filter(|child| filter.as_deref().map_or(true, |name| child.borrow().name == name))
        .map(Value::Node)
        .collect();
    Ok(Value::list(items))
}

fn select(rt: &mut Runtime, args: &Args) -> RuntimeResult<Vec<NodeRef>> {
    let node = args.node(0)?;
    let path = args.str(1)?;
    let (_, nodes) = xmltree::height_and_size(&node);
    rt.charge(nodes as u64 / 4)?;
    Ok(xmltree::find_path(&node, &path))
}

fn find(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(select(rt, &args)?
        .into_iter()
        .next()
        .map(Value::Node)
        .unwrap_or(Value::Null))
}

fn find_all(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let found = select(rt, &args)?;
    Ok(Value::list(found.into_iter().map(Value::Node).collect()))
}

fn find_text(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    match select(rt, &args)?.first() {
        Some(node) => Ok(Value::str(leading_text(node))),
        None => Ok(args.opt(2).cloned().unwrap_or(Value::Null)),
    }
}

fn append(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let parent = args.node(0)?;
    let child = args.node(1)?;
    let (_, nodes) = xmltree::height_and_size(&child);
    rt.charge(nodes as u64 / 4 + 1)?;
    xmltree::append_child(&parent, &child).map_err(|e| xml_error(e.to_string()))?;
    Ok(Value::Null)
}

fn remove_children(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let node = args.node(0)?;
    match args.opt_str(1)? {
        None => {
            let kids = node.borrow().element_children();
            for kid in kids {
                xmltree::detach(&kid);
            }
        }
        Some(name) => {
            let kids = node.borrow().element_children();
            for kid in kids.iter().filter(|k| k.borrow().name == *name) {
                xmltree::detach(kid);
            }
        }
    }
    Ok(Value::Null)
}

fn copy(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let node = args.node(0)?;
    let (_, nodes) = xmltree::height_and_size(&node);
    rt.charge(nodes as u64)?;
    Ok(Value::Node(xmltree::deep_copy(&node)))
}

fn serialize_node(rt: &mut Runtime, node: &NodeRef, prefix: &str) -> RuntimeResult<Value> {
    let (_, nodes) = xmltree::height_and_size(node);
    rt.charge(nodes as u64 / 2)?;
    let limit = rt.limits().max_value_len;
    let mut out = String::from(prefix);
    xmltree::serialize_into(node, &mut out, limit).map_err(|_| {
        RuntimeError::new(
            RuntimeErrorKind::ValueTooLarge,
            format!("serialized document exceeds {limit} bytes"),
        )
    })?;
    Ok(Value::Str(Rc::from(out)))
}

fn serialize(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    serialize_node(rt, &args.node(0)?, "")
}

fn serialize_with_declaration(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    serialize_node(rt, &args.node(0)?, DECLARATION)
}

fn escape(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let source = args.str(0)?;
    let mut out = String::with_capacity(source.len());
    xmltree::escape_into(&source, false, &mut out);
    rt.check_len(out.len())?;
    Ok(Value::str(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ExecutionLimits;

    fn run(f: fn(&mut Runtime, Args) -> RuntimeResult<Value>, values: Vec<Value>) -> RuntimeResult<Value> {
        let mut rt = Runtime::new(&ExecutionLimits::default());
        f(&mut rt, Args::new("xml::test", values))
    }

    fn doc(text: &str) -> Value {
        run(parse, vec![Value::str(text)]).unwrap()
    }

    fn rendered(v: RuntimeResult<Value>) -> String {
        v.unwrap().render(10_000).unwrap()
    }

    #[test]
    fn test_text_is_leading_text_only() {
        let root = doc("<a>head<b/>tail</a>");
        assert_eq!(rendered(run(text, vec![root.clone()])), "head");
        assert_eq!(rendered(run(all_text, vec![root])), "headtail");
    }

    #[test]
    fn test_find_text_default() {
        let root = doc("<r><x>1</x></r>");
        assert_eq!(rendered(run(find_text, vec![root.clone(), Value::str("x")])), "1");
        let v = run(find_text, vec![root, Value::str("y"), Value::str("none")]);
        assert_eq!(rendered(v), "none");
    }

    #[test]
    fn test_build_and_serialize() {
        let mut attributes = BTreeMap::new();
        attributes.insert("id".to_string(), Value::Int(7));
        let root = run(element, vec![Value::str("Root"), Value::map(attributes)]).unwrap();
        let child = run(text_element, vec![Value::str("Code"), Value::str("a&b")]).unwrap();
        run(append, vec![root.clone(), child]).unwrap();
        assert_eq!(
            rendered(run(serialize, vec![root.clone()])),
            r#"<Root id="7"><Code>a&amp;b</Code></Root>"#
        );
        assert!(rendered(run(serialize_with_declaration, vec![root])).starts_with("<?xml"));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let err = run(element, vec![Value::str("1bad")]).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::Xml);
    }

    #[test]
    fn test_append_cycle_is_runtime_error() {
        let root = doc("<a><b/></a>");
        let b = run(find, vec![root.clone(), Value::str("b")]).unwrap();
        let err = run(append, vec![b, root]).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::Xml);
    }

    #[test]
    fn test_remove_children_by_name() {
        let root = doc("<a><b/><c/><b/></a>");
        run(remove_children, vec![root.clone(), Value::str("b")]).unwrap();
        assert_eq!(rendered(run(serialize, vec![root])), "<a><c/></a>");
    }

    #[test]
    fn test_parse_error_kind() {
        let err = run(parse, vec![Value::str("<a>")]).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::Xml);
        assert!(err.message.starts_with("parse error"));
    }
}
