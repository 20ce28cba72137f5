//! Runtime values.
//!
//! Lists and maps are copy-on-write (`Rc::make_mut`), so assigning a list to
//! a second variable and mutating one never affects the other, and no value
//! can contain itself. Nodes are shared handles into an XML tree.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::rc::Rc;

use crate::error::{RuntimeError, RuntimeErrorKind, RuntimeResult};
use crate::xmltree::{self, NodeRef};

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<Vec<Value>>),
    Map(Rc<BTreeMap<String, Value>>),
    Node(NodeRef),
}

impl Value {
    pub fn str(text: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(text.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }

    pub fn map(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(Rc::new(entries))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Node(_) => "node",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Node(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Length used for size limits: bytes for strings, items for containers.
    pub fn size(&self) -> usize {
        match self {
            Value::Str(s) => s.len(),
            Value::List(items) => items.len(),
            Value::Map(entries) => entries.len(),
            _ => 0,
        }
    }

    /// Display form as produced by `str(v)`; strings are not quoted.
    pub fn render(&self, limit: usize) -> RuntimeResult<String> {
        let mut out = String::new();
        self.write_to(&mut out, false, limit)?;
        Ok(out)
    }

    /// Display form with strings quoted, as they appear inside containers.
    pub fn repr(&self, limit: usize) -> RuntimeResult<String> {
        let mut out = String::new();
        self.write_to(&mut out, true, limit)?;
        Ok(out)
    }

    fn write_to(&self, out: &mut String, quoted: bool, limit: usize) -> RuntimeResult<()> {
        match self {
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Value::Float(f) => out.push_str(&format_float(*f)),
            Value::Str(s) if quoted => {
                let _ = write!(out, "{:?}", &**s);
            }
            Value::Str(s) => out.push_str(s),
            Value::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_to(out, true, limit)?;
                    check_rendered(out, limit)?;
                }
                out.push(']');
            }
            Value::Map(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{key:?}: ");
                    value.write_to(out, true, limit)?;
                    check_rendered(out, limit)?;
                }
                out.push('}');
            }
            Value::Node(node) if quoted => {
                let _ = write!(out, "<node {}>", node.borrow().name);
            }
            Value::Node(node) => {
                xmltree::serialize_into(node, out, limit).map_err(|_| too_large(limit))?
            }
        }
        check_rendered(out, limit)
    }
}

fn check_rendered(out: &str, limit: usize) -> RuntimeResult<()> {
    if out.len() > limit {
        return Err(too_large(limit));
    }
    Ok(())
}

fn too_large(limit: usize) -> RuntimeError {
    RuntimeError::new(
        RuntimeErrorKind::ValueTooLarge,
        format!("rendered value exceeds {limit} bytes"),
    )
}

/// Floats always show a fractional part or exponent so they read back as floats.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".into();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let text = format!("{f}");
    if text.contains('.') || text.contains('e') {
        text
    } else {
        format!("{text}.0")
    }
}

/// Positional arguments to a native function, with typed accessors that
/// produce uniform `TypeError` messages.
pub struct Args {
    pub function: &'static str,
    values: Vec<Value>,
}

impl Args {
    pub fn new(function: &'static str, values: Vec<Value>) -> Self {
        Self { function, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&Value::Null)
    }

    pub fn opt(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn take(&mut self, index: usize) -> Value {
        self.values
            .get_mut(index)
            .map(|v| std::mem::replace(v, Value::Null))
            .unwrap_or(Value::Null)
    }

    pub fn mismatch(&self, index: usize, expected: &str) -> RuntimeError {
        RuntimeError::type_error(format!(
            "{}() argument {} must be {}, not {}",
            self.function,
            index + 1,
            expected,
            self.get(index).type_name()
        ))
    }

    pub fn str(&self, index: usize) -> RuntimeResult<Rc<str>> {
        match self.get(index) {
            Value::Str(s) => Ok(Rc::clone(s)),
            _ => Err(self.mismatch(index, "str")),
        }
    }

    pub fn opt_str(&self, index: usize) -> RuntimeResult<Option<Rc<str>>> {
        match self.opt(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.str(index).map(Some),
        }
    }

    pub fn int(&self, index: usize) -> RuntimeResult<i64> {
        match self.get(index) {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(i64::from(*b)),
            _ => Err(self.mismatch(index, "int")),
        }
    }

    pub fn opt_int(&self, index: usize) -> RuntimeResult<Option<i64>> {
        match self.opt(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.int(index).map(Some),
        }
    }

    pub fn number(&self, index: usize) -> RuntimeResult<f64> {
        self.get(index)
            .as_number()
            .ok_or_else(|| self.mismatch(index, "a number"))
    }

    pub fn list(&self, index: usize) -> RuntimeResult<Rc<Vec<Value>>> {
        match self.get(index) {
            Value::List(items) => Ok(Rc::clone(items)),
            _ => Err(self.mismatch(index, "list")),
        }
    }

    pub fn node(&self, index: usize) -> RuntimeResult<NodeRef> {
        match self.get(index) {
            Value::Node(node) => Ok(Rc::clone(node)),
            _ => Err(self.mismatch(index, "node")),
        }
    }
}
