//! Primitive functions available to every program without an import.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::ast::BinaryOp;
use crate::error::{RuntimeError, RuntimeErrorKind, RuntimeResult};
use crate::ops;
use crate::runtime::Runtime;
use crate::value::{Args, Value};

pub type PureFn = fn(&mut Runtime, Args) -> RuntimeResult<Value>;

/// Receives the first argument by mutable reference; the interpreter writes
/// it back to the variable or element it came from.
pub type MutatingFn = fn(&mut Runtime, &mut Value, Args) -> RuntimeResult<Value>;

#[derive(Clone, Copy)]
pub enum NativeCall {
    Pure(PureFn),
    Mutating(MutatingFn),
}

/// A function implemented by the host.
#[derive(Clone, Copy)]
pub struct NativeFunction {
    /// `name` for builtins, `module::name` for module functions.
    pub qualified: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub call: NativeCall,
}

impl NativeFunction {
    pub const fn pure(qualified: &'static str, min_args: usize, max_args: usize, f: PureFn) -> Self {
        Self {
            qualified,
            min_args,
            max_args,
            call: NativeCall::Pure(f),
        }
    }

    const fn mutating(qualified: &'static str, min_args: usize, max_args: usize, f: MutatingFn) -> Self {
        Self {
            qualified,
            min_args,
            max_args,
            call: NativeCall::Mutating(f),
        }
    }

    pub fn name(&self) -> &'static str {
        self.qualified
            .rsplit("::")
            .next()
            .unwrap_or(self.qualified)
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && count <= self.max_args
    }

    /// Human form of the accepted argument count, e.g. `1` or `1 to 3`.
    pub fn arity(&self) -> String {
        match (self.min_args, self.max_args) {
            (min, max) if min == max => min.to_string(),
            (min, usize::MAX) => format!("at least {min}"),
            (min, max) => format!("{min} to {max}"),
        }
    }
}

const VARIADIC: usize = usize::MAX;

pub static BUILTINS: &[NativeFunction] = &[
    NativeFunction::pure("len", 1, 1, len),
    NativeFunction::pure("str", 1, 1, to_str),
    NativeFunction::pure("int", 1, 1, to_int),
    NativeFunction::pure("float", 1, 1, to_float),
    NativeFunction::pure("bool", 1, 1, to_bool),
    NativeFunction::pure("type_of", 1, 1, type_of),
    NativeFunction::mutating("push", 2, 2, push),
    NativeFunction::mutating("pop", 1, 2, pop),
    NativeFunction::mutating("insert", 3, 3, insert),
    NativeFunction::mutating("remove", 2, 2, remove),
    NativeFunction::pure("keys", 1, 1, keys),
    NativeFunction::pure("values", 1, 1, values),
    NativeFunction::pure("has", 2, 2, has),
    NativeFunction::pure("get", 2, 3, get),
    NativeFunction::pure("range", 1, 3, range),
    NativeFunction::pure("contains", 2, 2, contains),
    NativeFunction::pure("slice", 2, 3, slice),
    NativeFunction::pure("sort", 1, 1, sort),
    NativeFunction::pure("reverse", 1, 1, reverse),
    NativeFunction::pure("join", 2, 2, join),
    NativeFunction::pure("split", 1, 2, split),
    NativeFunction::pure("trim", 1, 1, trim),
    NativeFunction::pure("upper", 1, 1, upper),
    NativeFunction::pure("lower", 1, 1, lower),
    NativeFunction::pure("replace", 3, 3, replace),
    NativeFunction::pure("starts_with", 2, 2, starts_with),
    NativeFunction::pure("ends_with", 2, 2, ends_with),
    NativeFunction::pure("min", 1, VARIADIC, min),
    NativeFunction::pure("max", 1, VARIADIC, max),
    NativeFunction::pure("abs", 1, 1, abs),
    NativeFunction::pure("round", 1, 2, round),
    NativeFunction::pure("print", 0, VARIADIC, print),
    NativeFunction::pure("error", 1, 1, error),
];

pub fn lookup(name: &str) -> Option<&'static NativeFunction> {
    BUILTINS.iter().find(|f| f.qualified == name)
}

/// Resolve a possibly negative index against `len`.
pub(crate) fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { index + len } else { index };
    (0..len).contains(&resolved).then_some(resolved as usize)
}

/// Clamp a slice bound the way negative-index slicing does.
pub(crate) fn clamp_bound(index: i64, len: usize) -> usize {
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if index < 0 { index + len_i } else { index };
    resolved.clamp(0, len_i) as usize
}

fn len(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let n = match args.get(0) {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(entries) => entries.len(),
        Value::Node(node) => node.borrow().element_children().len(),
        _ => return Err(args.mismatch(0, "str, list, map or node")),
    };
    Ok(Value::Int(n as i64))
}

fn to_str(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let limit = rt.limits().max_value_len;
    Ok(Value::str(args.get(0).render(limit)?))
}

fn to_int(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    match args.get(0) {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) if f.is_finite() && f.abs() < 9.2e18 => Ok(Value::Int(f.trunc() as i64)),
        Value::Float(f) => Err(RuntimeError::value_error(format!(
            "cannot convert float {f} to int"
        ))),
        Value::Str(s) => s.trim().replace('_', "").parse::<i64>().map(Value::Int).map_err(|_| {
            RuntimeError::value_error(format!("invalid literal for int(): {:?}", &**s))
        }),
        _ => Err(args.mismatch(0, "int, float, bool or str")),
    }
}

fn to_float(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    match args.get(0) {
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            RuntimeError::value_error(format!("could not convert string to float: {:?}", &**s))
        }),
        _ => Err(args.mismatch(0, "int, float, bool or str")),
    }
}

fn to_bool(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(Value::Bool(args.get(0).truthy()))
}

fn type_of(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(Value::str(args.get(0).type_name()))
}

fn push(rt: &mut Runtime, target: &mut Value, mut args: Args) -> RuntimeResult<Value> {
    let Value::List(items) = target else {
        return Err(not_a("push", "list", target));
    };
    rt.check_len(items.len() + 1)?;
    Rc::make_mut(items).push(args.take(0));
    Ok(Value::Null)
}

fn pop(_rt: &mut Runtime, target: &mut Value, args: Args) -> RuntimeResult<Value> {
    let Value::List(items) = target else {
        return Err(not_a("pop", "list", target));
    };
    if items.is_empty() {
        return Err(RuntimeError::new(RuntimeErrorKind::Index, "pop from empty list"));
    }
    let index = match args.opt_int(0)? {
        Some(i) => resolve_index(i, items.len())
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::Index, "pop index out of range"))?,
        None => items.len() - 1,
    };
    Ok(Rc::make_mut(items).remove(index))
}

fn insert(rt: &mut Runtime, target: &mut Value, mut args: Args) -> RuntimeResult<Value> {
    match target {
        Value::List(items) => {
            rt.check_len(items.len() + 1)?;
            let at = clamp_bound(args.int(0)?, items.len());
            let value = args.take(1);
            Rc::make_mut(items).insert(at, value);
        }
        Value::Map(entries) => {
            let key = args.str(0)?.to_string();
            rt.check_len(entries.len() + 1)?;
            let value = args.take(1);
            Rc::make_mut(entries).insert(key, value);
        }
        other => return Err(not_a("insert", "list or map", other)),
    }
    Ok(Value::Null)
}

fn remove(_rt: &mut Runtime, target: &mut Value, args: Args) -> RuntimeResult<Value> {
    match target {
        Value::List(items) => {
            let index = resolve_index(args.int(0)?, items.len()).ok_or_else(|| {
                RuntimeError::new(RuntimeErrorKind::Index, "remove index out of range")
            })?;
            Ok(Rc::make_mut(items).remove(index))
        }
        Value::Map(entries) => {
            let key = args.str(0)?;
            Rc::make_mut(entries)
                .remove(&*key)
                .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::Key, format!("{:?}", &*key)))
        }
        other => Err(not_a("remove", "list or map", other)),
    }
}

fn not_a(function: &str, expected: &str, found: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "{function}() argument 1 must be {expected}, not {}",
        found.type_name()
    ))
}

fn keys(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    match args.get(0) {
        Value::Map(entries) => {
            rt.charge(entries.len() as u64 / 8)?;
            Ok(Value::list(entries.keys().map(Value::str).collect()))
        }
        _ => Err(args.mismatch(0, "map")),
    }
}

fn values(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    match args.get(0) {
        Value::Map(entries) => {
            rt.charge(entries.len() as u64 / 8)?;
            Ok(Value::list(entries.values().cloned().collect()))
        }
        _ => Err(args.mismatch(0, "map")),
    }
}

fn has(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    match args.get(0) {
        Value::Map(entries) => Ok(Value::Bool(entries.contains_key(&*args.str(1)?))),
        _ => Err(args.mismatch(0, "map")),
    }
}

fn get(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let default = args.opt(2).cloned().unwrap_or(Value::Null);
    let found = match args.get(0) {
        Value::Map(entries) => entries.get(&*args.str(1)?).cloned(),
        Value::List(items) => resolve_index(args.int(1)?, items.len()).map(|i| items[i].clone()),
        _ => return Err(args.mismatch(0, "map or list")),
    };
    Ok(found.unwrap_or(default))
}

fn range(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let (start, stop, step) = match args.len() {
        1 => (0, args.int(0)?, 1),
        2 => (args.int(0)?, args.int(1)?, 1),
        _ => (args.int(0)?, args.int(1)?, args.int(2)?),
    };
    if step == 0 {
        return Err(RuntimeError::value_error("range() step must not be zero"));
    }
    let span = if step > 0 {
        (stop as i128 - start as i128 + step as i128 - 1) / step as i128
    } else {
        (start as i128 - stop as i128 - step as i128 - 1) / -(step as i128)
    };
    let count = usize::try_from(span.max(0)).unwrap_or(usize::MAX);
    rt.check_len(count)?;
    rt.charge(count as u64 / 8)?;
    let items = (0..count as i64)
        .map(|i| Value::Int(start + i * step))
        .collect();
    Ok(Value::list(items))
}

fn contains(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let needle = args.get(1);
    let found = match args.get(0) {
        Value::Str(haystack) => haystack.contains(&*args.str(1)?),
        Value::Map(entries) => match needle {
            Value::Str(key) => entries.contains_key(&**key),
            _ => false,
        },
        Value::List(items) => {
            let mut found = false;
            for item in items.iter() {
                rt.tick()?;
                if ops::values_equal(rt, item, needle)? {
                    found = true;
                    break;
                }
            }
            found
        }
        _ => return Err(args.mismatch(0, "str, list or map")),
    };
    Ok(Value::Bool(found))
}

fn slice(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    match args.get(0) {
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (from, to) = slice_bounds(&args, chars.len())?;
            rt.charge(chars.len() as u64 / 64)?;
            Ok(Value::str(chars[from..to].iter().collect::<String>()))
        }
        Value::List(items) => {
            let (from, to) = slice_bounds(&args, items.len())?;
            rt.charge((to - from) as u64 / 8)?;
            Ok(Value::list(items[from..to].to_vec()))
        }
        _ => Err(args.mismatch(0, "str or list")),
    }
}

fn slice_bounds(args: &Args, len: usize) -> RuntimeResult<(usize, usize)> {
    let from = clamp_bound(args.int(1)?, len);
    let to = match args.opt_int(2)? {
        Some(end) => clamp_bound(end, len),
        None => len,
    };
    Ok((from, to.max(from)))
}

fn sort(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let items = args.list(0)?;
    let all_numbers = items.iter().all(|v| v.as_number().is_some());
    let all_strings = items.iter().all(|v| matches!(v, Value::Str(_)));
    if !all_numbers && !all_strings {
        return Err(RuntimeError::type_error(
            "sort() requires a list of numbers or a list of strings",
        ));
    }
    let n = items.len() as u64;
    rt.charge(n * (64 - n.leading_zeros() as u64).max(1) / 4)?;
    let mut sorted = items.to_vec();
    let mut failure = None;
    sorted.sort_by(|a, b| {
        ops::compare(BinaryOp::Lt, a, b).unwrap_or_else(|e| {
            failure.get_or_insert(e);
            Ordering::Equal
        })
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(Value::list(sorted)),
    }
}

fn reverse(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    match args.get(0) {
        Value::Str(s) => Ok(Value::str(s.chars().rev().collect::<String>())),
        Value::List(items) => Ok(Value::list(items.iter().rev().cloned().collect())),
        _ => Err(args.mismatch(0, "str or list")),
    }
}

fn join(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let items = args.list(0)?;
    let separator = args.str(1)?;
    let limit = rt.limits().max_value_len;
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        rt.tick()?;
        if i > 0 {
            out.push_str(&separator);
        }
        out.push_str(&item.render(limit)?);
        rt.check_len(out.len())?;
    }
    Ok(Value::str(out))
}

pub(crate) fn split_values(rt: &mut Runtime, text: &str, separator: Option<&str>) -> RuntimeResult<Value> {
    let parts: Vec<Value> = match separator {
        None => text.split_whitespace().map(Value::str).collect(),
        Some("") => return Err(RuntimeError::value_error("empty separator")),
        Some(sep) => text.split(sep).map(Value::str).collect(),
    };
    rt.check_len(parts.len())?;
    rt.charge(parts.len() as u64 / 8)?;
    Ok(Value::list(parts))
}

fn split(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let text = args.str(0)?;
    let separator = args.opt_str(1)?;
    split_values(rt, &text, separator.as_deref())
}

fn trim(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(Value::str(args.str(0)?.trim()))
}

fn upper(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(Value::str(args.str(0)?.to_uppercase()))
}

fn lower(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(Value::str(args.str(0)?.to_lowercase()))
}

pub(crate) fn replace_text(rt: &mut Runtime, text: &str, from: &str, to: &str) -> RuntimeResult<Value> {
    if from.is_empty() {
        return Err(RuntimeError::value_error("replace() pattern must not be empty"));
    }
    let occurrences = text.matches(from).count();
    let projected = occurrences
        .checked_mul(to.len())
        .and_then(|n| n.checked_add(text.len()))
        .map(|n| n.saturating_sub(occurrences * from.len()));
    rt.check_projected_len(projected)?;
    rt.charge(text.len() as u64 / 64)?;
    Ok(Value::str(text.replace(from, to)))
}

fn replace(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    replace_text(rt, &args.str(0)?, &args.str(1)?, &args.str(2)?)
}

fn starts_with(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(Value::Bool(args.str(0)?.starts_with(&*args.str(1)?)))
}

fn ends_with(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(Value::Bool(args.str(0)?.ends_with(&*args.str(1)?)))
}

fn extreme(args: Args, wanted: Ordering) -> RuntimeResult<Value> {
    let candidates: Vec<Value> = match (args.len(), args.get(0)) {
        (1, Value::List(items)) => items.to_vec(),
        (1, _) => return Err(args.mismatch(0, "list")),
        _ => (0..args.len()).map(|i| args.get(i).clone()).collect(),
    };
    let mut iter = candidates.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(RuntimeError::value_error(format!(
            "{}() of an empty sequence",
            args.function
        )));
    };
    for candidate in iter {
        if ops::compare(BinaryOp::Lt, &candidate, &best)? == wanted {
            best = candidate;
        }
    }
    Ok(best)
}

fn min(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    extreme(args, Ordering::Less)
}

fn max(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    extreme(args, Ordering::Greater)
}

fn abs(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    match args.get(0) {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::value_error("integer overflow")),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        _ => Err(args.mismatch(0, "a number")),
    }
}

/// Round half to even; with `ndigits` the result stays a float.
pub(crate) fn round_number(value: f64, ndigits: Option<i64>) -> RuntimeResult<Value> {
    match ndigits {
        None => {
            let rounded = value.round_ties_even();
            if !rounded.is_finite() || rounded.abs() >= 9.2e18 {
                return Err(RuntimeError::value_error(format!(
                    "cannot round {value} to an int"
                )));
            }
            Ok(Value::Int(rounded as i64))
        }
        Some(digits) => {
            let digits = digits.clamp(-15, 15) as i32;
            let factor = 10f64.powi(digits);
            Ok(Value::Float((value * factor).round_ties_even() / factor))
        }
    }
}

fn round(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    if let (Value::Int(i), None) = (args.get(0), args.opt(1)) {
        return Ok(Value::Int(*i));
    }
    round_number(args.number(0)?, args.opt_int(1)?)
}

fn print(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let limit = rt.limits().max_print_bytes;
    let mut line = String::new();
    for i in 0..args.len() {
        if i > 0 {
            line.push(' ');
        }
        match args.get(i).render(limit) {
            Ok(text) => line.push_str(&text),
            Err(_) => line.push_str("..."),
        }
        if line.len() > limit {
            break;
        }
    }
    rt.print(&line);
    Ok(Value::Null)
}

fn error(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let message = args.get(0).render(rt.limits().max_value_len)?;
    Err(RuntimeError::new(RuntimeErrorKind::Raised, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ExecutionLimits;
    use std::collections::BTreeMap;

    fn call(name: &str, values: Vec<Value>) -> RuntimeResult<Value> {
        let mut rt = Runtime::new(&ExecutionLimits::default());
        let f = lookup(name).unwrap();
        match f.call {
            NativeCall::Pure(f) => f(&mut rt, Args::new("test", values)),
            NativeCall::Mutating(f) => {
                let mut values = values;
                let mut target = values.remove(0);
                f(&mut rt, &mut target, Args::new("test", values))
            }
        }
    }

    fn ints(v: &Value) -> Vec<i64> {
        match v {
            Value::List(items) => items
                .iter()
                .map(|i| match i {
                    Value::Int(n) => *n,
                    _ => panic!("not an int"),
                })
                .collect(),
            _ => panic!("not a list"),
        }
    }

    #[test]
    fn test_range_forms() {
        assert_eq!(ints(&call("range", vec![Value::Int(3)]).unwrap()), vec![0, 1, 2]);
        assert_eq!(
            ints(&call("range", vec![Value::Int(5), Value::Int(0), Value::Int(-2)]).unwrap()),
            vec![5, 3, 1]
        );
        assert!(call("range", vec![Value::Int(1), Value::Int(2), Value::Int(0)]).is_err());
    }

    #[test]
    fn test_range_respects_length_limit() {
        let err = call("range", vec![Value::Int(i64::MAX)]).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::ValueTooLarge);
    }

    #[test]
    fn test_slice_negative_bounds() {
        let v = call("slice", vec![Value::str("abcdef"), Value::Int(-3)]).unwrap();
        assert_eq!(v.render(100).unwrap(), "def");
        let v = call("slice", vec![Value::str("abcdef"), Value::Int(1), Value::Int(3)]).unwrap();
        assert_eq!(v.render(100).unwrap(), "bc");
    }

    #[test]
    fn test_int_parsing() {
        assert!(matches!(call("int", vec![Value::str(" 42 ")]).unwrap(), Value::Int(42)));
        assert!(matches!(call("int", vec![Value::Float(-2.7)]).unwrap(), Value::Int(-2)));
        let err = call("int", vec![Value::str("x")]).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::Value);
    }

    #[test]
    fn test_round_half_even() {
        assert!(matches!(call("round", vec![Value::Float(2.5)]).unwrap(), Value::Int(2)));
        assert!(matches!(call("round", vec![Value::Float(3.5)]).unwrap(), Value::Int(4)));
        let v = call("round", vec![Value::Float(1.2345), Value::Int(2)]).unwrap();
        assert_eq!(v.render(100).unwrap(), "1.23");
    }

    #[test]
    fn test_sort_rejects_mixed() {
        let mixed = Value::list(vec![Value::Int(1), Value::str("a")]);
        assert!(call("sort", vec![mixed]).is_err());
        let nums = Value::list(vec![Value::Int(3), Value::Float(1.5), Value::Int(2)]);
        assert_eq!(call("sort", vec![nums]).unwrap().render(100).unwrap(), "[1.5, 2, 3]");
    }

    #[test]
    fn test_min_max() {
        let v = call("max", vec![Value::Int(1), Value::Int(9), Value::Int(4)]).unwrap();
        assert!(matches!(v, Value::Int(9)));
        let v = call("min", vec![Value::list(vec![Value::str("b"), Value::str("a")])]).unwrap();
        assert_eq!(v.render(10).unwrap(), "a");
        assert!(call("min", vec![Value::list(vec![])]).is_err());
    }

    #[test]
    fn test_pop_and_remove() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert!(matches!(call("pop", vec![list]).unwrap(), Value::Int(2)));
        let err = call("pop", vec![Value::list(vec![])]).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::Index);
        let mut entries = BTreeMap::new();
        entries.insert("k".to_string(), Value::Int(1));
        let err = call("remove", vec![Value::map(entries), Value::str("missing")]).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::Key);
    }

    #[test]
    fn test_error_raises() {
        let err = call("error", vec![Value::str("bad input")]).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::Raised);
        assert_eq!(err.message, "bad input");
    }

    #[test]
    fn test_arity_description() {
        assert_eq!(lookup("len").unwrap().arity(), "1");
        assert_eq!(lookup("get").unwrap().arity(), "2 to 3");
        assert_eq!(lookup("print").unwrap().arity(), "at least 0");
    }
}
