//! `re`: regular expressions. Patterns compile under a size limit and are
//! cached per call; matching is linear time.

use crate::builtins::NativeFunction;
use crate::error::RuntimeResult;
use crate::runtime::Runtime;
use crate::value::{Args, Value};

pub static FUNCTIONS: &[NativeFunction] = &[
    NativeFunction::pure("re::is_match", 2, 2, is_match),
    NativeFunction::pure("re::find", 2, 2, find),
    NativeFunction::pure("re::find_all", 2, 2, find_all),
    NativeFunction::pure("re::captures", 2, 2, captures),
    NativeFunction::pure("re::replace", 3, 3, replace),
    NativeFunction::pure("re::split", 2, 2, split),
];

fn charge_scan(rt: &mut Runtime, text: &str) -> RuntimeResult<()> {
    rt.charge(text.len() as u64 / 32 + 1)
}

fn is_match(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let re = rt.regex(&args.str(0)?)?;
    let text = args.str(1)?;
    charge_scan(rt, &text)?;
    Ok(Value::Bool(re.is_match(&text)))
}

fn find(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let re = rt.regex(&args.str(0)?)?;
    let text = args.str(1)?;
    charge_scan(rt, &text)?;
    Ok(re
        .find(&text)
        .map(|m| Value::str(m.as_str()))
        .unwrap_or(Value::Null))
}

fn find_all(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let re = rt.regex(&args.str(0)?)?;
    let text = args.str(1)?;
    charge_scan(rt, &text)?;
    let mut items = Vec::new();
    for m in re.find_iter(&text) {
        rt.tick()?;
        items.push(Value::str(m.as_str()));
    }
    rt.check_len(items.len())?;
    Ok(Value::list(items))
}

/// Group 0 first; groups that did not participate are `null`.
fn captures(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let re = rt.regex(&args.str(0)?)?;
    let text = args.str(1)?;
    charge_scan(rt, &text)?;
    Ok(match re.captures(&text) {
        Some(caps) => Value::list(
            caps.iter()
                .map(|group| group.map(|m| Value::str(m.as_str())).unwrap_or(Value::Null))
                .collect(),
        ),
        None => Value::Null,
    })
}

/// Replace every match; `$1` / `${name}` expand groups.
fn replace(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let re = rt.regex(&args.str(0)?)?;
    let text = args.str(1)?;
    let replacement = args.str(2)?;
    charge_scan(rt, &text)?;

    let references = replacement.matches('$').count();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(&text) {
        rt.tick()?;
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        rt.check_projected_len(
            references
                .checked_mul(whole.len())
                .and_then(|n| n.checked_add(out.len()))
                .and_then(|n| n.checked_add(replacement.len())),
        )?;
        caps.expand(&replacement, &mut out);
        last = whole.end();
        rt.check_len(out.len())?;
    }
    out.push_str(&text[last..]);
    rt.check_len(out.len())?;
    Ok(Value::str(out))
}

fn split(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let re = rt.regex(&args.str(0)?)?;
    let text = args.str(1)?;
    charge_scan(rt, &text)?;
    let mut items = Vec::new();
    for part in re.split(&text) {
        rt.tick()?;
        items.push(Value::str(part));
    }
    Ok(Value::list(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeErrorKind;
    use crate::limits::ExecutionLimits;

    fn run(f: fn(&mut Runtime, Args) -> RuntimeResult<Value>, values: Vec<Value>) -> RuntimeResult<String> {
        let mut rt = Runtime::new(&ExecutionLimits::default());
        f(&mut rt, Args::new("re::test", values))?.render(10_000)
    }

    #[test]
    fn test_replace_expands_groups() {
        let out = run(
            replace,
            vec![
                Value::str(r"(\d{4})-(\d{2})-(\d{2})"),
                Value::str("on 2024-03-05."),
                Value::str("$3/$2/$1"),
            ],
        )
        .unwrap();
        assert_eq!(out, "on 05/03/2024.");
    }

    #[test]
    fn test_captures_missing_group_is_null() {
        let out = run(captures, vec![Value::str("(a)(b)?"), Value::str("ac")]).unwrap();
        assert_eq!(out, r#"["a", "a", null]"#);
        assert_eq!(run(captures, vec![Value::str("z"), Value::str("ac")]).unwrap(), "null");
    }

    #[test]
    fn test_find_all_and_split() {
        assert_eq!(
            run(find_all, vec![Value::str(r"\d+"), Value::str("a1b22c333")]).unwrap(),
            r#"["1", "22", "333"]"#
        );
        assert_eq!(
            run(split, vec![Value::str(r"\s*;\s*"), Value::str("a ; b;c")]).unwrap(),
            r#"["a", "b", "c"]"#
        );
    }

    #[test]
    fn test_oversized_pattern_rejected() {
        let err = run(is_match, vec![Value::str(r"(?:\w{1000}){1000}"), Value::str("x")]).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::Regex);
    }
}
