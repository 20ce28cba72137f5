//! `text`: string helpers. Positions and widths count characters.

use crate::builtins::{self, clamp_bound, NativeFunction};
use crate::error::{RuntimeError, RuntimeResult};
use crate::runtime::Runtime;
use crate::value::{Args, Value};

pub static FUNCTIONS: &[NativeFunction] = &[
    NativeFunction::pure("text::trim", 1, 1, trim),
    NativeFunction::pure("text::trim_start", 1, 1, trim_start),
    NativeFunction::pure("text::trim_end", 1, 1, trim_end),
    NativeFunction::pure("text::upper", 1, 1, upper),
    NativeFunction::pure("text::lower", 1, 1, lower),
    NativeFunction::pure("text::split", 1, 2, split),
    NativeFunction::pure("text::join", 2, 2, join),
    NativeFunction::pure("text::replace", 3, 3, replace),
    NativeFunction::pure("text::contains", 2, 2, contains),
    NativeFunction::pure("text::starts_with", 2, 2, starts_with),
    NativeFunction::pure("text::ends_with", 2, 2, ends_with),
    NativeFunction::pure("text::index_of", 2, 2, index_of),
    NativeFunction::pure("text::substring", 2, 3, substring),
    NativeFunction::pure("text::pad_left", 2, 3, pad_left),
    NativeFunction::pure("text::pad_right", 2, 3, pad_right),
    NativeFunction::pure("text::repeat", 2, 2, repeat),
    NativeFunction::pure("text::lines", 1, 1, lines),
    NativeFunction::pure("text::is_empty", 1, 1, is_empty),
    NativeFunction::pure("text::title", 1, 1, title),
];

fn trim(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(Value::str(args.str(0)?.trim()))
}

fn trim_start(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(Value::str(args.str(0)?.trim_start()))
}

fn trim_end(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(Value::str(args.str(0)?.trim_end()))
}

fn upper(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(Value::str(args.str(0)?.to_uppercase()))
}

fn lower(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(Value::str(args.str(0)?.to_lowercase()))
}

fn split(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let source = args.str(0)?;
    let separator = args.opt_str(1)?;
    builtins::split_values(rt, &source, separator.as_deref())
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

fn replace(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    builtins::replace_text(rt, &args.str(0)?, &args.str(1)?, &args.str(2)?)
}

fn contains(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(Value::Bool(args.str(0)?.contains(&*args.str(1)?)))
}

fn starts_with(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(Value::Bool(args.str(0)?.starts_with(&*args.str(1)?)))
}

fn ends_with(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(Value::Bool(args.str(0)?.ends_with(&*args.str(1)?)))
}

/// Character index of the first occurrence, or -1.
fn index_of(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let haystack = args.str(0)?;
    let needle = args.str(1)?;
    let index = haystack
        .find(&*needle)
        .map(|byte| haystack[..byte].chars().count() as i64)
        .unwrap_or(-1);
    Ok(Value::Int(index))
}

fn substring(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let source = args.str(0)?;
    let chars: Vec<char> = source.chars().collect();
    rt.charge(chars.len() as u64 / 64)?;
    let from = clamp_bound(args.int(1)?, chars.len());
    let to = match args.opt_int(2)? {
        Some(end) => clamp_bound(end, chars.len()),
        None => chars.len(),
    };
    Ok(Value::str(chars[from..to.max(from)].iter().collect::<String>()))
}

fn padding(rt: &mut Runtime, args: &Args) -> RuntimeResult<(String, String)> {
    let source = args.str(0)?;
    let width = usize::try_from(args.int(1)?).unwrap_or(0);
    let fill = match args.opt_str(2)? {
        Some(fill) => {
            let mut chars = fill.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => {
                    return Err(RuntimeError::value_error(
                        "padding fill must be exactly one character",
                    ))
                }
            }
        }
        None => ' ',
    };
    let missing = width.saturating_sub(source.chars().count());
    rt.check_projected_len(
        missing
            .checked_mul(fill.len_utf8())
            .and_then(|n| n.checked_add(source.len())),
    )?;
    Ok((source.to_string(), std::iter::repeat(fill).take(missing).collect()))
}

fn pad_left(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let (source, pad) = padding(rt, &args)?;
    Ok(Value::str(pad + &source))
}

fn pad_right(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let (source, pad) = padding(rt, &args)?;
    Ok(Value::str(source + &pad))
}

fn repeat(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let source = args.str(0)?;
    let count = usize::try_from(args.int(1)?).unwrap_or(0);
    rt.check_projected_len(source.len().checked_mul(count))?;
    Ok(Value::str(source.repeat(count)))
}

fn lines(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let source = args.str(0)?;
    let items: Vec<Value> = source.lines().map(Value::str).collect();
    rt.charge(items.len() as u64 / 8)?;
    Ok(Value::list(items))
}

/// True for empty or whitespace-only text.
fn is_empty(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    Ok(Value::Bool(args.str(0)?.trim().is_empty()))
}

fn title(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let source = args.str(0)?;
    let mut out = String::with_capacity(source.len());
    let mut at_word_start = true;
    for c in source.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    Ok(Value::str(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ExecutionLimits;

    fn run(f: fn(&mut Runtime, Args) -> RuntimeResult<Value>, values: Vec<Value>) -> String {
        let mut rt = Runtime::new(&ExecutionLimits::default());
        f(&mut rt, Args::new("text::test", values))
            .unwrap()
            .render(10_000)
            .unwrap()
    }

    #[test]
    fn test_padding() {
        assert_eq!(run(pad_left, vec![Value::str("5"), Value::Int(3), Value::str("0")]), "005");
        assert_eq!(run(pad_right, vec![Value::str("ab"), Value::Int(4)]), "ab  ");
        assert_eq!(run(pad_left, vec![Value::str("long"), Value::Int(2)]), "long");
    }

    #[test]
    fn test_index_of_counts_chars() {
        assert_eq!(run(index_of, vec![Value::str("héllo"), Value::str("l")]), "2");
        assert_eq!(run(index_of, vec![Value::str("abc"), Value::str("z")]), "-1");
    }

    #[test]
    fn test_substring_and_title() {
        assert_eq!(run(substring, vec![Value::str("abcdef"), Value::Int(2), Value::Int(4)]), "cd");
        assert_eq!(run(title, vec![Value::str("hello wORLD-wide")]), "Hello World-Wide");
    }

    #[test]
    fn test_split_and_lines() {
        assert_eq!(run(split, vec![Value::str("a,b,,c"), Value::str(",")]), r#"["a", "b", "", "c"]"#);
        assert_eq!(run(lines, vec![Value::str("x\ny\r\nz")]), r#"["x", "y", "z"]"#);
    }

    #[test]
    fn test_is_empty() {
        assert_eq!(run(is_empty, vec![Value::str("  \n")]), "true");
        assert_eq!(run(is_empty, vec![Value::str(" a ")]), "false");
    }
}
