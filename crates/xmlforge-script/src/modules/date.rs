//! `date`: calendar parsing and formatting with strftime-style patterns.
//!
//! Values cross the module boundary as text. Canonical forms are ISO 8601:
//! `YYYY-MM-DD` for dates and `YYYY-MM-DDTHH:MM:SS` for date-times.

use std::fmt::Write as _;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::builtins::NativeFunction;
use crate::error::{RuntimeError, RuntimeErrorKind, RuntimeResult};
use crate::runtime::Runtime;
use crate::value::{Args, Value};

pub static FUNCTIONS: &[NativeFunction] = &[
    NativeFunction::pure("date::reformat", 3, 3, reformat),
    NativeFunction::pure("date::parse_date", 2, 2, parse_date),
    NativeFunction::pure("date::format_date", 2, 2, format_date),
    NativeFunction::pure("date::is_valid", 2, 2, is_valid),
    NativeFunction::pure("date::add_days", 2, 2, add_days),
    NativeFunction::pure("date::weekday", 1, 1, weekday),
];

const ISO_DATE: &str = "%Y-%m-%d";
const ISO_DATETIME: &str = "%Y-%m-%dT%H:%M:%S";
const MAX_PATTERN_LEN: usize = 256;

#[derive(Debug, Clone, Copy)]
enum Moment {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Moment {
    fn parse(text: &str, pattern: &str) -> Option<Moment> {
        let text = text.trim();
        NaiveDateTime::parse_from_str(text, pattern)
            .map(Moment::DateTime)
            .or_else(|_| NaiveDate::parse_from_str(text, pattern).map(Moment::Date))
            .ok()
    }

    fn parse_iso(text: &str) -> Option<Moment> {
        Moment::parse(text, ISO_DATETIME).or_else(|| Moment::parse(text, ISO_DATE))
    }

    fn date(self) -> NaiveDate {
        match self {
            Moment::Date(d) => d,
            Moment::DateTime(dt) => dt.date(),
        }
    }

    /// Formatting goes through `write!` so an invalid pattern is an error
    /// instead of a panic inside chrono's `Display`.
    fn format(self, pattern: &str) -> RuntimeResult<String> {
        if pattern.len() > MAX_PATTERN_LEN {
            return Err(date_error(format!(
                "format pattern longer than {MAX_PATTERN_LEN} bytes"
            )));
        }
        let mut out = String::new();
        let written = match self {
            Moment::Date(d) => write!(out, "{}", d.format(pattern)),
            Moment::DateTime(dt) => write!(out, "{}", dt.format(pattern)),
        };
        written.map_err(|_| date_error(format!("invalid format pattern {pattern:?}")))?;
        Ok(out)
    }

    fn iso(self) -> RuntimeResult<String> {
        match self {
            Moment::Date(_) => self.format(ISO_DATE),
            Moment::DateTime(_) => self.format(ISO_DATETIME),
        }
    }
}

fn date_error(message: impl Into<String>) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::Date, message)
}

fn parse_with(text: &str, pattern: &str) -> RuntimeResult<Moment> {
    Moment::parse(text, pattern)
        .ok_or_else(|| date_error(format!("{text:?} does not match format {pattern:?}")))
}

fn parse_iso(text: &str) -> RuntimeResult<Moment> {
    Moment::parse_iso(text).ok_or_else(|| date_error(format!("{text:?} is not an ISO date")))
}

/// Parse with one pattern and format with another.
fn reformat(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    rt.tick()?;
    let moment = parse_with(&args.str(0)?, &args.str(1)?)?;
    Ok(Value::str(moment.format(&args.str(2)?)?))
}

fn parse_date(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    rt.tick()?;
    let moment = parse_with(&args.str(0)?, &args.str(1)?)?;
    Ok(Value::str(moment.iso()?))
}

fn format_date(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    rt.tick()?;
    let moment = parse_iso(&args.str(0)?)?;
    Ok(Value::str(moment.format(&args.str(1)?)?))
}

fn is_valid(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    rt.tick()?;
    Ok(Value::Bool(
        Moment::parse(&args.str(0)?, &args.str(1)?).is_some(),
    ))
}

fn add_days(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    rt.tick()?;
    let moment = parse_iso(&args.str(0)?)?;
    let days = args.int(1)?;
    let delta = Duration::try_days(days).ok_or_else(|| date_error("day offset out of range"))?;
    let shifted = match moment {
        Moment::Date(d) => d.checked_add_signed(delta).map(Moment::Date),
        Moment::DateTime(dt) => dt.checked_add_signed(delta).map(Moment::DateTime),
    }
    .ok_or_else(|| date_error("date out of range"))?;
    Ok(Value::str(shifted.iso()?))
}

fn weekday(rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    rt.tick()?;
    let moment = parse_iso(&args.str(0)?)?;
    let name = match moment.date().weekday() {
        chrono::Weekday::Mon => "Monday",
        chrono::Weekday::Tue => "Tuesday",
        chrono::Weekday::Wed => "Wednesday",
        chrono::Weekday::Thu => "Thursday",
        chrono::Weekday::Fri => "Friday",
        chrono::Weekday::Sat => "Saturday",
        chrono::Weekday::Sun => "Sunday",
    };
    Ok(Value::str(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ExecutionLimits;

    fn run(f: fn(&mut Runtime, Args) -> RuntimeResult<Value>, values: Vec<&str>) -> RuntimeResult<String> {
        let mut rt = Runtime::new(&ExecutionLimits::default());
        let values = values.into_iter().map(Value::str).collect();
        f(&mut rt, Args::new("date::test", values))?.render(1000)
    }

    #[test]
    fn test_reformat_date() {
        let out = run(reformat, vec!["05/03/2024", "%d/%m/%Y", "%Y-%m-%d"]).unwrap();
        assert_eq!(out, "2024-03-05");
    }

    #[test]
    fn test_reformat_datetime() {
        let out = run(reformat, vec!["2024-03-05 14:30", "%Y-%m-%d %H:%M", "%d.%m.%Y %H:%M"]).unwrap();
        assert_eq!(out, "05.03.2024 14:30");
    }

    #[test]
    fn test_parse_and_weekday() {
        assert_eq!(run(parse_date, vec!["March 5, 2024", "%B %d, %Y"]).unwrap(), "2024-03-05");
        assert_eq!(run(weekday, vec!["2024-03-05"]).unwrap(), "Tuesday");
    }

    #[test]
    fn test_add_days_across_month() {
        let mut rt = Runtime::new(&ExecutionLimits::default());
        let args = Args::new("date::add_days", vec![Value::str("2024-02-28"), Value::Int(2)]);
        let out = add_days(&mut rt, args).unwrap().render(100).unwrap();
        assert_eq!(out, "2024-03-01");
    }

    #[test]
    fn test_invalid_input_is_date_error() {
        let err = run(parse_date, vec!["31/02/2024", "%d/%m/%Y"]).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::Date);
        assert_eq!(run(is_valid, vec!["31/02/2024", "%d/%m/%Y"]).unwrap(), "false");
    }

    #[test]
    fn test_invalid_output_pattern_is_error_not_panic() {
        let err = run(format_date, vec!["2024-03-05", "%Q"]).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::Date);
    }
}
