use crate::builtins::{self, NativeFunction};
use crate::error::{RuntimeError, RuntimeResult};
use crate::runtime::Runtime;
use crate::value::{Args, Value};

pub static FUNCTIONS: &[NativeFunction] = &[
    NativeFunction::pure("math::floor", 1, 1, floor),
    NativeFunction::pure("math::ceil", 1, 1, ceil),
    NativeFunction::pure("math::round", 1, 2, round),
    NativeFunction::pure("math::abs", 1, 1, abs),
    NativeFunction::pure("math::min", 2, 2, min),
    NativeFunction::pure("math::max", 2, 2, max),
    NativeFunction::pure("math::pow", 2, 2, pow),
    NativeFunction::pure("math::sqrt", 1, 1, sqrt),
    NativeFunction::pure("math::parse_number", 1, 1, parse_number),
    NativeFunction::pure("math::format_fixed", 2, 2, format_fixed),
    NativeFunction::pure("math::clamp", 3, 3, clamp),
];

fn to_int(value: f64) -> RuntimeResult<Value> {
    if value.is_finite() && value.abs() < 9.2e18 {
        Ok(Value::Int(value as i64))
    } else {
        Err(RuntimeError::value_error(format!(
            "cannot convert {value} to int"
        )))
    }
}

fn floor(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    match args.get(0) {
        Value::Int(i) => Ok(Value::Int(*i)),
        _ => to_int(args.number(0)?.floor()),
    }
}

fn ceil(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    match args.get(0) {
        Value::Int(i) => Ok(Value::Int(*i)),
        _ => to_int(args.number(0)?.ceil()),
    }
}

fn round(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    if let (Value::Int(i), None) = (args.get(0), args.opt(1)) {
        return Ok(Value::Int(*i));
    }
    builtins::round_number(args.number(0)?, args.opt_int(1)?)
}

fn abs(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    match args.get(0) {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::value_error("integer overflow")),
        _ => Ok(Value::Float(args.number(0)?.abs())),
    }
}

fn pick(args: &Args, take_second: fn(f64, f64) -> bool) -> RuntimeResult<Value> {
    let a = args.number(0)?;
    let b = args.number(1)?;
    Ok(if take_second(a, b) {
        args.get(1).clone()
    } else {
        args.get(0).clone()
    })
}

fn min(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    pick(&args, |a, b| b < a)
}

fn max(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    pick(&args, |a, b| b > a)
}

/// Integer result for a non-negative integer exponent, float otherwise.
fn pow(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    if let (Value::Int(base), Value::Int(exp)) = (args.get(0), args.get(1)) {
        if *exp >= 0 {
            let exp = u32::try_from(*exp)
                .map_err(|_| RuntimeError::value_error("exponent too large"))?;
            return base
                .checked_pow(exp)
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::value_error("integer overflow"));
        }
    }
    Ok(Value::Float(args.number(0)?.powf(args.number(1)?)))
}

fn sqrt(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let x = args.number(0)?;
    if x < 0.0 {
        return Err(RuntimeError::value_error("math domain error"));
    }
    Ok(Value::Float(x.sqrt()))
}

/// Int when the text is an integer, float when it is a decimal, else null.
fn parse_number(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let source = args.str(0)?;
    let trimmed = source.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    Ok(trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Value::Float)
        .unwrap_or(Value::Null))
}

fn format_fixed(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let x = args.number(0)?;
    let digits = args.int(1)?.clamp(0, 20) as usize;
    Ok(Value::str(format!("{x:.digits$}")))
}

fn clamp(_rt: &mut Runtime, args: Args) -> RuntimeResult<Value> {
    let x = args.number(0)?;
    let lo = args.number(1)?;
    let hi = args.number(2)?;
    if lo > hi {
        return Err(RuntimeError::value_error("clamp() lower bound exceeds upper bound"));
    }
    Ok(if x < lo {
        args.get(1).clone()
    } else if x > hi {
        args.get(2).clone()
    } else {
        args.get(0).clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ExecutionLimits;

    fn run(f: fn(&mut Runtime, Args) -> RuntimeResult<Value>, values: Vec<Value>) -> RuntimeResult<String> {
        let mut rt = Runtime::new(&ExecutionLimits::default());
        f(&mut rt, Args::new("math::test", values))?.render(100)
    }

    #[test]
    fn test_floor_ceil_return_ints() {
        assert_eq!(run(floor, vec![Value::Float(-1.5)]).unwrap(), "-2");
        assert_eq!(run(ceil, vec![Value::Float(1.2)]).unwrap(), "2");
    }

    #[test]
    fn test_pow_int_and_float() {
        assert_eq!(run(pow, vec![Value::Int(2), Value::Int(10)]).unwrap(), "1024");
        assert_eq!(run(pow, vec![Value::Int(2), Value::Int(-1)]).unwrap(), "0.5");
        assert!(run(pow, vec![Value::Int(10), Value::Int(40)]).is_err());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(run(parse_number, vec![Value::str(" 12 ")]).unwrap(), "12");
        assert_eq!(run(parse_number, vec![Value::str("1.50")]).unwrap(), "1.5");
        assert_eq!(run(parse_number, vec![Value::str("abc")]).unwrap(), "null");
    }

    #[test]
    fn test_format_fixed_and_clamp() {
        assert_eq!(run(format_fixed, vec![Value::Float(3.14159), Value::Int(2)]).unwrap(), "3.14");
        assert_eq!(run(format_fixed, vec![Value::Int(5), Value::Int(1)]).unwrap(), "5.0");
        assert_eq!(
            run(clamp, vec![Value::Int(15), Value::Int(0), Value::Int(10)]).unwrap(),
            "10"
        );
    }

    #[test]
    fn test_sqrt_domain() {
        assert!(run(sqrt, vec![Value::Int(-1)]).is_err());
        assert_eq!(run(sqrt, vec![Value::Int(9)]).unwrap(), "3.0");
    }
}
