use crate::runtime::data_structures::value::{Complex, Value};

/// The binary arithmetic operations shared by the math words and the assignment words.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Subtract,
    Multiply,

    /// True division, integers divide to a float.
    Divide,

    /// Division rounded towards negative infinity.
    FloorDivide,

    /// Remainder with the sign of the divisor.
    Remainder,

    Power,
}

impl ArithOp {
    /// The word that performs this operation.
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Subtract => "-",
            ArithOp::Multiply => "*",
            ArithOp::Divide => "/",
            ArithOp::FloorDivide => "//",
            ArithOp::Remainder => "%",
            ArithOp::Power => "**",
        }
    }
}

fn unsupported(op: ArithOp, x: &Value, y: &Value) -> String {
    format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        x.type_name(),
        y.type_name()
    )
}

fn overflow(op: ArithOp) -> String {
    format!("integer overflow in {}", op.symbol())
}

/// Largest sequence or string a repetition may build.
const REPEAT_LIMIT: usize = 1 << 24;

/// Size of `len` items repeated `count` times, refused when it will not fit.
fn repeated_len(len: usize, count: i64) -> Result<usize, String> {
    let count = usize::try_from(count.max(0)).map_err(|_| "repeated sequence is too long")?;

    match len.checked_mul(count) {
        Some(total) if total <= REPEAT_LIMIT => Ok(total),
        _ => Err("repeated sequence is too long".to_string()),
    }
}

fn repeat<T: Clone>(items: &[T], count: i64) -> Result<Vec<T>, String> {
    let total = repeated_len(items.len(), count)?;

    if total == 0 {
        return Ok(Vec::new());
    }

    let mut result = Vec::with_capacity(total);

    for _ in 0..count {
        result.extend_from_slice(items);
    }

    Ok(result)
}

/// Floored integer division and the matching remainder.
pub fn floor_div_mod(x: i64, y: i64) -> Option<(i64, i64)> {
    let quotient = x.checked_div(y)?;
    let remainder = x.checked_rem(y)?;

    if remainder != 0 && ((remainder < 0) != (y < 0)) {
        Some((quotient - 1, remainder + y))
    } else {
        Some((quotient, remainder))
    }
}

fn integer_op(op: ArithOp, x: i64, y: i64) -> Result<Value, String> {
    let result = match op {
        ArithOp::Add => x.checked_add(y),
        ArithOp::Subtract => x.checked_sub(y),
        ArithOp::Multiply => x.checked_mul(y),
        ArithOp::Divide => {
            if y == 0 {
                return Err("division by zero".to_string());
            }

            return Ok(Value::Float(x as f64 / y as f64));
        }
        ArithOp::FloorDivide | ArithOp::Remainder => {
            if y == 0 {
                return Err("integer division or modulo by zero".to_string());
            }

            floor_div_mod(x, y).map(|(quotient, remainder)| {
                if op == ArithOp::FloorDivide {
                    quotient
                } else {
                    remainder
                }
            })
        }
        ArithOp::Power => {
            if y < 0 {
                return Ok(Value::Float((x as f64).powf(y as f64)));
            }

            u32::try_from(y).ok().and_then(|exponent| x.checked_pow(exponent))
        }
    };

    result.map(Value::Int).ok_or_else(|| overflow(op))
}

fn real_op(op: ArithOp, x: f64, y: f64) -> Result<Value, String> {
    let result = match op {
        ArithOp::Add => x + y,
        ArithOp::Subtract => x - y,
        ArithOp::Multiply => x * y,
        ArithOp::Divide | ArithOp::FloorDivide | ArithOp::Remainder if y == 0.0 => {
            return Err("float division by zero".to_string());
        }
        ArithOp::Divide => x / y,
        ArithOp::FloorDivide => (x / y).floor(),
        ArithOp::Remainder => x - y * (x / y).floor(),
        ArithOp::Power => x.powf(y),
    };

    Ok(Value::Float(result))
}

fn complex_op(op: ArithOp, x: Complex, y: Complex) -> Result<Value, String> {
    let result = match op {
        ArithOp::Add => x.add(y),
        ArithOp::Subtract => x.sub(y),
        ArithOp::Multiply => x.mul(y),
        ArithOp::Divide => x.div(y).ok_or_else(|| "complex division by zero".to_string())?,
        ArithOp::Power => x.powc(y),
        ArithOp::FloorDivide | ArithOp::Remainder => {
            return Err(format!("can't take floor or mod of complex number ({})", op.symbol()));
        }
    };

    Ok(Value::Complex(result))
}

/// Apply `x op y`.  Numbers widen from int to float to complex, strings and sequences support
/// concatenation and repetition.  The error text is what the abort report shows.
pub fn apply(op: ArithOp, x: &Value, y: &Value) -> Result<Value, String> {
    match (x, y) {
        (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)) => {
            match (x.as_int(), y.as_int()) {
                (Some(a), Some(b)) => integer_op(op, a, b),
                _ => Err(unsupported(op, x, y)),
            }
        }

        (Value::Complex(_), _) | (_, Value::Complex(_)) if x.is_numeric() && y.is_numeric() => {
            match (x.as_complex(), y.as_complex()) {
                (Some(a), Some(b)) => complex_op(op, a, b),
                _ => Err(unsupported(op, x, y)),
            }
        }

        _ if x.is_numeric() && y.is_numeric() => match (x.as_real(), y.as_real()) {
            (Some(a), Some(b)) => real_op(op, a, b),
            _ => Err(unsupported(op, x, y)),
        },

        (Value::Str(a), Value::Str(b)) if op == ArithOp::Add => Ok(Value::Str(format!("{}{}", a, b))),
        (Value::Str(text), Value::Int(count)) | (Value::Int(count), Value::Str(text))
            if op == ArithOp::Multiply =>
        {
            let _ = repeated_len(text.len(), *count)?;

            Ok(Value::Str(text.repeat((*count).max(0) as usize)))
        }

        (Value::List(a), Value::List(b)) if op == ArithOp::Add => {
            Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
        }
        (Value::Tuple(a), Value::Tuple(b)) if op == ArithOp::Add => {
            Ok(Value::Tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (Value::List(items), Value::Int(count)) | (Value::Int(count), Value::List(items))
            if op == ArithOp::Multiply =>
        {
            Ok(Value::List(repeat(items, *count)?))
        }
        (Value::Tuple(items), Value::Int(count)) | (Value::Int(count), Value::Tuple(items))
            if op == ArithOp::Multiply =>
        {
            Ok(Value::Tuple(repeat(items, *count)?))
        }

        _ => Err(unsupported(op, x, y)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn true_division_of_integers_is_float() {
        assert_eq!(
            apply(ArithOp::Divide, &Value::Int(10), &Value::Int(2)),
            Ok(Value::Float(5.0))
        );
    }

    #[test]
    fn floor_division_rounds_down() {
        assert_eq!(
            apply(ArithOp::FloorDivide, &Value::Int(-7), &Value::Int(2)),
            Ok(Value::Int(-4))
        );
        assert_eq!(
            apply(ArithOp::Remainder, &Value::Int(-7), &Value::Int(2)),
            Ok(Value::Int(1))
        );
        assert_eq!(
            apply(ArithOp::Remainder, &Value::Int(7), &Value::Int(-2)),
            Ok(Value::Int(-1))
        );
    }

    #[test]
    fn division_by_zero_is_reported() {
        assert!(apply(ArithOp::Divide, &Value::Int(1), &Value::Int(0)).is_err());
        assert!(apply(ArithOp::Remainder, &Value::Float(1.0), &Value::Int(0)).is_err());
    }

    #[test]
    fn mixed_types_widen() {
        assert_eq!(
            apply(ArithOp::Add, &Value::Int(1), &Value::Float(0.5)),
            Ok(Value::Float(1.5))
        );
        assert_eq!(
            apply(
                ArithOp::Multiply,
                &Value::Complex(Complex::new(0.0, 1.0)),
                &Value::Complex(Complex::new(0.0, 1.0))
            ),
            Ok(Value::Complex(Complex::new(-1.0, 0.0)))
        );
    }

    #[test]
    fn strings_and_lists_concatenate_and_repeat() {
        assert_eq!(
            apply(ArithOp::Add, &Value::Str("ab".into()), &Value::Str("cd".into())),
            Ok(Value::Str("abcd".into()))
        );
        assert_eq!(
            apply(ArithOp::Multiply, &Value::List(vec![Value::Int(0)]), &Value::Int(3)),
            Ok(Value::List(vec![Value::Int(0), Value::Int(0), Value::Int(0)]))
        );
        assert!(apply(ArithOp::Subtract, &Value::Str("a".into()), &Value::Int(1)).is_err());
    }

    #[test]
    fn huge_repetition_is_refused() {
        let pair = Value::List(vec![Value::Int(1), Value::Int(2)]);

        assert_eq!(
            apply(ArithOp::Multiply, &pair, &Value::Int(i64::MAX)),
            Err("repeated sequence is too long".to_string())
        );
        assert!(apply(ArithOp::Multiply, &Value::Int(i64::MAX), &Value::Str("ab".into())).is_err());
        assert_eq!(
            apply(ArithOp::Multiply, &Value::List(Vec::new()), &Value::Int(i64::MAX)),
            Ok(Value::List(Vec::new()))
        );
    }

    #[test]
    fn integer_power_stays_integer() {
        assert_eq!(
            apply(ArithOp::Power, &Value::Int(2), &Value::Int(10)),
            Ok(Value::Int(1024))
        );
        assert_eq!(
            apply(ArithOp::Power, &Value::Int(2), &Value::Int(-1)),
            Ok(Value::Float(0.5))
        );
    }
}
