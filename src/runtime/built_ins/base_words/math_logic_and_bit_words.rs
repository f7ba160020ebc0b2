use crate::{
    add_native_word,
    runtime::{
        data_structures::value::{ToValue, Value},
        error::{self, script_error},
        interpreter::Interpreter,
    },
};
use std::cmp::Ordering;

/// Set the flag from `NOS op TOS`.  Both values stay on the stack.
fn compare_op(
    interpreter: &mut dyn Interpreter,
    name: &str,
    test: fn(Ordering) -> bool,
) -> error::Result<()> {
    interpreter.require(2, name)?;

    let (x, y) = (interpreter.peek(1)?, interpreter.peek(0)?);

    let Some(ordering) = x.compare(y) else {
        return script_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            name,
            x.type_name(),
            y.type_name()
        ));
    };

    interpreter.set_flag(test(ordering));
    Ok(())
}

/// Set the flag from `TOS op 0`.  The value stays on the stack.
fn zero_compare_op(
    interpreter: &mut dyn Interpreter,
    name: &str,
    test: fn(Ordering) -> bool,
) -> error::Result<()> {
    let value = interpreter.peek(0)?;

    let Some(ordering) = value.compare(&Value::Int(0)) else {
        return script_error(format!(
            "\"{}\" not supported for '{}'",
            name,
            value.type_name()
        ));
    };

    interpreter.set_flag(test(ordering));
    Ok(())
}

/// Set the flag from the truthiness of the top two values.  Both stay on the stack.
fn logic_op(interpreter: &mut dyn Interpreter, name: &str, op: fn(bool, bool) -> bool) -> error::Result<()> {
    interpreter.require(2, name)?;

    let x = interpreter.peek(1)?.is_truthy();
    let y = interpreter.peek(0)?.is_truthy();

    interpreter.set_flag(op(x, y));
    Ok(())
}

/// Apply an integer operation to the top two values.
fn bit_op(
    interpreter: &mut dyn Interpreter,
    name: &str,
    op: fn(i64, i64) -> Result<i64, String>,
) -> error::Result<()> {
    interpreter.require(2, name)?;

    let (Some(x), Some(y)) = (interpreter.peek(1)?.as_int(), interpreter.peek(0)?.as_int()) else {
        return script_error(format!("Bitwise \"{}\" needs two integers", name));
    };

    match op(x, y) {
        Ok(result) => {
            let _ = interpreter.pop()?;
            let _ = interpreter.pop()?;

            interpreter.push(result.to_value());
            Ok(())
        }

        Err(message) => script_error(message),
    }
}

fn shift_count(count: i64) -> Result<u32, String> {
    if count < 0 {
        return Err("negative shift count".to_string());
    }

    Ok(count.min(63) as u32)
}

fn word_less(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    compare_op(interpreter, "<", Ordering::is_lt)
}

fn word_greater(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    compare_op(interpreter, ">", Ordering::is_gt)
}

fn word_less_equal(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    compare_op(interpreter, "<=", Ordering::is_le)
}

fn word_greater_equal(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    compare_op(interpreter, ">=", Ordering::is_ge)
}

/// Equality works for every pair of values, so it does not go through `compare`.
fn word_equal(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.require(2, "==")?;

    let equal = interpreter.peek(1)? == interpreter.peek(0)?;

    interpreter.set_flag(equal);
    Ok(())
}

fn word_not_equal(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.require(2, "!=")?;

    let equal = interpreter.peek(1)? == interpreter.peek(0)?;

    interpreter.set_flag(!equal);
    Ok(())
}

fn word_less_zero(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    zero_compare_op(interpreter, "<0", Ordering::is_lt)
}

fn word_greater_zero(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    zero_compare_op(interpreter, ">0", Ordering::is_gt)
}

fn word_equal_zero(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let zero = *interpreter.peek(0)? == Value::Int(0);

    interpreter.set_flag(zero);
    Ok(())
}

fn word_not_equal_zero(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let zero = *interpreter.peek(0)? == Value::Int(0);

    interpreter.set_flag(!zero);
    Ok(())
}

/// Is the item found in the sequence below it?
///
/// Signature: `seq item -- seq item`
fn membership(interpreter: &mut dyn Interpreter, name: &str) -> error::Result<bool> {
    interpreter.require(2, name)?;

    match interpreter.peek(1)?.contains(interpreter.peek(0)?) {
        Ok(found) => Ok(found),
        Err(message) => script_error(message),
    }
}

fn word_in(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let found = membership(interpreter, "in")?;

    interpreter.set_flag(found);
    Ok(())
}

fn word_not_in(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let found = membership(interpreter, "notin")?;

    interpreter.set_flag(!found);
    Ok(())
}

/// Pop the top value into the flag.
///
/// Signature: `n -- `
fn word_set_flag(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let value = interpreter.pop()?;

    interpreter.set_flag(value.is_truthy());
    Ok(())
}

/// Push the flag as 0 or 1.
///
/// Signature: ` -- flag`
fn word_flag(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.push(Value::Int(interpreter.flag() as i64));
    Ok(())
}

fn word_and(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    logic_op(interpreter, "and", |x, y| x && y)
}

fn word_or(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    logic_op(interpreter, "or", |x, y| x || y)
}

fn word_xor(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    logic_op(interpreter, "xor", |x, y| x != y)
}

fn word_not(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let truthy = interpreter.peek(0)?.is_truthy();

    interpreter.set_flag(!truthy);
    Ok(())
}

fn word_not_not(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let truthy = interpreter.peek(0)?.is_truthy();

    interpreter.set_flag(truthy);
    Ok(())
}

fn word_bit_and(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    bit_op(interpreter, "&", |x, y| Ok(x & y))
}

fn word_bit_or(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    bit_op(interpreter, "|", |x, y| Ok(x | y))
}

fn word_bit_xor(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    bit_op(interpreter, "^", |x, y| Ok(x ^ y))
}

fn word_left_shift(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    bit_op(interpreter, "<<", |x, count| {
        let count = shift_count(count)?;

        if count >= 63 {
            return if x == 0 { Ok(0) } else { Err("integer overflow in <<".to_string()) };
        }

        x.checked_mul(1i64 << count)
            .ok_or_else(|| "integer overflow in <<".to_string())
    })
}

fn word_right_shift(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    bit_op(interpreter, ">>", |x, count| Ok(x >> shift_count(count)?))
}

/// One's complement.
///
/// Signature: `n -- ~n`
fn word_bit_not(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let Some(value) = interpreter.peek(0)?.as_int() else {
        return script_error("Bitwise \"~\" needs an integer".to_string());
    };

    let _ = interpreter.pop()?;
    interpreter.push((!value).to_value());

    Ok(())
}

/// Register the comparison, logic and bitwise words.
pub fn register_math_logic_and_bit_words(interpreter: &mut dyn Interpreter) {
    add_native_word!(interpreter, "<", word_less, "Flag = 1 if x < y.", "x y -- x y");

    add_native_word!(interpreter, ">", word_greater, "Flag = 1 if x > y.", "x y -- x y");

    add_native_word!(interpreter, "<=", word_less_equal, "Flag = 1 if x <= y.", "x y -- x y");

    add_native_word!(interpreter, ">=", word_greater_equal, "Flag = 1 if x >= y.", "x y -- x y");

    add_native_word!(interpreter, "==", word_equal, "Flag = 1 if x == y.", "x y -- x y");

    add_native_word!(interpreter, "!=", word_not_equal, "Flag = 1 if x != y.", "x y -- x y");

    add_native_word!(interpreter, "<0", word_less_zero, "Flag = 1 if n < 0.", "n -- n");

    add_native_word!(interpreter, ">0", word_greater_zero, "Flag = 1 if n > 0.", "n -- n");

    add_native_word!(interpreter, "=0", word_equal_zero, "Flag = 1 if n == 0.", "n -- n");

    add_native_word!(interpreter, "!=0", word_not_equal_zero, "Flag = 1 if n != 0.", "n -- n");

    add_native_word!(
        interpreter,
        "in",
        word_in,
        "Flag = 1 if item is found in the sequence.",
        "seq item -- seq item"
    );

    add_native_word!(
        interpreter,
        "notin",
        word_not_in,
        "Flag = 1 if item is not found in the sequence.",
        "seq item -- seq item"
    );

    add_native_word!(interpreter, "zf=", word_set_flag, "Pop TOS into the flag.", "n -- ");

    add_native_word!(interpreter, "zf", word_flag, "Push the flag.", " -- flag");

    add_native_word!(interpreter, "and", word_and, "Flag = 1 if x and y are true.", "x y -- x y");

    add_native_word!(
        interpreter,
        "or",
        word_or,
        "Flag = 1 if x or y or both are true.",
        "x y -- x y"
    );

    add_native_word!(
        interpreter,
        "xor",
        word_xor,
        "Flag = 1 if exactly one of x and y is true.",
        "x y -- x y"
    );

    add_native_word!(interpreter, "not", word_not, "Flag = 1 if n is false or None.", "n -- n");

    add_native_word!(interpreter, "-not", word_not_not, "Flag = 1 if n is true.", "n -- n");

    add_native_word!(interpreter, "&", word_bit_and, "Bitwise and.", "x y -- x&y");

    add_native_word!(interpreter, "|", word_bit_or, "Bitwise or.", "x y -- x|y");

    add_native_word!(interpreter, "^", word_bit_xor, "Bitwise exclusive or.", "x y -- x^y");

    add_native_word!(interpreter, "~", word_bit_not, "One's complement.", "n -- ~n");

    add_native_word!(interpreter, "<<", word_left_shift, "Shift n left by i bits.", "n i -- n");

    add_native_word!(interpreter, ">>", word_right_shift, "Shift n right by i bits.", "n i -- n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::interpreter::{
        rpforth_interpreter::RpforthInterpreter, InterpreterStack, Registers,
    };

    #[test]
    fn comparisons_keep_operands_and_set_flag() {
        let mut interpreter = RpforthInterpreter::new();

        interpreter.push(Value::Int(1));
        interpreter.push(Value::Float(2.5));

        word_less(&mut interpreter).unwrap();
        assert!(interpreter.flag());

        word_greater_equal(&mut interpreter).unwrap();
        assert!(!interpreter.flag());
        assert_eq!(interpreter.stack().len(), 2);
    }

    #[test]
    fn mixed_types_do_not_order() {
        let mut interpreter = RpforthInterpreter::new();

        interpreter.push(Value::Str("a".into()));
        interpreter.push(Value::Int(1));

        assert!(word_less(&mut interpreter).is_err());

        word_not_equal(&mut interpreter).unwrap();
        assert!(interpreter.flag());
    }

    #[test]
    fn membership_looks_into_sequences() {
        let mut interpreter = RpforthInterpreter::new();

        interpreter.push(Value::List(vec![Value::Int(3), Value::Int(4)]));
        interpreter.push(Value::Int(4));

        word_in(&mut interpreter).unwrap();
        assert!(interpreter.flag());

        word_not_in(&mut interpreter).unwrap();
        assert!(!interpreter.flag());
    }

    #[test]
    fn flag_round_trips_through_the_stack() {
        let mut interpreter = RpforthInterpreter::new();

        interpreter.push(Value::Int(5));
        word_set_flag(&mut interpreter).unwrap();
        word_flag(&mut interpreter).unwrap();

        assert_eq!(interpreter.stack(), &vec![Value::Int(1)]);
    }
}
