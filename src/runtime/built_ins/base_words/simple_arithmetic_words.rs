use crate::{
    add_native_word,
    runtime::{
        data_structures::{
            arithmetic::{apply, ArithOp},
            value::Value,
        },
        error::{self, script_error},
        interpreter::Interpreter,
    },
};

/// Apply `x op y` to the top two values.  The operands stay on the stack if the operation fails.
fn binary_op(interpreter: &mut dyn Interpreter, op: ArithOp) -> error::Result<()> {
    if interpreter.stack().len() < 2 {
        return script_error(format!(
            "Math \"{}\" needs 2 items, stack has {}",
            op.symbol(),
            interpreter.stack().len()
        ));
    }

    let result = apply(op, interpreter.peek(1)?, interpreter.peek(0)?);

    match result {
        Ok(value) => {
            let _ = interpreter.pop()?;
            let _ = interpreter.pop()?;

            interpreter.push(value);
            Ok(())
        }

        Err(message) => script_error(message),
    }
}

/// Apply a one operand numeric operation to the top value.  Non-numbers are rejected and stay on
/// the stack.
fn unary_op(
    interpreter: &mut dyn Interpreter,
    name: &str,
    op: fn(&Value) -> Result<Value, String>,
) -> error::Result<()> {
    let value = interpreter.peek(0)?;

    if !value.is_numeric() {
        return script_error(format!(
            "Value for \"{}\" must be of type (int,float,complex), found {}",
            name,
            value.type_name()
        ));
    }

    match op(value) {
        Ok(result) => {
            let _ = interpreter.pop()?;

            interpreter.push(result);
            Ok(())
        }

        Err(message) => script_error(message),
    }
}

fn word_add(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    binary_op(interpreter, ArithOp::Add)
}

fn word_subtract(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    binary_op(interpreter, ArithOp::Subtract)
}

fn word_multiply(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    binary_op(interpreter, ArithOp::Multiply)
}

fn word_divide(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    binary_op(interpreter, ArithOp::Divide)
}

fn word_floor_divide(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    binary_op(interpreter, ArithOp::FloorDivide)
}

fn word_remainder(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    binary_op(interpreter, ArithOp::Remainder)
}

fn word_power(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    binary_op(interpreter, ArithOp::Power)
}

/// Floored quotient and remainder together.
///
/// Signature: `x y -- quotient remainder`
fn word_divmod(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.require(2, "divmod")?;

    let (x, y) = (interpreter.peek(1)?, interpreter.peek(0)?);

    let quotient = apply(ArithOp::FloorDivide, x, y);
    let remainder = apply(ArithOp::Remainder, x, y);

    match (quotient, remainder) {
        (Ok(quotient), Ok(remainder)) => {
            let _ = interpreter.pop()?;
            let _ = interpreter.pop()?;

            interpreter.push(quotient);
            interpreter.push(remainder);
            Ok(())
        }

        (Err(message), _) | (_, Err(message)) => script_error(message),
    }
}

fn word_increment(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    unary_op(interpreter, "++", |value| apply(ArithOp::Add, value, &Value::Int(1)))
}

fn word_decrement(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    unary_op(interpreter, "--", |value| apply(ArithOp::Subtract, value, &Value::Int(1)))
}

fn word_negate(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    unary_op(interpreter, "neg", |value| apply(ArithOp::Subtract, &Value::Int(0), value))
}

fn word_abs(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    unary_op(interpreter, "abs", |value| match value {
        Value::Float(number) => Ok(Value::Float(number.abs())),
        Value::Complex(number) => Ok(Value::Float(number.abs())),
        _ => match value.as_int() {
            Some(number) => number
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| "integer overflow in abs".to_string()),
            None => Err(format!("bad operand type for abs(): '{}'", value.type_name())),
        },
    })
}

/// Register the arithmetic words.
pub fn register_simple_arithmetic_words(interpreter: &mut dyn Interpreter) {
    add_native_word!(interpreter, "+", word_add, "Add TOS to NOS.", "x y -- x+y");

    add_native_word!(interpreter, "-", word_subtract, "Subtract TOS from NOS.", "x y -- x-y");

    add_native_word!(interpreter, "*", word_multiply, "Multiply NOS by TOS.", "x y -- x*y");

    add_native_word!(
        interpreter,
        "/",
        word_divide,
        "Divide NOS by TOS, floating point division.",
        "x y -- x/y"
    );

    add_native_word!(
        interpreter,
        "//",
        word_floor_divide,
        "Divide NOS by TOS, floored division.",
        "x y -- x//y"
    );

    add_native_word!(
        interpreter,
        "%",
        word_remainder,
        "Remainder of the floored division of NOS by TOS.",
        "x y -- x%y"
    );

    add_native_word!(
        interpreter,
        "divmod",
        word_divmod,
        "Floored quotient and remainder of NOS by TOS.",
        "x y -- quot rem"
    );

    add_native_word!(interpreter, "**", word_power, "NOS to the power of TOS.", "x y -- x**y");

    add_native_word!(interpreter, "++", word_increment, "Add 1 to TOS.", "n -- n+1");

    add_native_word!(interpreter, "--", word_decrement, "Subtract 1 from TOS.", "n -- n-1");

    add_native_word!(interpreter, "neg", word_negate, "Negate TOS.", "n -- -n");

    add_native_word!(interpreter, "abs", word_abs, "Absolute value of TOS.", "n -- |n|");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::interpreter::{rpforth_interpreter::RpforthInterpreter, InterpreterStack};

    #[test]
    fn failed_math_keeps_operands() {
        let mut interpreter = RpforthInterpreter::new();

        interpreter.push(Value::Int(1));
        interpreter.push(Value::Int(0));

        assert!(word_divide(&mut interpreter).is_err());
        assert_eq!(interpreter.stack(), &vec![Value::Int(1), Value::Int(0)]);
    }

    #[test]
    fn divmod_floors() {
        let mut interpreter = RpforthInterpreter::new();

        interpreter.push(Value::Int(-7));
        interpreter.push(Value::Int(2));

        word_divmod(&mut interpreter).unwrap();
        assert_eq!(interpreter.stack(), &vec![Value::Int(-4), Value::Int(1)]);
    }

    #[test]
    fn unary_words_reject_strings() {
        let mut interpreter = RpforthInterpreter::new();

        interpreter.push(Value::Str("x".into()));

        assert!(word_negate(&mut interpreter).is_err());
        assert_eq!(interpreter.stack().len(), 1);
    }
}
