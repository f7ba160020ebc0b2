use crate::{
    add_native_word,
    lang::code::Op,
    runtime::{
        data_structures::{
            arithmetic::{apply, ArithOp},
            value::Value,
        },
        error::{self, script_error},
        interpreter::Interpreter,
    },
};

/// Update the variable at the index on top of the stack with the value under it.  A variable is a
/// definition whose first body cell pushes a value; that cell is rewritten in place.
///
/// Signature: `n idx -- `
fn assign(interpreter: &mut dyn Interpreter, word: &str, op: Option<ArithOp>) -> error::Result<()> {
    if interpreter.stack().len() < 2 {
        return script_error(format!(
            "Assignment \"{}\" needs 2 items, stack has {}",
            word,
            interpreter.stack().len()
        ));
    }

    let Some(index) = interpreter.peek(0)?.as_int() else {
        return script_error("Index of variable is not an integer".to_string());
    };

    let len = interpreter.store().len();

    if index < 0 || index as usize >= len {
        return script_error(format!("Index out of execution list range 0:{}", len));
    }

    let index = index as usize;

    let current = match interpreter.store().get(index + 1).map(|cell| &cell.op) {
        Some(Op::PushLiteral(value)) => value.clone(),
        Some(Op::PushIndex(target)) => Value::Int(*target as i64),
        _ => {
            let name = match interpreter.store().header_name(index) {
                Some(name) => name.to_string(),
                None => interpreter.store().cells()[index].op.to_string(),
            };

            return script_error(format!("\"{}\" is not a variable, no assignment allowed", name));
        }
    };

    let operand = interpreter.peek(1)?.clone();

    let updated = match op {
        None => operand,
        Some(op) => match apply(op, &current, &operand) {
            Ok(value) => value,
            Err(message) => return script_error(message),
        },
    };

    if let Some(cell) = interpreter.store_mut().get_mut(index + 1) {
        cell.op = Op::PushLiteral(updated);
    }

    let _ = interpreter.pop()?;
    let _ = interpreter.pop()?;

    Ok(())
}

fn word_store(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    assign(interpreter, "=", None)
}

fn word_add_store(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    assign(interpreter, "+=", Some(ArithOp::Add))
}

fn word_subtract_store(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    assign(interpreter, "-=", Some(ArithOp::Subtract))
}

fn word_multiply_store(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    assign(interpreter, "*=", Some(ArithOp::Multiply))
}

fn word_divide_store(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    assign(interpreter, "/=", Some(ArithOp::Divide))
}

fn word_floor_divide_store(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    assign(interpreter, "//=", Some(ArithOp::FloorDivide))
}

fn word_remainder_store(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    assign(interpreter, "%=", Some(ArithOp::Remainder))
}

fn word_power_store(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    assign(interpreter, "**=", Some(ArithOp::Power))
}

/// Register the variable assignment words.
pub fn register_variable_words(interpreter: &mut dyn Interpreter) {
    add_native_word!(
        interpreter,
        "=",
        word_store,
        "Store n into the variable with index idx.",
        "n idx -- "
    );

    add_native_word!(interpreter, "+=", word_add_store, "var[idx] += n", "n idx -- ");

    add_native_word!(interpreter, "-=", word_subtract_store, "var[idx] -= n", "n idx -- ");

    add_native_word!(interpreter, "*=", word_multiply_store, "var[idx] *= n", "n idx -- ");

    add_native_word!(interpreter, "/=", word_divide_store, "var[idx] /= n", "n idx -- ");

    add_native_word!(interpreter, "//=", word_floor_divide_store, "var[idx] //= n", "n idx -- ");

    add_native_word!(interpreter, "%=", word_remainder_store, "var[idx] %= n", "n idx -- ");

    add_native_word!(interpreter, "**=", word_power_store, "var[idx] **= n", "n idx -- ");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::interpreter::{
        rpforth_interpreter::RpforthInterpreter, CodeManagement, InterpreterStack,
    };

    fn with_variable(initial: Value) -> RpforthInterpreter {
        let mut interpreter = RpforthInterpreter::new();

        let _ = interpreter.store_mut().push(None, Op::DefHeader("counter".into()));
        let _ = interpreter.store_mut().push(None, Op::PushLiteral(initial));
        let _ = interpreter.store_mut().push(None, Op::Return);

        interpreter
    }

    #[test]
    fn store_replaces_the_literal() {
        let mut interpreter = with_variable(Value::Int(1));

        interpreter.push(Value::Str("hello".into()));
        interpreter.push(Value::Int(0));

        word_store(&mut interpreter).unwrap();

        assert!(interpreter.stack().is_empty());
        assert_eq!(
            interpreter.store().get(1).map(|cell| &cell.op),
            Some(&Op::PushLiteral(Value::Str("hello".into())))
        );
    }

    #[test]
    fn compound_assignment_applies_current_op_n() {
        let mut interpreter = with_variable(Value::Int(10));

        interpreter.push(Value::Int(3));
        interpreter.push(Value::Int(0));

        word_subtract_store(&mut interpreter).unwrap();

        assert_eq!(
            interpreter.store().get(1).map(|cell| &cell.op),
            Some(&Op::PushLiteral(Value::Int(7)))
        );
    }

    #[test]
    fn non_variables_are_refused() {
        let mut interpreter = RpforthInterpreter::new();

        let _ = interpreter.store_mut().push(None, Op::DefHeader("word".into()));
        let _ = interpreter.store_mut().push(None, Op::Return);

        interpreter.push(Value::Int(5));
        interpreter.push(Value::Int(0));

        let error = word_store(&mut interpreter).unwrap_err();

        assert!(error.to_string().contains("\"word\" is not a variable"));
        assert_eq!(interpreter.stack().len(), 2);
    }
}
