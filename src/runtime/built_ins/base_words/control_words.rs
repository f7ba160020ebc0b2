use crate::{
    add_native_word,
    runtime::{
        data_structures::value::Value,
        error::{self, script_error},
        interpreter::{IndexRegister, Interpreter},
    },
};
use std::cmp::Ordering;

/// Read the execution list index `depth` items down without removing it.
fn index_at(interpreter: &dyn Interpreter, depth: usize, word: &str) -> error::Result<usize> {
    let len = interpreter.store().len();

    match interpreter.peek(depth)?.as_int() {
        Some(index) if index >= 0 && (index as usize) < len => Ok(index as usize),
        Some(_) => script_error(format!("Index out of execution list range 0:{}", len)),
        None => script_error(format!("Index of word for \"{}\" must be of type int", word)),
    }
}

/// Pop `count` indices, all checked before any is removed.  Returned deepest first.
fn pop_indices(interpreter: &mut dyn Interpreter, count: usize, word: &str) -> error::Result<Vec<usize>> {
    interpreter.require(count, word)?;

    let mut indices = (0..count)
        .map(|depth| index_at(interpreter, depth, word))
        .collect::<error::Result<Vec<_>>>()?;

    for _ in 0..count {
        let _ = interpreter.pop()?;
    }

    indices.reverse();
    Ok(indices)
}

/// Execute the word at the index and come back.
///
/// Signature: `idx -- `
fn word_execute_index(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let index = index_at(interpreter, 0, "execidx")?;

    let _ = interpreter.pop()?;
    interpreter.redirect(index)
}

/// Execute the first word if the flag is set, otherwise the second.
///
/// Signature: `idx1 idx2 -- `
fn word_choose(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let indices = pop_indices(interpreter, 2, "choose")?;
    let index = if interpreter.flag() { indices[0] } else { indices[1] };

    interpreter.redirect(index)
}

/// Execute one of three words depending on the sign of n.
///
/// Signature: `idx1 idx2 idx3 n -- `
fn word_sign_select(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.require(4, "<0>")?;

    let Some(ordering) = interpreter.peek(0)?.compare(&Value::Int(0)) else {
        return script_error("Value to compare with 0 must be of type int/float".to_string());
    };

    let indices = {
        let n = interpreter.pop()?;

        match pop_indices(interpreter, 3, "<0>") {
            Ok(indices) => indices,
            Err(error) => {
                interpreter.push(n);
                return Err(error);
            }
        }
    };

    let index = match ordering {
        Ordering::Less => indices[0],
        Ordering::Equal => indices[1],
        Ordering::Greater => indices[2],
    };

    interpreter.redirect(index)
}

/// Execute one of three words depending on how x compares to y.
///
/// Signature: `idx1 idx2 idx3 x y -- `
fn word_compare_select(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.require(5, "<=>")?;

    let (x, y) = (interpreter.peek(1)?, interpreter.peek(0)?);

    let Some(ordering) = x.compare(y) else {
        return script_error(format!(
            "'<=>' not supported between instances of '{}' and '{}'",
            x.type_name(),
            y.type_name()
        ));
    };

    let indices = {
        let y = interpreter.pop()?;
        let x = interpreter.pop()?;

        match pop_indices(interpreter, 3, "<=>") {
            Ok(indices) => indices,
            Err(error) => {
                interpreter.push(x);
                interpreter.push(y);
                return Err(error);
            }
        }
    };

    let index = match ordering {
        Ordering::Less => indices[0],
        Ordering::Equal => indices[1],
        Ordering::Greater => indices[2],
    };

    interpreter.redirect(index)
}

/// Run the word at the index as many times as the register says.
fn register_loop(interpreter: &mut dyn Interpreter, register: IndexRegister) -> error::Result<()> {
    let index = index_at(interpreter, 0, &format!("{}loop", register))?;

    let _ = interpreter.pop()?;

    for _ in 0..interpreter.register(register).max(0) {
        interpreter.execute_nested(index)?;
    }

    Ok(())
}

fn word_i_loop(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    register_loop(interpreter, IndexRegister::I)
}

fn word_j_loop(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    register_loop(interpreter, IndexRegister::J)
}

fn word_k_loop(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    register_loop(interpreter, IndexRegister::K)
}

/// Stop execution with the message on top of the stack.
///
/// Signature: `message -- `
fn word_abort(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    if !matches!(interpreter.peek(0)?, Value::Str(_)) {
        return script_error("Abort argument must be a string".to_string());
    }

    let message = interpreter.pop_as_string()?;

    interpreter.write_line("User Abort")?;
    script_error(message)
}

/// Register the words that move execution around.
pub fn register_control_words(interpreter: &mut dyn Interpreter) {
    add_native_word!(
        interpreter,
        "execidx",
        word_execute_index,
        "Execute the word with the given index and return.",
        "idx -- "
    );

    add_native_word!(
        interpreter,
        "choose",
        word_choose,
        "If the flag is set execute idx1, else idx2.",
        "idx1 idx2 -- "
    );

    add_native_word!(
        interpreter,
        "<0>",
        word_sign_select,
        "Execute idx1 if n < 0, idx2 if n == 0, else idx3.",
        "idx1 idx2 idx3 n -- "
    );

    add_native_word!(
        interpreter,
        "<=>",
        word_compare_select,
        "Execute idx1 if x < y, idx2 if x == y, else idx3.",
        "idx1 idx2 idx3 x y -- "
    );

    add_native_word!(
        interpreter,
        "iloop",
        word_i_loop,
        "Execute the word with the given index I times.",
        "idx -- "
    );

    add_native_word!(
        interpreter,
        "jloop",
        word_j_loop,
        "Execute the word with the given index J times.",
        "idx -- "
    );

    add_native_word!(
        interpreter,
        "kloop",
        word_k_loop,
        "Execute the word with the given index K times.",
        "idx -- "
    );

    add_native_word!(
        interpreter,
        "abort",
        word_abort,
        "Abort execution with a user message.",
        "str -- "
    );
}
