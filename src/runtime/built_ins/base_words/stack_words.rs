use crate::{
    add_native_word,
    runtime::{
        data_structures::value::ToValue,
        error::{self, script_error},
        interpreter::Interpreter,
    },
};

/// Duplicate the top value on the data stack.
///
/// Signature: `value -- value value`
fn word_dup(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let value = interpreter.peek(0)?.clone();

    interpreter.push(value);

    Ok(())
}

/// Duplicate the top two values on the data stack.
///
/// Signature: `x y -- x y x y`
fn word_2dup(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.require(2, "2dup")?;

    let x = interpreter.peek(1)?.clone();
    let y = interpreter.peek(0)?.clone();

    interpreter.push(x);
    interpreter.push(y);

    Ok(())
}

/// Drop the top value on the data stack.
///
/// Signature: `value -- `
fn word_drop(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let _ = interpreter.pop()?;

    Ok(())
}

/// Signature: `x y -- `
fn word_2drop(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.require(2, "2drop")?;

    let _ = interpreter.pop()?;
    let _ = interpreter.pop()?;

    Ok(())
}

/// Swap the top 2 values on the data stack.
///
/// Signature: `x y -- y x`
fn word_swap(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.require(2, "swap")?;

    let y = interpreter.pop()?;
    let x = interpreter.pop()?;

    interpreter.push(y);
    interpreter.push(x);

    Ok(())
}

/// Make a copy of the second value and place it on top.
///
/// Signature: `x y -- x y x`
fn word_over(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.require(2, "over")?;

    let x = interpreter.peek(1)?.clone();
    interpreter.push(x);

    Ok(())
}

/// Drop the second value.
///
/// Signature: `x y -- y`
fn word_nip(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.require(2, "nip")?;

    let y = interpreter.pop()?;
    let _ = interpreter.pop()?;

    interpreter.push(y);

    Ok(())
}

/// Tuck a copy of the top value under the second one.
///
/// Signature: `x y -- y x y`
fn word_tuck(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.require(2, "tuck")?;

    let y = interpreter.pop()?;
    let x = interpreter.pop()?;

    interpreter.push(y.clone());
    interpreter.push(x);
    interpreter.push(y);

    Ok(())
}

/// Rotate the top 3 values, the third one comes to the top.
///
/// Signature: `x y z -- y z x`
fn word_rot(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.require(3, "rot")?;

    let z = interpreter.pop()?;
    let y = interpreter.pop()?;
    let x = interpreter.pop()?;

    interpreter.push(y);
    interpreter.push(z);
    interpreter.push(x);

    Ok(())
}

/// Rotate the top 3 values the other way, the top one goes under the other two.
///
/// Signature: `x y z -- z x y`
fn word_rot_left(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.require(3, "-rot")?;

    let z = interpreter.pop()?;
    let y = interpreter.pop()?;
    let x = interpreter.pop()?;

    interpreter.push(z);
    interpreter.push(x);
    interpreter.push(y);

    Ok(())
}

/// Replace the index on top of the stack with a copy of the value that many items below it.
///
/// Signature: `xn ... x0 n -- xn ... x0 xn`
fn word_pick(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let Some(index) = interpreter.peek(0)?.as_int() else {
        return script_error("Index of item to pick must be an integer".to_string());
    };

    let below = interpreter.stack().len() as i64 - 1;

    if index < 0 || index >= below {
        return script_error(format!(
            "Index {} of item to pick is negative or beyond the {} items below it",
            index, below
        ));
    }

    let _ = interpreter.pop()?;
    let value = interpreter.peek(index as usize)?.clone();

    interpreter.push(value);

    Ok(())
}

/// Get the depth of the data stack before calling this word.
///
/// Signature: ` -- depth`
fn word_depth(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.push(interpreter.stack().len().to_value());
    Ok(())
}

fn word_clear_stack(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.clear_stack();
    Ok(())
}

/// Move the top of the data stack to the user stack.
///
/// Signature: `value -- `
fn word_user_push(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let value = interpreter.pop()?;

    interpreter.aux_push(value);

    Ok(())
}

/// Move the top of the user stack back to the data stack.
///
/// Signature: ` -- value`
fn word_user_pop(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let value = interpreter.aux_pop()?;

    interpreter.push(value);

    Ok(())
}

fn word_clear_user_stack(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.clear_aux_stack();
    Ok(())
}

/// Register the stack manipulation words.
pub fn register_stack_words(interpreter: &mut dyn Interpreter) {
    add_native_word!(interpreter, "dup", word_dup, "Duplicate the top value.", "x -- x x");

    add_native_word!(
        interpreter,
        "2dup",
        word_2dup,
        "Duplicate the top two values.",
        "x y -- x y x y"
    );

    add_native_word!(interpreter, "drop", word_drop, "Discard the top value.", "x -- ");

    add_native_word!(interpreter, "2drop", word_2drop, "Discard the top two values.", "x y -- ");

    add_native_word!(interpreter, "swap", word_swap, "Swap the top two values.", "x y -- y x");

    add_native_word!(
        interpreter,
        "over",
        word_over,
        "Copy the second value over the top.",
        "x y -- x y x"
    );

    add_native_word!(interpreter, "nip", word_nip, "Discard the second value.", "x y -- y");

    add_native_word!(
        interpreter,
        "tuck",
        word_tuck,
        "Insert a copy of the top value under the second.",
        "x y -- y x y"
    );

    add_native_word!(
        interpreter,
        "rot",
        word_rot,
        "Rotate the top three values, the third comes to the top.",
        "x y z -- y z x"
    );

    add_native_word!(
        interpreter,
        "-rot",
        word_rot_left,
        "Rotate the top three values, the top goes third.",
        "x y z -- z x y"
    );

    add_native_word!(
        interpreter,
        "pick",
        word_pick,
        "Replace n with a copy of the n-th item below it.",
        "xn ... x0 n -- xn ... x0 xn"
    );

    add_native_word!(
        interpreter,
        "depth",
        word_depth,
        "Push the number of items on the data stack.",
        " -- n"
    );

    add_native_word!(
        interpreter,
        "cleards",
        word_clear_stack,
        "Empty the data stack.",
        "... -- "
    );

    add_native_word!(
        interpreter,
        "uspush",
        word_user_push,
        "Move the top value to the user stack.",
        "x -- "
    );

    add_native_word!(
        interpreter,
        "uspop",
        word_user_pop,
        "Move the top of the user stack to the data stack.",
        " -- x"
    );

    add_native_word!(
        interpreter,
        "clearus",
        word_clear_user_stack,
        "Empty the user stack.",
        " -- "
    );
}
