use crate::{
    add_native_word,
    runtime::{
        data_structures::value::{ToValue, Value},
        error::{self, script_error},
        interpreter::Interpreter,
    },
};

/// The marker `listcre` collects down to.
const LIST_MARKER: &str = "[]";

/// Replace the top value with the result of a conversion.  The value stays if the conversion
/// fails.
fn convert_top(
    interpreter: &mut dyn Interpreter,
    convert: fn(&Value) -> Result<Value, String>,
) -> error::Result<()> {
    match convert(interpreter.peek(0)?) {
        Ok(converted) => {
            let _ = interpreter.pop()?;

            interpreter.push(converted);
            Ok(())
        }

        Err(message) => script_error(message),
    }
}

fn to_int(value: &Value) -> Result<Value, String> {
    match value {
        Value::Float(number) if number.is_finite() => Ok(Value::Int(number.trunc() as i64)),
        Value::Float(number) => Err(format!("cannot convert float {} to integer", number)),
        Value::Str(text) => text
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("invalid literal for int() with base 10: {}", value.repr())),
        _ => match value.as_int() {
            Some(number) => Ok(Value::Int(number)),
            None => Err(format!(
                "int() argument must be a string or a number, not '{}'",
                value.type_name()
            )),
        },
    }
}

fn to_float(value: &Value) -> Result<Value, String> {
    match value {
        Value::Str(text) => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("could not convert string to float: {}", value.repr())),
        _ => match value.as_real() {
            Some(number) => Ok(Value::Float(number)),
            None => Err(format!(
                "float() argument must be a string or a number, not '{}'",
                value.type_name()
            )),
        },
    }
}

/// Push the name of the top value's type in its place.
///
/// Signature: `item -- type-name`
fn word_type(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let value = interpreter.pop()?;

    interpreter.push(value.type_name().to_value());

    Ok(())
}

fn word_int(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    convert_top(interpreter, to_int)
}

fn word_float(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    convert_top(interpreter, to_float)
}

fn word_str(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    convert_top(interpreter, |value| Ok(Value::Str(value.to_string())))
}

/// Signature: `seq -- n`
fn word_len(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    convert_top(interpreter, |value| match value.item_count() {
        Some(count) => Ok(count.to_value()),
        None => Err(format!("object of type '{}' has no len()", value.type_name())),
    })
}

/// Append the top value to the list under it.
///
/// Signature: `list item -- list`
fn word_append(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.require(2, "append")?;

    if !matches!(interpreter.peek(1)?, Value::List(_)) {
        return script_error(format!(
            "'{}' object has no attribute 'append'",
            interpreter.peek(1)?.type_name()
        ));
    }

    let item = interpreter.pop()?;

    match interpreter.pop()? {
        Value::List(mut items) => {
            items.push(item);
            interpreter.push(Value::List(items));
        }

        other => interpreter.push(other),
    }

    Ok(())
}

/// Collect the values above the `'[]` marker into a list, in stack order.  Without a marker the
/// whole stack is collected.
///
/// Signature: `"[]" x1 ... xn -- list`
fn word_list_create(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    if interpreter.stack().is_empty() {
        return script_error("Missing arguments for \"listcre\"".to_string());
    }

    let marker = Value::Str(LIST_MARKER.to_string());
    let mut items = Vec::new();

    while let Ok(value) = interpreter.pop() {
        if value == marker {
            break;
        }

        items.push(value);
    }

    items.reverse();
    interpreter.push(Value::List(items));

    Ok(())
}

/// Push every item of a list.
///
/// Signature: `list -- x1 ... xn`
fn word_list_expand(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    if !matches!(interpreter.peek(0)?, Value::List(_)) {
        return script_error("Argument for \"listexp\" must be a list".to_string());
    }

    if let Value::List(items) = interpreter.pop()? {
        for item in items {
            interpreter.push(item);
        }
    }

    Ok(())
}

/// Register the value conversion and list words.
pub fn register_value_type_words(interpreter: &mut dyn Interpreter) {
    add_native_word!(interpreter, "type", word_type, "Replace item with its type name.", "item -- type");

    add_native_word!(
        interpreter,
        "int",
        word_int,
        "Convert a string or number to an integer.",
        "str/n -- n"
    );

    add_native_word!(
        interpreter,
        "float",
        word_float,
        "Convert a string or number to a float.",
        "str/n -- n"
    );

    add_native_word!(interpreter, "str", word_str, "Convert an item to a string.", "item -- str");

    add_native_word!(
        interpreter,
        "len",
        word_len,
        "Number of items in a sequence or characters in a string.",
        "seq -- n"
    );

    add_native_word!(
        interpreter,
        "append",
        word_append,
        "Append item to list.",
        "list item -- list"
    );

    add_native_word!(
        interpreter,
        "listcre",
        word_list_create,
        "Create a list from the items above the '[] marker.",
        "\"[]\" x1 ... xn -- list"
    );

    add_native_word!(
        interpreter,
        "listexp",
        word_list_expand,
        "Push every item of a list.",
        "list -- x1 ... xn"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::interpreter::{rpforth_interpreter::RpforthInterpreter, InterpreterStack};

    #[test]
    fn list_create_stops_at_marker() {
        let mut interpreter = RpforthInterpreter::new();

        interpreter.push(Value::Int(0));
        interpreter.push(Value::Str(LIST_MARKER.into()));
        interpreter.push(Value::Int(1));
        interpreter.push(Value::Str("two".into()));

        word_list_create(&mut interpreter).unwrap();

        assert_eq!(
            interpreter.stack(),
            &vec![
                Value::Int(0),
                Value::List(vec![Value::Int(1), Value::Str("two".into())])
            ]
        );
    }

    #[test]
    fn conversions() {
        assert_eq!(to_int(&Value::Str(" 42 ".into())), Ok(Value::Int(42)));
        assert_eq!(to_int(&Value::Float(-2.7)), Ok(Value::Int(-2)));
        assert!(to_int(&Value::Str("x".into())).is_err());
        assert_eq!(to_float(&Value::Int(3)), Ok(Value::Float(3.0)));
    }

    #[test]
    fn append_needs_a_list() {
        let mut interpreter = RpforthInterpreter::new();

        interpreter.push(Value::Int(1));
        interpreter.push(Value::Int(2));

        assert!(word_append(&mut interpreter).is_err());
        assert_eq!(interpreter.stack().len(), 2);
    }
}
