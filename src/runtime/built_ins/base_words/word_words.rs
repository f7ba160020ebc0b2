use crate::{
    add_native_word,
    runtime::{
        data_structures::value::Value,
        definitions::{decompile, listing, propagate_redefinition, references, LISTING_LIMIT},
        error::{self, script_error},
        interpreter::{Interpreter, Signal},
    },
};
use tracing::info;

/// Read the definition name on top of the stack without removing it, so a failing word leaves
/// it in place.
fn peek_name(interpreter: &dyn Interpreter, word: &str) -> error::Result<String> {
    if interpreter.stack().is_empty() {
        return script_error(format!("Missing argument for \"{}\"", word));
    }

    match interpreter.peek(0)? {
        Value::Str(name) => Ok(name.clone()),
        _ => script_error(format!("Argument for \"{}\" must be a string", word)),
    }
}

/// Print a definition back as source, along with any older definitions of the same name still in
/// the store.  Primitives are described from the dictionary.
///
/// Signature: `name -- `
fn word_print_definition(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let name = peek_name(interpreter, "pdef")?;

    if let Some(info) = interpreter.dictionary().get(&name) {
        let line = format!(
            "Kernel primitive: {} ; ( {} ) {}",
            info.name, info.signature, info.description
        );

        let _ = interpreter.pop()?;
        return interpreter.write_line(&line);
    }

    let Some(entry) = interpreter.directory().get(&name).cloned() else {
        return script_error(format!("Name \"{}\" undefined", name));
    };

    let _ = interpreter.pop()?;

    let mut lines = vec![
        format!("  {:<10}  at index:  {} \"\" {} \"\"", name, entry.start, entry.doc),
        format!("  {}", decompile(interpreter, entry.start)),
    ];

    let older: Vec<usize> = interpreter
        .store()
        .headers_named(&name)
        .into_iter()
        .filter(|&header| header != entry.start)
        .collect();

    if older.is_empty() {
        lines.push("  No duplicate (older definitions) present".to_string());
    } else {
        lines.push(format!("  There are {} older definitions", older.len()));

        for (count, header) in older.iter().enumerate() {
            lines.push(format!("  Duplicate {} at index {}", count + 1, header));
            lines.push(format!("  {}", decompile(interpreter, *header)));
        }
    }

    for line in lines {
        interpreter.write_line(&line)?;
    }

    Ok(())
}

/// List every directory entry with its start index and documentation.
///
/// Signature: ` -- `
fn word_print_all_definitions(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let mut lines: Vec<String> = interpreter
        .directory()
        .iter()
        .map(|(name, entry)| {
            format!("  {:<10}  at index:  {} \"\" {} \"\"", name, entry.start, entry.doc)
        })
        .collect();

    lines.push(String::new());
    lines.push(format!(
        " High Level Dictionary Definitions: {}",
        interpreter.directory().len()
    ));

    for line in lines {
        interpreter.write_line(&line)?;
    }

    Ok(())
}

/// Print the raw cells of the program store from an index on.
///
/// Signature: `idx -- `
fn word_print_execution_list(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    if interpreter.stack().is_empty() {
        return script_error("Stack empty, missing start index".to_string());
    }

    let len = interpreter.store().len();

    let Some(start) = interpreter.peek(0)?.as_int() else {
        return script_error("Index to start printing must be an integer".to_string());
    };

    if start < 0 || start as usize >= len {
        return script_error(format!(
            "Index is negative or out of range 0:{}",
            len.saturating_sub(1)
        ));
    }

    let _ = interpreter.pop()?;

    let start = start as usize;
    let remaining = len - start;

    if remaining > LISTING_LIMIT {
        interpreter.write_line(&format!(
            "Printing max. {} entries; endlist-startindex is: {} entries",
            LISTING_LIMIT, remaining
        ))?;
    }

    for line in listing(interpreter, start) {
        interpreter.write_line(&line)?;
    }

    Ok(())
}

/// Push the names of the definitions that refer to the named word.
///
/// Signature: `name -- list`
fn word_reference_definitions(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let name = peek_name(interpreter, "refdef")?;

    let Some(found) = references(interpreter, &name) else {
        return script_error(format!("Definition \"{}\" not found", name));
    };

    let _ = interpreter.pop()?;
    interpreter.push(Value::List(found.into_iter().map(Value::Str).collect()));

    Ok(())
}

/// Relink every caller of an older definition of the name to the live one.
///
/// Signature: `name -- `
fn word_replace_definitions(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let name = peek_name(interpreter, "repdef")?;

    let Some(start) = interpreter.directory().start_of(&name) else {
        return script_error(format!("Name \"{}\" undefined", name));
    };

    let _ = interpreter.pop()?;

    let older = interpreter
        .store()
        .headers_named(&name)
        .into_iter()
        .filter(|&header| header < start)
        .count();

    if older == 0 {
        return interpreter.write_line("  No old definitions to replace");
    }

    interpreter.write_line(&format!("  Replacing {} older definitions", older))?;

    let replaced = propagate_redefinition(interpreter, &name).unwrap_or(0);

    interpreter.write_line(&format!("  Replaced in {} definitions", replaced))
}

/// Forget a name.  Its cells stay in the store and existing callers keep working.
///
/// Signature: `name -- `
fn word_delete_definition(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let name = peek_name(interpreter, "deldef")?;

    let Some(entry) = interpreter.directory_mut().remove(&name) else {
        return script_error(format!("Definition \"{}\" not found", name));
    };

    let _ = interpreter.pop()?;

    info!("definition {} at {} deleted", name, entry.start);
    interpreter.write_line(&format!("\"{}\" at index {} deleted", name, entry.start))
}

/// Forget the most recent definition and cut the store back to where it started.  The running
/// code is cut away with it, so execution stops here.
///
/// Signature: ` -- `
fn word_delete_last(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let Some((name, entry)) = interpreter.directory_mut().pop_newest() else {
        return interpreter.write_line("Directory empty, no definition to delete");
    };

    interpreter.store_mut().truncate(entry.start);

    let mut dropped = interpreter.directory_mut().retain_below(entry.start);
    dropped.push(name.clone());

    // A redefined name falls back to its newest header that survived the cut.
    for dropped_name in dropped {
        if let Some(&older) = interpreter.store().headers_named(&dropped_name).last() {
            info!("definition {} restored to {}", dropped_name, older);
            let _ = interpreter.directory_mut().define(&dropped_name, older);
        }
    }

    let boundary = interpreter.compiler().boundary().min(entry.start);
    interpreter.compiler_mut().set_boundary(boundary);

    info!("definition {} at {} deleted, store cut back", name, entry.start);
    interpreter.write_line(&format!("\"{}\" at index {} deleted", name, entry.start))?;

    interpreter.signal(Signal::Restart);
    Ok(())
}

/// Register the definition management words.
pub fn register_word_words(interpreter: &mut dyn Interpreter) {
    add_native_word!(
        interpreter,
        "pdef",
        word_print_definition,
        "Print a definition and any older definitions of the same name.",
        "name -- "
    );

    add_native_word!(
        interpreter,
        "pdefall",
        word_print_all_definitions,
        "Print all high level definitions.",
        " -- "
    );

    add_native_word!(
        interpreter,
        "pexlst",
        word_print_execution_list,
        "Print the execution list starting with index idx.",
        "idx -- "
    );

    add_native_word!(
        interpreter,
        "refdef",
        word_reference_definitions,
        "List the definitions referring to name.",
        "name -- list"
    );

    add_native_word!(
        interpreter,
        "repdef",
        word_replace_definitions,
        "Make older callers of name use its latest definition.",
        "name -- "
    );

    add_native_word!(
        interpreter,
        "deldef",
        word_delete_definition,
        "Delete name from the high level definitions.",
        "name -- "
    );

    add_native_word!(
        interpreter,
        "dellast",
        word_delete_last,
        "Delete the last definition and shorten the execution list.",
        " -- "
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lang::code::Op,
        runtime::interpreter::{
            rpforth_interpreter::{CapturedOutput, RpforthInterpreter},
            CodeManagement, InterpreterStack, WordManagement,
        },
    };

    fn two_words(output: &CapturedOutput) -> RpforthInterpreter {
        let mut interpreter = RpforthInterpreter::new().with_output(Box::new(output.clone()));

        for op in [
            Op::DefHeader("a".into()),
            Op::PushLiteral(Value::Int(1)),
            Op::Return,
            Op::DefHeader("b".into()),
            Op::Jump(0),
        ] {
            let _ = interpreter.store_mut().push(None, op);
        }

        let _ = interpreter.directory_mut().define("a", 0);
        let _ = interpreter.directory_mut().define("b", 3);
        interpreter.compiler_mut().set_boundary(5);

        interpreter
    }

    #[test]
    fn delete_last_cuts_the_store() {
        let output = CapturedOutput::new();
        let mut interpreter = two_words(&output);

        word_delete_last(&mut interpreter).unwrap();

        assert_eq!(interpreter.store().len(), 3);
        assert_eq!(interpreter.compiler().boundary(), 3);
        assert_eq!(interpreter.directory().start_of("b"), None);
        assert_eq!(output.contents(), "\"b\" at index 3 deleted\n");
    }

    #[test]
    fn delete_last_takes_the_highest_header() {
        let output = CapturedOutput::new();
        let mut interpreter = two_words(&output);

        for op in [
            Op::DefHeader("a".into()),
            Op::PushLiteral(Value::Int(3)),
            Op::Return,
        ] {
            let _ = interpreter.store_mut().push(None, op);
        }

        let _ = interpreter.directory_mut().define("a", 5);
        interpreter.compiler_mut().set_boundary(8);

        word_delete_last(&mut interpreter).unwrap();

        assert_eq!(output.contents(), "\"a\" at index 5 deleted\n");
        assert_eq!(interpreter.store().len(), 5);
        assert_eq!(interpreter.directory().start_of("a"), Some(0));
        assert_eq!(interpreter.directory().start_of("b"), Some(3));
    }

    #[test]
    fn delete_keeps_cells() {
        let output = CapturedOutput::new();
        let mut interpreter = two_words(&output);

        interpreter.push(Value::Str("a".into()));
        word_delete_definition(&mut interpreter).unwrap();

        assert_eq!(interpreter.store().len(), 5);
        assert_eq!(interpreter.directory().start_of("a"), None);

        interpreter.push(Value::Str("a".into()));
        assert!(word_delete_definition(&mut interpreter).is_err());
        assert_eq!(interpreter.stack().len(), 1);
    }

    #[test]
    fn reference_list_names_callers() {
        let output = CapturedOutput::new();
        let mut interpreter = two_words(&output);

        interpreter.push(Value::Str("a".into()));
        word_reference_definitions(&mut interpreter).unwrap();

        assert_eq!(
            interpreter.stack(),
            &vec![Value::List(vec![Value::Str("b".into())])]
        );
    }

    #[test]
    fn print_definition_decompiles() {
        let output = CapturedOutput::new();
        let mut interpreter = two_words(&output);

        interpreter.push(Value::Str("b".into()));
        word_print_definition(&mut interpreter).unwrap();

        let text = output.contents();

        assert!(text.contains("  b: a ;"));
        assert!(text.contains("No duplicate (older definitions) present"));
    }
}
