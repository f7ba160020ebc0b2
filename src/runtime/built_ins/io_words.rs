use crate::{
    add_native_word,
    lang::compilation::compiler_words,
    runtime::{
        data_structures::value::Value,
        error::{self, script_error},
        interpreter::{abort::return_entry, Interpreter, Signal},
        persistence::{load_image, save_image},
    },
};

/// Most stack items `pds` and `pus` show.
const STACK_PRINT_LIMIT: usize = 10;

/// Render a stack the way `pds` and `pus` show it: a count, then the top items as a list.
fn stack_lines(label: &str, items: &[Value]) -> Vec<String> {
    if items.is_empty() {
        return vec![format!(" {} stack empty", label)];
    }

    let mut lines = vec![format!(" {} stack items: {}", label, items.len())];
    let shown = &items[items.len().saturating_sub(STACK_PRINT_LIMIT)..];

    if items.len() > STACK_PRINT_LIMIT {
        lines.push(format!(
            " Top {} {} stack items:",
            STACK_PRINT_LIMIT,
            label.to_lowercase()
        ));
    }

    lines.push(Value::List(shown.to_vec()).repr());
    lines
}

fn write_lines(interpreter: &mut dyn Interpreter, lines: Vec<String>) -> error::Result<()> {
    for line in lines {
        interpreter.write_line(&line)?;
    }

    Ok(())
}

/// Print the data stack.
///
/// Signature: ` -- `
pub fn word_print_data_stack(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let lines = stack_lines("Data", interpreter.stack());
    write_lines(interpreter, lines)
}

/// Print the user stack.
///
/// Signature: ` -- `
fn word_print_user_stack(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let lines = stack_lines("User", interpreter.aux_stack());
    write_lines(interpreter, lines)
}

/// Print the return stack, most recent entry first.
///
/// Signature: ` -- `
fn word_print_return_stack(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let entries: Vec<usize> = interpreter.return_stack().to_vec();

    if entries.is_empty() {
        return interpreter.write_line(" Return stack empty");
    }

    let mut lines = vec![format!(" Return stack items: {}", entries.len())];

    for (depth, &index) in entries.iter().enumerate().rev() {
        lines.push(format!("{} {}", depth + 1, return_entry(interpreter, index)));
    }

    write_lines(interpreter, lines)
}

fn word_stack_print_on(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.set_stack_print(true);
    Ok(())
}

fn word_stack_print_off(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.set_stack_print(false);
    Ok(())
}

/// Pop a value and print it, strings without their quotes.
///
/// Signature: `item -- `
fn word_print(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    if interpreter.stack().is_empty() {
        return script_error("Missing argument for print".to_string());
    }

    let item = interpreter.pop()?;
    interpreter.write_line(&item.to_string())
}

fn word_print_newline(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    interpreter.write_line("")
}

/// List the words the compiler handles itself.
///
/// Signature: ` -- `
fn word_print_compiler_words(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let mut lines = vec!["             ===Compiler words===".to_string()];

    lines.extend(
        compiler_words()
            .iter()
            .map(|word| format!("  {:<8} {}", word.name, word.description)),
    );

    lines.push(String::new());
    lines.push(format!(" Compiler Definitions: {}", compiler_words().len()));

    write_lines(interpreter, lines)
}

/// List the primitive dictionary.
///
/// Signature: ` -- `
fn word_print_kernel_words(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let text = interpreter.dictionary().to_string();
    interpreter.write_line(&text)
}

/// Peek the image name so a failed save or load leaves it on the stack.
fn peek_image_name(interpreter: &dyn Interpreter, word: &str) -> error::Result<String> {
    if interpreter.stack().is_empty() {
        return script_error(format!("Missing argument for \"{}\"", word));
    }

    match interpreter.peek(0)? {
        Value::Str(name) => Ok(name.clone()),
        _ => script_error("Filename must be of type string".to_string()),
    }
}

fn save_to(interpreter: &mut dyn Interpreter, name: &str) -> error::Result<bool> {
    if interpreter.directory().is_empty() {
        interpreter.write_line("No definitions to save")?;
        return Ok(false);
    }

    let count = match save_image(interpreter, name) {
        Ok(count) => count,
        Err(error) => return script_error(error.to_string()),
    };

    let path = interpreter.config().image_path(name);

    interpreter.write_line(&format!("Saved: {} definitions to {}", count, path.display()))?;
    Ok(true)
}

/// Save the closed definitions to the named image.
///
/// Signature: `name -- `
fn word_save(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let name = peek_image_name(interpreter, "save")?;

    if save_to(interpreter, &name)? {
        let _ = interpreter.pop()?;
    }

    Ok(())
}

/// Save to the autosave image.
///
/// Signature: ` -- `
fn word_save_default(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let name = interpreter.config().autosave_name.clone();

    let _ = save_to(interpreter, &name)?;
    Ok(())
}

/// Replace the whole program with the named image.  The running code is replaced with it, so
/// execution stops here.
///
/// Signature: `name -- `
fn word_load(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let name = peek_image_name(interpreter, "load")?;

    let names = match load_image(interpreter, &name) {
        Ok(names) => names,
        Err(error) => return script_error(error.to_string()),
    };

    let _ = interpreter.pop()?;

    let mut lines = vec!["  Definitions loaded:".to_string()];

    lines.extend(
        names
            .iter()
            .enumerate()
            .map(|(index, name)| format!("    {} {}", index, name)),
    );

    write_lines(interpreter, lines)?;

    interpreter.signal(Signal::Restart);
    Ok(())
}

/// End the session, reporting how many definitions were left unsaved.
///
/// Signature: ` -- `
fn word_quit(interpreter: &mut dyn Interpreter) -> error::Result<()> {
    let total = interpreter.directory().len();
    let saved = interpreter.saved_definitions();

    let line = if total == 0 {
        "rpforth ended; no definitions to save".to_string()
    } else if saved == total {
        format!("rpforth ended; last saved: {} definitions", saved)
    } else {
        format!("rpforth ended; {} definitions not saved", total.saturating_sub(saved))
    };

    interpreter.write_line(&line)?;
    interpreter.signal(Signal::Quit);

    Ok(())
}

/// Register the console and image words.
pub fn register_io_words(interpreter: &mut dyn Interpreter) {
    add_native_word!(
        interpreter,
        "pds",
        word_print_data_stack,
        "Print the data stack.",
        " -- "
    );

    add_native_word!(
        interpreter,
        "pus",
        word_print_user_stack,
        "Print the user stack.",
        " -- "
    );

    add_native_word!(
        interpreter,
        "prs",
        word_print_return_stack,
        "Print the return stack.",
        " -- "
    );

    add_native_word!(
        interpreter,
        "pdson",
        word_stack_print_on,
        "Print the data stack after each executed line.",
        " -- "
    );

    add_native_word!(
        interpreter,
        "pdsoff",
        word_stack_print_off,
        "Stop printing the data stack after each executed line.",
        " -- "
    );

    add_native_word!(interpreter, "print", word_print, "Print item.", "item -- ");

    add_native_word!(interpreter, "printnl", word_print_newline, "Print a newline.", " -- ");

    add_native_word!(
        interpreter,
        "pcomp",
        word_print_compiler_words,
        "Print the compiler words.",
        " -- "
    );

    add_native_word!(
        interpreter,
        "pkern",
        word_print_kernel_words,
        "Print the primitive words.",
        " -- "
    );

    add_native_word!(
        interpreter,
        "save",
        word_save,
        "Save the definitions to an image file.",
        "name -- "
    );

    add_native_word!(
        interpreter,
        "s.",
        word_save_default,
        "Save the definitions to the autosave image.",
        " -- "
    );

    add_native_word!(
        interpreter,
        "load",
        word_load,
        "Replace all definitions with those of an image file.",
        "name -- "
    );

    add_native_word!(interpreter, "quit", word_quit, "End the session.", " -- ");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::interpreter::{
        rpforth_interpreter::{CapturedOutput, RpforthInterpreter},
        InterpreterStack,
    };

    #[test]
    fn long_stacks_show_the_top_ten() {
        let items: Vec<Value> = (0..12).map(Value::Int).collect();
        let lines = stack_lines("Data", &items);

        assert_eq!(lines[0], " Data stack items: 12");
        assert_eq!(lines[1], " Top 10 data stack items:");
        assert_eq!(lines[2], "[2, 3, 4, 5, 6, 7, 8, 9, 10, 11]");
    }

    #[test]
    fn empty_stack_is_reported() {
        let output = CapturedOutput::new();
        let mut interpreter = RpforthInterpreter::new().with_output(Box::new(output.clone()));

        word_print_data_stack(&mut interpreter).unwrap();
        word_print_user_stack(&mut interpreter).unwrap();

        assert_eq!(output.contents(), " Data stack empty\n User stack empty\n");
    }

    #[test]
    fn print_shows_strings_bare() {
        let output = CapturedOutput::new();
        let mut interpreter = RpforthInterpreter::new().with_output(Box::new(output.clone()));

        interpreter.push(Value::Str("hello".into()));
        word_print(&mut interpreter).unwrap();

        assert!(interpreter.stack().is_empty());
        assert_eq!(output.contents(), "hello\n");
    }

    #[test]
    fn save_without_definitions_keeps_the_name() {
        let output = CapturedOutput::new();
        let mut interpreter = RpforthInterpreter::new().with_output(Box::new(output.clone()));

        interpreter.push(Value::Str("nothing".into()));
        word_save(&mut interpreter).unwrap();

        assert_eq!(interpreter.stack().len(), 1);
        assert_eq!(output.contents(), "No definitions to save\n");
    }

    #[test]
    fn quit_signals_and_reports() {
        let output = CapturedOutput::new();
        let mut interpreter = RpforthInterpreter::new().with_output(Box::new(output.clone()));

        word_quit(&mut interpreter).unwrap();

        assert_eq!(output.contents(), "rpforth ended; no definitions to save\n");
    }
}
