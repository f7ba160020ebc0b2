/// The core words of the language.
pub mod base_words;

/// Words that print to the console, save and load images and end the session.
pub mod io_words;

use crate::runtime::interpreter::Interpreter;

/// Register every primitive word with the interpreter.
pub fn register_builtin_words(interpreter: &mut dyn Interpreter) {
    base_words::register_base_words(interpreter);
    io_words::register_io_words(interpreter);
}
