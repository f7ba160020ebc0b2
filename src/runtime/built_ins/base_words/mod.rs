/// Words that manipulate the data and user stacks.
mod stack_words;

mod simple_arithmetic_words;

/// Words that work with math, logic, bit manipulation and Value equality.
mod math_logic_and_bit_words;

/// The I, J and K index registers.
mod register_words;

/// Words that redirect execution to an index: `execidx`, `choose`, the three-way selectors and
/// the register loops.
mod control_words;

/// Assignment to variables.
mod variable_words;

/// Words that work with Value types.
mod value_type_words;

/// Words that work with definitions.
mod word_words;

use crate::runtime::{
    built_ins::base_words::{
        control_words::register_control_words,
        math_logic_and_bit_words::register_math_logic_and_bit_words,
        register_words::register_register_words,
        simple_arithmetic_words::register_simple_arithmetic_words,
        stack_words::register_stack_words, value_type_words::register_value_type_words,
        variable_words::register_variable_words, word_words::register_word_words,
    },
    interpreter::Interpreter,
};

/// Called to register all of the core words of the language.
pub fn register_base_words(interpreter: &mut dyn Interpreter) {
    register_stack_words(interpreter);
    register_simple_arithmetic_words(interpreter);
    register_math_logic_and_bit_words(interpreter);
    register_register_words(interpreter);
    register_control_words(interpreter);
    register_variable_words(interpreter);
    register_value_type_words(interpreter);
    register_word_words(interpreter);
}
