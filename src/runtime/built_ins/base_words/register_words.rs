use crate::{
    add_native_word,
    runtime::{
        data_structures::value::ToValue,
        error,
        interpreter::{IndexRegister, Interpreter},
    },
};

/// Register `i= i i++ i--` and the same for `j` and `k`.
pub fn register_register_words(interpreter: &mut dyn Interpreter) {
    for register in [IndexRegister::I, IndexRegister::J, IndexRegister::K] {
        add_native_word!(
            interpreter,
            &format!("{}=", register),
            move |interpreter: &mut dyn Interpreter| -> error::Result<()> {
                let value = interpreter.pop_as_int()?;

                interpreter.set_register(register, value);
                Ok(())
            },
            &format!("Pop TOS into register {}.", register),
            "n -- "
        );

        add_native_word!(
            interpreter,
            &register.to_string(),
            move |interpreter: &mut dyn Interpreter| -> error::Result<()> {
                interpreter.push(interpreter.register(register).to_value());
                Ok(())
            },
            &format!("Push register {}.", register),
            " -- n"
        );

        add_native_word!(
            interpreter,
            &format!("{}++", register),
            move |interpreter: &mut dyn Interpreter| -> error::Result<()> {
                let value = interpreter.register(register).wrapping_add(1);

                interpreter.set_register(register, value);
                Ok(())
            },
            &format!("Add 1 to register {}.", register),
            " -- "
        );

        add_native_word!(
            interpreter,
            &format!("{}--", register),
            move |interpreter: &mut dyn Interpreter| -> error::Result<()> {
                let value = interpreter.register(register).wrapping_sub(1);

                interpreter.set_register(register, value);
                Ok(())
            },
            &format!("Subtract 1 from register {}.", register),
            " -- "
        );
    }
}
