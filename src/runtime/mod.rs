/// All of the core data structures used by the interpreter.
pub mod data_structures;

/// Module for defining the built-in native words that are available to the interpreter.
pub mod built_ins;

/// Module for defining the error reporting of the interpreter.
pub mod error;

/// Module for defining the core functionality of the interpreter: the traits words use to reach
/// the machine state, the dispatch engine and the abort diagnostics.
#[macro_use]
pub mod interpreter;

/// Decompiling, reference discovery and redefinition propagation over the program store.
pub mod definitions;

/// Saving and loading program images.
pub mod persistence;

/// Start up configuration.
pub mod config;

/// The top-level read, compile and execute loop.
pub mod repl;
