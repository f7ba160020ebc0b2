//! An incrementally compiled, threaded-code stack machine.
//!
//! Source lines are tokenized and compiled straight into a single growing program store.  The
//! store doubles as the definition database: composite words are spans of cells starting at a
//! directory-recorded index, and top-level input is compiled into a volatile region that is
//! executed once and then retracted the next time a definition header is compiled.

/// Module for managing source input, tokens, and the cells of the program store.
#[macro_use]
pub mod lang;

/// Module for the runtime: values, stacks, the dispatch engine, the definition manager and the
/// built-in primitive words.
#[macro_use]
pub mod runtime;
