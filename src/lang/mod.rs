/// Module for managing a line of source input and the cursor within it.
pub mod source_buffer;

/// Module for pulling whitespace delimited tokens and delimited text out of a source buffer.
pub mod tokenizing;

/// Module defining the cells of the program store and the operations they carry.
pub mod code;

/// Module for the pluggable literal parser used as the last resort of word resolution.
pub mod literal;

/// Module for compiling tokens into cells.  Compiler words run as they are found, the rest of the
/// tokens are resolved against the definition directory, the primitive dictionary and finally the
/// literal parser.
pub mod compilation;
