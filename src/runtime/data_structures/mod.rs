/// Module contains the Value enumeration and its implementation.  Every item on the stacks and
/// every literal in the program store is a Value.
pub mod value;

/// The arithmetic shared by the math and assignment words.
pub mod arithmetic;

/// The primitive dictionary, the fixed table of native words.
pub mod dictionary;

/// The composite-word directory, mapping names to the start of their definitions.
pub mod directory;
