use crate::{
    lang::{
        code::ProgramStore, compilation::CompilerState, literal::LiteralParser,
        source_buffer::SourceLocation,
    },
    runtime::{
        config::Config,
        data_structures::{dictionary::Dictionary, directory::Directory, value::Value},
        error,
    },
};
use std::{
    fmt::{self, Display, Formatter},
    io::Write,
    rc::Rc,
};

pub mod abort;
pub mod rpforth_interpreter;

/// The data and auxiliary stacks of values managed by the interpreter.
pub type ValueStack = Vec<Value>;

/// The three index registers used for loop counts and slice bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexRegister {
    I,
    J,
    K,
}

impl IndexRegister {
    /// Position of the register in the register file.
    pub fn slot(&self) -> usize {
        match self {
            IndexRegister::I => 0,
            IndexRegister::J => 1,
            IndexRegister::K => 2,
        }
    }
}

impl Display for IndexRegister {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            IndexRegister::I => write!(f, "i"),
            IndexRegister::J => write!(f, "j"),
            IndexRegister::K => write!(f, "k"),
        }
    }
}

/// Requests a primitive can leave for the dispatch loop.  The loop stops the current unit as soon
/// as the primitive returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// The program store changed under the running unit (`load`, `dellast`).  Go back to the
    /// prompt.
    Restart,

    /// End the session.
    Quit,
}

/// Trait for managing the interpreter's data and auxiliary stacks.  Intended to be called by the
/// primitive words.
///
/// Every pop checks before it removes anything, so a failing word leaves the stack untouched.
pub trait InterpreterStack {
    /// Use to examine the full data stack when required, for example by `pds`.
    fn stack(&self) -> &ValueStack;

    /// Push a value onto the data stack.
    fn push(&mut self, value: Value);

    /// Pop a value from the data stack.  If the stack is empty an underflow abort is returned.
    fn pop(&mut self) -> error::Result<Value>;

    /// Make sure the data stack holds at least `count` values.  Words that consume several values
    /// call this first so an underflow never leaves the stack half consumed.
    fn require(&self, count: usize, word: &str) -> error::Result<()>;

    /// Look at a value without removing it, depth 0 being the top of the stack.
    fn peek(&self, depth: usize) -> error::Result<&Value>;

    /// Pop the top value as an integer.  Nothing is removed if it is not one.
    fn pop_as_int(&mut self) -> error::Result<i64>;

    /// Pop the top value as a non-negative integer.  Nothing is removed if it is not one.
    fn pop_as_usize(&mut self) -> error::Result<usize>;

    /// Pop the top value as a string.  Nothing is removed if it is not one.
    fn pop_as_string(&mut self) -> error::Result<String>;

    /// Empty the data stack.
    fn clear_stack(&mut self);

    /// The auxiliary scratch stack.
    fn aux_stack(&self) -> &ValueStack;

    fn aux_push(&mut self, value: Value);

    fn aux_pop(&mut self) -> error::Result<Value>;

    fn clear_aux_stack(&mut self);
}

/// Trait for the scalar registers: the condition flag and the three index registers.
pub trait Registers {
    /// The condition flag, set by comparisons and read by `if` and `ifz`.
    fn flag(&self) -> bool;

    fn set_flag(&mut self, value: bool);

    fn register(&self, register: IndexRegister) -> i64;

    fn set_register(&mut self, register: IndexRegister, value: i64);
}

/// Trait for reaching the program store, the compiler state and the dispatch engine.
pub trait CodeManagement {
    /// The program store.
    fn store(&self) -> &ProgramStore;

    /// The program store as mutable, for assignment words and definition management.
    fn store_mut(&mut self) -> &mut ProgramStore;

    /// The compiler's cycle state.
    fn compiler(&self) -> &CompilerState;

    fn compiler_mut(&mut self) -> &mut CompilerState;

    /// The parser used for tokens nothing else claimed.
    fn literal_parser(&self) -> &dyn LiteralParser;

    /// Index of the cell being executed.
    fn instruction_pointer(&self) -> usize;

    /// Saved return indices, most recent last.
    fn return_stack(&self) -> &[usize];

    /// Continue at the index once the current primitive returns, saving the index of the next
    /// cell on the return stack as a call would.
    fn redirect(&mut self, index: usize) -> error::Result<()>;

    /// Run the word at the index to completion before returning.
    fn execute_nested(&mut self, index: usize) -> error::Result<()>;

    /// Ask the dispatch loop to stop once the current primitive returns.
    fn signal(&mut self, signal: Signal);

    /// Replace the whole program: store, directory and the closed-definition boundary.
    fn replace_program(&mut self, store: ProgramStore, directory: Directory, boundary: usize);
}

/// Definition of a word handler function.  This is the function that is called when a primitive
/// is to be executed.  Can be a lambda, a callable object or a Rust function.
pub type WordHandler = dyn Fn(&mut dyn Interpreter) -> error::Result<()>;

/// Information about a word handler.  Once created its fields are read-only and accessed by member
/// methods.
#[derive(Clone)]
pub struct WordHandlerInfo {
    name: String,
    location: SourceLocation,
    handler: Rc<WordHandler>,
}

impl WordHandlerInfo {
    /// Create a new WordHandlerInfo instance.
    pub fn new(name: String, location: SourceLocation, handler: Rc<WordHandler>) -> WordHandlerInfo {
        WordHandlerInfo {
            name,
            location,
            handler,
        }
    }

    /// The name of the word itself.
    pub fn name(&self) -> &String {
        &self.name
    }

    /// Where in the Rust source the word was registered.
    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    /// The handler function for the word.
    pub fn handler(&self) -> Rc<WordHandler> {
        self.handler.clone()
    }
}

/// Simplify registering a native word with the interpreter.
///
/// Required parameters are, the interpreter instance to register with.  The name of the word to
/// register.  The word function handler to execute for the word.  A simple description of the word.
/// As well as the word's stack signature.
#[macro_export]
macro_rules! add_native_word {
    (
        $interpreter:expr ,
        $name:expr ,
        $function:expr ,
        $description:expr ,
        $signature:expr
    ) => {{
        use std::rc::Rc;

        // Register the word while recording where in the source code the word was registered
        // from.
        $interpreter.add_word(
            file!(),
            line!() as usize,
            column!() as usize,
            $name,
            Rc::new($function),
            $description,
            $signature,
        );
    }};
}

/// Trait for the primitive dictionary and the composite-word directory.
pub trait WordManagement {
    /// Add a new primitive to the dictionary.
    #[allow(clippy::too_many_arguments)]
    fn add_word(
        &mut self,
        file: &str,
        line: usize,
        column: usize,
        name: &str,
        handler: Rc<WordHandler>,
        description: &str,
        signature: &str,
    );

    /// The primitive dictionary.
    fn dictionary(&self) -> &Dictionary;

    /// Get a primitive's handler from its handler index.
    fn word_handler_info(&self, index: usize) -> Option<&WordHandlerInfo>;

    /// The composite-word directory.
    fn directory(&self) -> &Directory;

    fn directory_mut(&mut self) -> &mut Directory;
}

/// The full interpreter as seen by the primitive words.
pub trait Interpreter: InterpreterStack + Registers + CodeManagement + WordManagement {
    /// Where console output goes.
    fn output(&mut self) -> &mut dyn Write;

    /// The start up configuration.
    fn config(&self) -> &Config;

    /// Is the data stack printed after each executed line?
    fn stack_print(&self) -> bool;

    fn set_stack_print(&mut self, enabled: bool);

    /// How many definitions the directory held when it was last saved or loaded.
    fn saved_definitions(&self) -> usize;

    fn set_saved_definitions(&mut self, count: usize);

    /// Write a line of console output.
    fn write_line(&mut self, text: &str) -> error::Result<()> {
        writeln!(self.output(), "{}", text)?;
        Ok(())
    }
}
