use std::process::{ ExitCode, Termination };
use thiserror::Error;
use crate::lang::source_buffer::SourceLocation;



pub type Result<T> = std::result::Result<T, ScriptError>;



/// Render an optional location as a message prefix.
fn at(location: &Option<SourceLocation>) -> String
{
    match location
    {
        Some(location) => format!("{}: ", location),
        None => String::new()
    }
}



/// Everything that can go wrong while compiling or running code.  The variants follow the three
/// ways the top-level loop reacts: compile errors drop the rest of the line, aborts unwind to the
/// prompt, fatal errors end the session.
#[derive(Debug, Error)]
pub enum ScriptError
{
    /// Undefined word, misplaced header, unmatched `then`, unterminated string and the like.
    /// Cells compiled before the error stay in the store.
    #[error("{}Compile error: {message}", at(.location))]
    Compile
    {
        location: Option<SourceLocation>,
        message: String
    },

    /// A compilation unit ended with branches still waiting for their `then`.  The whole cycle is
    /// rolled back.
    #[error("{}Compile error: unresolved branch, \"if/ifz/ifneq\" without closing \"then\"",
            at(.location))]
    UnresolvedBranch
    {
        location: Option<SourceLocation>
    },

    /// A run-time failure: stack underflow, a primitive rejecting its arguments, or a user abort.
    /// The data and auxiliary stacks are left as they are.
    #[error("{message}")]
    Abort
    {
        message: String
    },

    /// The instruction pointer left the program store.  Nothing sensible can continue.
    #[error("Fatal error at execution list index {ip}: {message}")]
    Fatal
    {
        ip: usize,
        message: String
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] serde_json::Error)
}


/// When returned from main, convert the error result to an operating system exit code.
impl Termination for ScriptError
{
    /// Because this type represents an error, the exit code is always FAILURE.
    fn report(self) -> ExitCode
    {
        eprintln!("Error: {}", self);
        ExitCode::FAILURE
    }
}


impl ScriptError
{
    /// Is this an error the top-level loop recovers from by unwinding to the prompt?
    pub fn is_recoverable(&self) -> bool
    {
        !matches!(self, ScriptError::Fatal { .. })
    }
}



/// Create an abort and wrap it in a Result::Err.
pub fn script_error<T>(message: String) -> Result<T>
{
    Err(ScriptError::Abort { message })
}



pub fn script_error_str<T>(message: &str) -> Result<T>
{
    script_error(message.to_string())
}



/// Create a compile error for the given location and wrap it in a Result::Err.
pub fn compile_error<T>(location: &SourceLocation, message: String) -> Result<T>
{
    Err(ScriptError::Compile { location: Some(location.clone()), message })
}
