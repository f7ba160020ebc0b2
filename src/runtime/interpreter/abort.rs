use crate::{
    lang::code::Op,
    runtime::{data_structures::value::Value, interpreter::Interpreter},
};
use std::fmt::{self, Display, Formatter};

/// Where the aborted cell sits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbortContext {
    /// Inside the definition whose header is at the index.
    InDefinition { name: String, index: usize },

    /// Walking back hit a return or jump before any header: top-level code, or a definition with
    /// more than one exit.
    ExecutionString,
}

/// Everything shown to the user when execution aborts.  Built from the machine state before the
/// return stack is cleared.
#[derive(Clone, Debug, PartialEq)]
pub struct AbortReport {
    /// The aborted cell rendered as the word that compiled it.
    pub word: String,

    pub message: String,

    /// Index of the aborted cell.
    pub ip: usize,

    pub context: AbortContext,

    /// Top of stack and next on stack, as `(type, repr)`.
    pub tos: Option<(String, String)>,
    pub nos: Option<(String, String)>,

    /// The return stack rendered, most recent first.
    pub return_trace: Vec<String>,
}

fn describe(value: &Value) -> (String, String) {
    (value.type_name().to_string(), value.repr())
}

/// Name of the word a cell was compiled from.
fn cell_word(interpreter: &dyn Interpreter, index: usize) -> String {
    let Some(cell) = interpreter.store().get(index) else {
        return format!("@{}", index);
    };

    match &cell.op {
        Op::DefHeader(name) => format!("{}:", name),
        Op::Call(target) | Op::Jump(target) | Op::PushIndex(target) => interpreter
            .store()
            .header_name(*target)
            .map(str::to_string)
            .unwrap_or_else(|| format!("@{}", target)),
        Op::Return => ";".to_string(),
        Op::PushLiteral(value) => value.repr(),
        Op::BranchIfFlag(_) => "if".to_string(),
        Op::BranchIfNotFlag(_) => "ifz".to_string(),
        Op::BranchIfUnequal(_) => "ifneq".to_string(),
        Op::Primitive(handler) => interpreter
            .word_handler_info(*handler)
            .map(|info| info.name().clone())
            .unwrap_or_else(|| format!("primitive {}", handler)),
        Op::BranchTarget => "then".to_string(),
        Op::ReturnToLoop => "end of input".to_string(),
    }
}

/// Walk back from the aborted cell to find what it belongs to.
fn find_context(interpreter: &dyn Interpreter, ip: usize) -> AbortContext {
    let store = interpreter.store();
    let start = ip.min(store.len().saturating_sub(1));

    for index in (0..=start).rev() {
        let Some(cell) = store.get(index) else {
            break;
        };

        match &cell.op {
            Op::DefHeader(name) => {
                return AbortContext::InDefinition {
                    name: name.clone(),
                    index,
                };
            }
            op if op.is_exit() && index < ip => return AbortContext::ExecutionString,
            _ => {}
        }
    }

    AbortContext::ExecutionString
}

/// Describe a saved return index: the word the matching call went to, or the bare index.
pub fn return_entry(interpreter: &dyn Interpreter, index: usize) -> String {
    let callee = index
        .checked_sub(1)
        .and_then(|call| interpreter.store().get(call))
        .and_then(|cell| match cell.op {
            Op::Call(target) => interpreter.store().header_name(target),
            _ => None,
        });

    match callee {
        Some(name) => format!("return from: {}", name),
        None => format!("return at: {}", index),
    }
}

impl AbortReport {
    /// Capture the diagnostics for an abort at the current instruction pointer.
    pub fn capture(interpreter: &dyn Interpreter, message: &str) -> AbortReport {
        let ip = interpreter.instruction_pointer();
        let stack = interpreter.stack();

        AbortReport {
            word: cell_word(interpreter, ip),
            message: message.to_string(),
            ip,
            context: find_context(interpreter, ip),
            tos: stack.last().map(describe),
            nos: stack.len().checked_sub(2).map(|index| describe(&stack[index])),
            return_trace: interpreter
                .return_stack()
                .iter()
                .rev()
                .map(|&index| return_entry(interpreter, index))
                .collect(),
        }
    }
}

impl Display for AbortReport {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "\"{}\" aborted: {}", self.word, self.message)?;
        writeln!(f, " Aborted at Execution List Index: {}", self.ip)?;

        match &self.context {
            AbortContext::InDefinition { name, index } => {
                writeln!(f, " In definition: \"{}\" at index: {}", name, index)?
            }
            AbortContext::ExecutionString => writeln!(
                f,
                " Aborted in execution string or in definition with multiple returns"
            )?,
        }

        match (&self.tos, &self.nos) {
            (Some((tos_type, tos)), nos) => {
                writeln!(f, "  TOS: <{}> {}", tos_type, tos)?;

                if let Some((nos_type, nos)) = nos {
                    writeln!(f, "  NOS: <{}> {}", nos_type, nos)?;
                }
            }
            (None, _) => writeln!(f, " Stack empty, cannot print TOS & NOS")?,
        }

        if !self.return_trace.is_empty() {
            writeln!(f, " Return stack items: {}", self.return_trace.len())?;

            for (depth, entry) in self.return_trace.iter().enumerate() {
                writeln!(f, " {} {}", self.return_trace.len() - depth, entry)?;
            }
        }

        Ok(())
    }
}
