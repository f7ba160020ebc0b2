use crate::{
    lang::{
        code::Op,
        source_buffer::{LineReader, SourceBuffer, SourceLocation},
        tokenizing::{next_token, skip_separator, take_delimited, take_multi_line, translate_escapes,
                     Token},
    },
    runtime::{
        data_structures::{directory::DefinitionEntry, value::Value},
        error::{self, compile_error, ScriptError},
        interpreter::Interpreter,
    },
};
use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// What the compiler loop does after a token has been handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Carry on with the next token of the line.
    Continue,

    /// Abandon the rest of the physical line.
    StopLine,

    /// The end-of-input marker was seen, the unit is ready to run.
    Ready,
}

/// What the outer loop should do with the unit compiled in this cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Run the volatile unit starting at the index.
    Execute(usize),

    /// A definition was compiled, nothing runs.
    Defined,

    /// Nothing was compiled.
    Empty,
}

/// Enough to put a cycle back the way it found things.
#[derive(Clone, Debug, Default)]
struct CycleUndo {
    /// Store length to truncate back to.  Shrinks when a header retracts the volatile region.
    store_len: usize,

    /// Boundary at the start of the cycle.
    boundary: usize,

    /// Directory entries replaced or removed during the cycle, oldest first.
    directory: Vec<(String, Option<DefinitionEntry>)>,
}

/// The compiler's per-cycle state.  A cycle runs from one prompt outside a definition to the next
/// end-of-input marker and may span any number of lines.
#[derive(Clone, Debug, Default)]
pub struct CompilerState {
    /// Indices of branch cells still waiting for their `then`, innermost last.
    pending_branches: Vec<usize>,

    /// A header was compiled this cycle.
    in_definition: bool,

    /// Name of the definition being compiled, the target of `""` documentation.
    current_definition: Option<String>,

    /// Where the volatile unit of this cycle starts.
    unit_start: usize,

    /// Index just past the last closed return or jump.  Everything before it belongs to closed
    /// definitions, everything after it is volatile.
    boundary: usize,

    /// The end-of-input marker has been compiled.
    ready: bool,

    undo: CycleUndo,
}

impl CompilerState {
    pub fn new() -> CompilerState {
        CompilerState::default()
    }

    pub fn pending_branches(&self) -> &[usize] {
        &self.pending_branches
    }

    pub fn in_definition(&self) -> bool {
        self.in_definition
    }

    pub fn current_definition(&self) -> Option<&str> {
        self.current_definition.as_deref()
    }

    pub fn unit_start(&self) -> usize {
        self.unit_start
    }

    pub fn boundary(&self) -> usize {
        self.boundary
    }

    /// Move the closed-definition boundary, used when the store is replaced or cut back by the
    /// definition management words.
    pub fn set_boundary(&mut self, boundary: usize) {
        self.boundary = boundary;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }
}

type CompilerAction =
    fn(&mut dyn Interpreter, &mut SourceBuffer, &mut dyn LineReader, &Token) -> error::Result<Flow>;

/// A word that runs while compiling instead of being compiled.
pub struct CompilerWord {
    pub name: &'static str,
    pub description: &'static str,
    action: CompilerAction,
}

static COMPILER_WORD_TABLE: &[CompilerWord] = &[
    CompilerWord {
        name: "#",
        description: "( -- ) comment, skip rest of line",
        action: comp_comment,
    },
    CompilerWord {
        name: ".",
        description: "( -- ) mark end of compile phase, start execution phase",
        action: comp_end_of_input,
    },
    CompilerWord {
        name: "\"\"",
        description: "( -- ) mark start of docstring to embed in definition",
        action: comp_doc_string,
    },
    CompilerWord {
        name: "\"\"\"",
        description: "( -- ) mark start of multiline string",
        action: comp_multi_line_string,
    },
    CompilerWord {
        name: "\"",
        description: "( -- ) mark start of string with blanks and without double quotes",
        action: comp_string,
    },
    CompilerWord {
        name: "->",
        description: "( -- ) mark start of string with blanks/quotes of all sort",
        action: comp_raw_string,
    },
    CompilerWord {
        name: ";",
        description: "( -- ) compile return or compile jump (if tail call optimisation)",
        action: comp_return,
    },
    CompilerWord {
        name: "if",
        description: "( -- ) compile if: continue execution if ZF == 1, else branch to \"then\"",
        action: comp_if,
    },
    CompilerWord {
        name: "ifz",
        description: "( -- ) compile ifz: same as if, but for ZF == 0",
        action: comp_ifz,
    },
    CompilerWord {
        name: "ifneq",
        description: "( x y -- x y ) compile ifneq: continue execution if x!=y, else branch to \"then\"",
        action: comp_ifneq,
    },
    CompilerWord {
        name: "then",
        description: "( -- ) compile then: branch there if condition not satisfied",
        action: comp_then,
    },
];

lazy_static! {
    static ref COMPILER_WORD_INDEX: HashMap<&'static str, usize> = COMPILER_WORD_TABLE
        .iter()
        .enumerate()
        .map(|(index, word)| (word.name, index))
        .collect();
}

/// Look up a compiler word by name.
pub fn compiler_word(name: &str) -> Option<&'static CompilerWord> {
    COMPILER_WORD_INDEX
        .get(name)
        .map(|&index| &COMPILER_WORD_TABLE[index])
}

/// Every compiler word, in listing order.
pub fn compiler_words() -> &'static [CompilerWord] {
    COMPILER_WORD_TABLE
}

/// Reset the compiler for a new cycle.  The return-to-loop cell left by the previous unit is
/// removed first so the volatile region stays contiguous.
pub fn begin_cycle(interpreter: &mut dyn Interpreter) {
    let _ = interpreter.store_mut().pop_return_to_loop();

    let len = interpreter.store().len();
    let state = interpreter.compiler_mut();

    state.pending_branches.clear();
    state.in_definition = false;
    state.current_definition = None;
    state.ready = false;
    state.unit_start = len;
    state.boundary = state.boundary.min(len);
    state.undo = CycleUndo {
        store_len: len,
        boundary: state.boundary,
        directory: Vec::new(),
    };

    trace!("cycle starts at {}, boundary {}", len, state.boundary);
}

/// Compile the rest of the line.  Compile errors stop the line but keep the cells already
/// compiled.  Check [`CompilerState::is_ready`] afterwards to see whether the unit is complete.
pub fn compile_line(
    interpreter: &mut dyn Interpreter,
    buffer: &mut SourceBuffer,
    reader: &mut dyn LineReader,
) -> error::Result<()> {
    while let Some(token) = next_token(buffer) {
        match compile_token(interpreter, buffer, reader, &token)? {
            Flow::Continue => {}
            Flow::StopLine | Flow::Ready => break,
        }
    }

    Ok(())
}

/// Resolve one token and append whatever it compiles to.
pub fn compile_token(
    interpreter: &mut dyn Interpreter,
    buffer: &mut SourceBuffer,
    reader: &mut dyn LineReader,
    token: &Token,
) -> error::Result<Flow> {
    let text = token.text.as_str();
    let location = Some(token.location.clone());

    if let Some(word) = compiler_word(text) {
        return (word.action)(interpreter, buffer, reader, token);
    }

    if let Some(start) = interpreter.directory().start_of(text) {
        let _ = interpreter.store_mut().push(location, Op::Call(start));
        return Ok(Flow::Continue);
    }

    if let Some(info) = interpreter.dictionary().get(text) {
        let handler_index = info.handler_index;
        let _ = interpreter.store_mut().push(location, Op::Primitive(handler_index));
        return Ok(Flow::Continue);
    }

    if text.len() > 1
        && let Some(name) = text.strip_suffix(':')
    {
        if !token.first_on_line {
            return compile_error(
                &token.location,
                "definitions must start at newline".to_string(),
            );
        }

        open_definition(interpreter, name, &token.location);
        return Ok(Flow::Continue);
    }

    if text.len() > 1
        && let Some(name) = text.strip_prefix('*')
    {
        return match interpreter.directory().start_of(name) {
            Some(start) => {
                let _ = interpreter.store_mut().push(location, Op::PushIndex(start));
                Ok(Flow::Continue)
            }
            None => compile_error(&token.location, format!("word \"{}\" not found", name)),
        };
    }

    if text.len() > 1
        && let Some(literal) = text.strip_prefix('\'')
    {
        push_literal(interpreter, &token.location, Value::Str(literal.to_string()));
        return Ok(Flow::Continue);
    }

    if text.chars().all(|next| next.is_ascii_digit()) {
        return match text.parse::<i64>() {
            Ok(number) => {
                push_literal(interpreter, &token.location, Value::Int(number));
                Ok(Flow::Continue)
            }
            Err(_) => compile_error(
                &token.location,
                format!("integer literal {} is out of range", text),
            ),
        };
    }

    match interpreter.literal_parser().parse_literal(text) {
        Ok(value) => {
            push_literal(interpreter, &token.location, value);
            Ok(Flow::Continue)
        }
        Err(message) => compile_error(
            &token.location,
            format!("undefined word \"{}\": {}", text, message),
        ),
    }
}

/// Close the unit.  Must follow a cycle whose end-of-input marker compiled cleanly.
pub fn finish_unit(interpreter: &mut dyn Interpreter) -> UnitOutcome {
    let len = interpreter.store().len();
    let state = interpreter.compiler();

    if state.in_definition {
        return UnitOutcome::Defined;
    }

    let start = state.unit_start;

    if len == start {
        return UnitOutcome::Empty;
    }

    let _ = interpreter.store_mut().push(None, Op::ReturnToLoop);
    debug!("executing unit {}..{}", start, len);

    UnitOutcome::Execute(start)
}

/// Throw away everything the cycle compiled: the store is cut back, replaced directory entries are
/// put back and the boundary is restored.
pub fn rollback(interpreter: &mut dyn Interpreter) {
    let undo = std::mem::take(&mut interpreter.compiler_mut().undo);

    interpreter.store_mut().truncate(undo.store_len);

    for (name, entry) in undo.directory.into_iter().rev() {
        interpreter.directory_mut().restore(&name, entry);
    }

    let _ = interpreter.directory_mut().retain_below(undo.store_len);

    let state = interpreter.compiler_mut();

    state.boundary = undo.boundary;
    state.pending_branches.clear();
    state.in_definition = false;
    state.current_definition = None;
    state.ready = false;
    state.undo = CycleUndo {
        store_len: undo.store_len,
        boundary: undo.boundary,
        directory: Vec::new(),
    };

    debug!("cycle rolled back to {}", undo.store_len);
}

fn push_literal(interpreter: &mut dyn Interpreter, location: &SourceLocation, value: Value) {
    let _ = interpreter
        .store_mut()
        .push(Some(location.clone()), Op::PushLiteral(value));
}

/// Compile a definition header.  The volatile region is retracted to the boundary first, along
/// with any definition opened earlier in the cycle that was never closed.
fn open_definition(interpreter: &mut dyn Interpreter, name: &str, location: &SourceLocation) {
    let boundary = interpreter.compiler().boundary;

    let abandoned: Vec<String> = interpreter
        .directory()
        .iter()
        .filter(|(_, entry)| entry.start >= boundary)
        .map(|(name, _)| name.clone())
        .collect();

    for abandoned_name in abandoned {
        warn!("definition {} was never closed and is discarded", abandoned_name);

        let entry = interpreter.directory_mut().remove(&abandoned_name);
        interpreter.compiler_mut().undo.directory.push((abandoned_name, entry));
    }

    if interpreter.store().len() > boundary {
        trace!("retracting volatile region {}..{}", boundary, interpreter.store().len());
        interpreter.store_mut().truncate(boundary);
    }

    let start = interpreter.store().len();
    let previous = interpreter.directory_mut().define(name, start);
    let _ = interpreter
        .store_mut()
        .push(Some(location.clone()), Op::DefHeader(name.to_string()));

    let state = interpreter.compiler_mut();

    state.pending_branches.retain(|&index| index < start);
    state.undo.store_len = state.undo.store_len.min(start);
    state.undo.directory.push((name.to_string(), previous));
    state.in_definition = true;
    state.current_definition = Some(name.to_string());

    debug!("defining {} at {}", name, start);
}

/// Finish the definition with a return, or turn a trailing call into a jump.
fn close_with_return(interpreter: &mut dyn Interpreter, location: &SourceLocation) {
    let store = interpreter.store_mut();

    let tail_call = match store.last().map(|cell| &cell.op) {
        Some(Op::Call(target)) => Some(*target),
        _ => None,
    };

    match tail_call {
        Some(target) => {
            if let Some(cell) = store.last_mut() {
                cell.op = Op::Jump(target);
            }

            trace!("tail call to {} rewritten as jump", target);
        }
        None => {
            let _ = store.push(Some(location.clone()), Op::Return);
        }
    }

    let len = interpreter.store().len();
    interpreter.compiler_mut().boundary = len;
}

fn comp_comment(
    _interpreter: &mut dyn Interpreter,
    _buffer: &mut SourceBuffer,
    _reader: &mut dyn LineReader,
    _token: &Token,
) -> error::Result<Flow> {
    Ok(Flow::StopLine)
}

fn comp_end_of_input(
    interpreter: &mut dyn Interpreter,
    _buffer: &mut SourceBuffer,
    _reader: &mut dyn LineReader,
    token: &Token,
) -> error::Result<Flow> {
    if !interpreter.compiler().pending_branches.is_empty() {
        let unresolved = interpreter.compiler().pending_branches.len();

        warn!("{} unresolved branches, rolling back the cycle", unresolved);
        rollback(interpreter);

        return Err(ScriptError::UnresolvedBranch {
            location: Some(token.location.clone()),
        });
    }

    if interpreter.compiler().in_definition {
        let already_closed = interpreter
            .store()
            .last()
            .map(|cell| cell.op.is_exit())
            .unwrap_or(false);

        if already_closed {
            let len = interpreter.store().len();
            interpreter.compiler_mut().boundary = len;
        } else {
            close_with_return(interpreter, &token.location);
        }
    }

    interpreter.compiler_mut().ready = true;

    Ok(Flow::Ready)
}

fn comp_doc_string(
    interpreter: &mut dyn Interpreter,
    buffer: &mut SourceBuffer,
    _reader: &mut dyn LineReader,
    token: &Token,
) -> error::Result<Flow> {
    let Some(name) = interpreter.compiler().current_definition.clone() else {
        return Ok(Flow::StopLine);
    };

    match buffer.take_until("\"\"") {
        Some(doc) => {
            let _ = interpreter.directory_mut().set_doc(&name, doc.trim_start());
            Ok(Flow::Continue)
        }
        None => compile_error(
            &token.location,
            "\"\" without closing marker \"\"".to_string(),
        ),
    }
}

fn comp_multi_line_string(
    interpreter: &mut dyn Interpreter,
    buffer: &mut SourceBuffer,
    reader: &mut dyn LineReader,
    token: &Token,
) -> error::Result<Flow> {
    skip_separator(buffer);

    let Some(scanned) = take_multi_line(buffer, reader, "\"\"\"") else {
        return compile_error(
            &token.location,
            "\"\"\" without closing marker \"\"\"".to_string(),
        );
    };

    push_literal(interpreter, &token.location, Value::Str(translate_escapes(&scanned.text)));

    if scanned.dropped_trailing_text {
        interpreter.write_line(
            "Compile warning: all data after closing triple-quote in current line is ignored!",
        )?;
    }

    Ok(if scanned.spanned_lines { Flow::StopLine } else { Flow::Continue })
}

fn comp_string(
    interpreter: &mut dyn Interpreter,
    buffer: &mut SourceBuffer,
    _reader: &mut dyn LineReader,
    token: &Token,
) -> error::Result<Flow> {
    match take_delimited(buffer, "\"") {
        Some(text) => {
            push_literal(interpreter, &token.location, Value::Str(text));
            Ok(Flow::Continue)
        }
        None => compile_error(&token.location, "\" without closing marker \"".to_string()),
    }
}

fn comp_raw_string(
    interpreter: &mut dyn Interpreter,
    buffer: &mut SourceBuffer,
    _reader: &mut dyn LineReader,
    token: &Token,
) -> error::Result<Flow> {
    match take_delimited(buffer, "<-") {
        Some(text) => {
            push_literal(interpreter, &token.location, Value::Str(text));
            Ok(Flow::Continue)
        }
        None => compile_error(&token.location, "-> without closing marker <-".to_string()),
    }
}

fn comp_return(
    interpreter: &mut dyn Interpreter,
    _buffer: &mut SourceBuffer,
    _reader: &mut dyn LineReader,
    token: &Token,
) -> error::Result<Flow> {
    if !interpreter.compiler().in_definition {
        return compile_error(
            &token.location,
            "return without definition starting".to_string(),
        );
    }

    close_with_return(interpreter, &token.location);

    Ok(Flow::Continue)
}

fn open_branch(interpreter: &mut dyn Interpreter, location: &SourceLocation, op: Op) -> Flow {
    let index = interpreter.store_mut().push(Some(location.clone()), op);

    interpreter.compiler_mut().pending_branches.push(index);
    Flow::Continue
}

fn comp_if(
    interpreter: &mut dyn Interpreter,
    _buffer: &mut SourceBuffer,
    _reader: &mut dyn LineReader,
    token: &Token,
) -> error::Result<Flow> {
    Ok(open_branch(interpreter, &token.location, Op::BranchIfFlag(0)))
}

fn comp_ifz(
    interpreter: &mut dyn Interpreter,
    _buffer: &mut SourceBuffer,
    _reader: &mut dyn LineReader,
    token: &Token,
) -> error::Result<Flow> {
    Ok(open_branch(interpreter, &token.location, Op::BranchIfNotFlag(0)))
}

fn comp_ifneq(
    interpreter: &mut dyn Interpreter,
    _buffer: &mut SourceBuffer,
    _reader: &mut dyn LineReader,
    token: &Token,
) -> error::Result<Flow> {
    Ok(open_branch(interpreter, &token.location, Op::BranchIfUnequal(0)))
}

fn comp_then(
    interpreter: &mut dyn Interpreter,
    _buffer: &mut SourceBuffer,
    _reader: &mut dyn LineReader,
    token: &Token,
) -> error::Result<Flow> {
    let Some(branch) = interpreter.compiler_mut().pending_branches.pop() else {
        return compile_error(
            &token.location,
            "no matching \"if/ifz/ifneq\" for \"then\"".to_string(),
        );
    };

    let target = interpreter.store().len();

    if let Some(cell) = interpreter.store_mut().get_mut(branch) {
        let _ = cell.op.patch_branch(target);
    }

    let _ = interpreter
        .store_mut()
        .push(Some(token.location.clone()), Op::BranchTarget);
    trace!("branch at {} patched to {}", branch, target);

    Ok(Flow::Continue)
}
