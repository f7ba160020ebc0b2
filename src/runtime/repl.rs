//! The top-level loop: read lines, compile them into a unit, run the unit, report what happened.

use crate::{
    lang::{
        compilation::{begin_cycle, compile_line, finish_unit, UnitOutcome},
        source_buffer::{LineReader, SourceBuffer},
    },
    runtime::{
        built_ins::io_words::word_print_data_stack,
        error::{self, ScriptError},
        interpreter::{
            abort::AbortReport, rpforth_interpreter::RpforthInterpreter, CodeManagement,
            Interpreter, Signal,
        },
    },
};
use rustyline::{error::ReadlineError, DefaultEditor};
use std::{collections::VecDeque, path::PathBuf};
use tracing::{debug, info, warn};

/// Prompt outside a definition.
pub const EXECUTE_PROMPT: &str = "ex> ";

/// Prompt while a definition is open.
pub const COMPILE_PROMPT: &str = "co> ";

/// Where the loop is between two prompts.
#[derive(Clone, Debug, PartialEq)]
pub enum ReplState {
    AwaitingInput,
    CompilingDefinition,
    Executing,

    /// The last unit aborted.  The next cycle starts from here like from `AwaitingInput`.
    Aborted(AbortReport),

    Finished,
}

/// What a finished cycle amounted to.
#[derive(Clone, Debug, PartialEq)]
pub enum ReplEvent {
    /// The unit ran to its end, or stopped early because the program was replaced.
    Executed,

    Defined,

    /// The cycle compiled nothing.
    Empty,

    /// A line was cut short by a compile error.  The cycle goes on with the next line.
    CompileError(String),

    /// The cycle ended with branches still open and was thrown away.
    UnresolvedBranch,

    Aborted(AbortReport),

    Quit,
}

/// Lines held in memory, fed to the loop one at a time.  Used by tests and for script files.
pub struct ScriptLines {
    lines: VecDeque<String>,
    name: String,
}

impl ScriptLines {
    pub fn new(text: &str) -> ScriptLines {
        ScriptLines::named("<script>", text)
    }

    pub fn named(name: &str, text: &str) -> ScriptLines {
        ScriptLines {
            lines: text.lines().map(str::to_string).collect(),
            name: name.to_string(),
        }
    }
}

impl LineReader for ScriptLines {
    fn read_line(&mut self, _prompt: &str) -> Option<String> {
        self.lines.pop_front()
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

/// Interactive input through a line editor, with history kept across sessions.
pub struct EditorReader {
    editor: DefaultEditor,
    history: Option<PathBuf>,
}

impl EditorReader {
    pub fn new(history: Option<PathBuf>) -> error::Result<EditorReader> {
        let mut editor = DefaultEditor::new().map_err(editor_error)?;

        if let Some(path) = &history
            && editor.load_history(path).is_err()
        {
            debug!("no history loaded from {}", path.display());
        }

        Ok(EditorReader { editor, history })
    }
}

fn editor_error(error: ReadlineError) -> ScriptError {
    match error {
        ReadlineError::Io(error) => ScriptError::Io(error),
        other => ScriptError::Io(std::io::Error::other(other.to_string())),
    }
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        loop {
            match self.editor.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = self.editor.add_history_entry(line.as_str());
                    }

                    return Some(line);
                }

                // Ctrl-C abandons the line, not the session.
                Err(ReadlineError::Interrupted) => continue,

                Err(ReadlineError::Eof) => return None,

                Err(error) => {
                    warn!("line editor failed: {}", error);
                    return None;
                }
            }
        }
    }
}

impl Drop for EditorReader {
    fn drop(&mut self) {
        if let Some(path) = &self.history
            && let Err(error) = self.editor.save_history(path)
        {
            warn!("history not saved to {}: {}", path.display(), error);
        }
    }
}

/// The read, compile and execute loop.
pub struct Repl {
    state: ReplState,
    events: Vec<ReplEvent>,

    /// Physical lines read so far, for source locations.
    line: usize,
}

impl Default for Repl {
    fn default() -> Self {
        Repl::new()
    }
}

impl Repl {
    pub fn new() -> Repl {
        Repl {
            state: ReplState::AwaitingInput,
            events: Vec::new(),
            line: 0,
        }
    }

    pub fn state(&self) -> &ReplState {
        &self.state
    }

    /// Every cycle's outcome, oldest first.
    pub fn events(&self) -> &[ReplEvent] {
        &self.events
    }

    /// Run cycles until the input ends or `quit` is executed.  Only fatal conditions come back as
    /// errors, everything else is reported on the console and the loop goes on.
    pub fn run(
        &mut self,
        interpreter: &mut RpforthInterpreter,
        reader: &mut dyn LineReader,
    ) -> error::Result<()> {
        while self.state != ReplState::Finished {
            self.cycle(interpreter, reader)?;
        }

        Ok(())
    }

    fn record(&mut self, event: ReplEvent) {
        debug!("cycle ended: {:?}", event);
        self.events.push(event);
    }

    /// Compile lines until the end-of-input marker, then act on the unit.
    fn cycle(
        &mut self,
        interpreter: &mut RpforthInterpreter,
        reader: &mut dyn LineReader,
    ) -> error::Result<()> {
        begin_cycle(interpreter);

        let mut end_of_input = false;

        self.state = ReplState::AwaitingInput;

        while !interpreter.compiler().is_ready() {
            let in_definition = interpreter.compiler().in_definition();
            let prompt = if in_definition { COMPILE_PROMPT } else { EXECUTE_PROMPT };

            let line = match reader.read_line(prompt) {
                Some(line) if line.trim().is_empty() && !in_definition => ".".to_string(),
                Some(line) => line,
                None => {
                    end_of_input = true;

                    let compiled = interpreter.store().len() > interpreter.compiler().unit_start();

                    if !compiled && !in_definition {
                        self.state = ReplState::Finished;
                        return Ok(());
                    }

                    ".".to_string()
                }
            };

            self.line += 1;

            let mut buffer = SourceBuffer::new(reader.source_name(), self.line, &line);

            match compile_line(interpreter, &mut buffer, reader) {
                Ok(()) => {}

                Err(error @ ScriptError::UnresolvedBranch { .. }) => {
                    interpreter.write_line(&error.to_string())?;
                    self.record(ReplEvent::UnresolvedBranch);
                    self.state = next_state(end_of_input);

                    return Ok(());
                }

                Err(error @ ScriptError::Compile { .. }) => {
                    interpreter.write_line(&error.to_string())?;
                    self.record(ReplEvent::CompileError(error.to_string()));

                    if end_of_input {
                        break;
                    }
                }

                Err(error) => return Err(error),
            }

            if interpreter.compiler().in_definition() {
                self.state = ReplState::CompilingDefinition;
            }
        }

        if !interpreter.compiler().is_ready() {
            self.state = ReplState::Finished;
            return Ok(());
        }

        match finish_unit(interpreter) {
            UnitOutcome::Defined => self.record(ReplEvent::Defined),
            UnitOutcome::Empty => self.record(ReplEvent::Empty),
            UnitOutcome::Execute(start) => {
                self.state = ReplState::Executing;
                self.execute(interpreter, start)?;
            }
        }

        if self.state != ReplState::Finished && end_of_input {
            self.state = ReplState::Finished;
        } else if matches!(self.state, ReplState::Executing | ReplState::CompilingDefinition) {
            self.state = ReplState::AwaitingInput;
        }

        Ok(())
    }

    fn execute(&mut self, interpreter: &mut RpforthInterpreter, start: usize) -> error::Result<()> {
        match interpreter.execute_unit(start) {
            Ok(Some(Signal::Quit)) => {
                info!("session ended by quit");
                self.record(ReplEvent::Quit);
                self.state = ReplState::Finished;
            }

            Ok(signal) => {
                if signal == Some(Signal::Restart) {
                    debug!("program replaced, back to the prompt");
                }

                if interpreter.stack_print() {
                    word_print_data_stack(interpreter)?;
                }

                self.record(ReplEvent::Executed);
            }

            Err(error) if error.is_recoverable() => {
                let message = match &error {
                    ScriptError::Abort { message } => message.clone(),
                    other => other.to_string(),
                };

                warn!("aborted at {}: {}", interpreter.instruction_pointer(), message);

                let report = AbortReport::capture(interpreter, &message);

                write!(interpreter.output(), "{}", report)?;
                interpreter.clear_return_stack();

                self.record(ReplEvent::Aborted(report.clone()));
                self.state = ReplState::Aborted(report);
            }

            Err(error) => return Err(error),
        }

        Ok(())
    }
}

fn next_state(end_of_input: bool) -> ReplState {
    if end_of_input {
        ReplState::Finished
    } else {
        ReplState::AwaitingInput
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{
        built_ins::register_builtin_words,
        config::Config,
        data_structures::value::Value,
        interpreter::{rpforth_interpreter::CapturedOutput, InterpreterStack},
    };

    fn session(text: &str) -> (RpforthInterpreter, Repl, CapturedOutput) {
        let output = CapturedOutput::new();
        let config = Config {
            no_stack_print: true,
            ..Config::default()
        };
        let mut interpreter =
            RpforthInterpreter::with_config(config).with_output(Box::new(output.clone()));

        register_builtin_words(&mut interpreter);

        let mut repl = Repl::new();
        repl.run(&mut interpreter, &mut ScriptLines::new(text)).unwrap();

        (interpreter, repl, output)
    }

    #[test]
    fn blank_line_ends_the_unit() {
        let (interpreter, repl, _) = session("1 2 +\n\n3");

        assert_eq!(interpreter.stack(), &vec![Value::Int(3), Value::Int(3)]);
        assert_eq!(repl.events(), &[ReplEvent::Executed, ReplEvent::Executed]);
        assert_eq!(repl.state(), &ReplState::Finished);
    }

    #[test]
    fn abort_is_reported_and_loop_continues() {
        let (interpreter, repl, output) = session("drop .\n5 .");

        assert!(matches!(repl.events()[0], ReplEvent::Aborted(_)));
        assert!(output.contents().contains("\"drop\" aborted: Data stack empty"));
        assert_eq!(interpreter.stack(), &vec![Value::Int(5)]);
        assert!(interpreter.return_stack().is_empty());
    }

    #[test]
    fn compile_error_keeps_the_cycle_going() {
        let (interpreter, repl, _) = session("1 nosuchword 2\n3 .");

        assert!(matches!(repl.events()[0], ReplEvent::CompileError(_)));
        assert_eq!(repl.events()[1], ReplEvent::Executed);
        assert_eq!(interpreter.stack(), &vec![Value::Int(1), Value::Int(3)]);
    }

    #[test]
    fn quit_finishes_the_session() {
        let (interpreter, repl, _) = session("quit .\n1 .");

        assert_eq!(repl.events(), &[ReplEvent::Quit]);
        assert!(interpreter.stack().is_empty());
    }

    #[test]
    fn stack_is_printed_after_execution() {
        let output = CapturedOutput::new();
        let mut interpreter = RpforthInterpreter::new().with_output(Box::new(output.clone()));

        register_builtin_words(&mut interpreter);
        Repl::new()
            .run(&mut interpreter, &mut ScriptLines::new("7 ."))
            .unwrap();

        assert_eq!(output.contents(), " Data stack items: 1\n[7]\n");
    }
}
