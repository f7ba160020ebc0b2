use std::{ cell::RefCell,
           io::{ self,
                 Write },
           rc::Rc };
use tracing::{ debug,
               trace };
use crate::{ lang::{ code::{ Op,
                             ProgramStore },
                     compilation::CompilerState,
                     literal::{ LiteralParser,
                                StandardLiteralParser },
                     source_buffer::SourceLocation },
             runtime::{ config::Config,
                        data_structures::{ dictionary::{ Dictionary,
                                                         WordInfo },
                                           directory::Directory,
                                           value::Value },
                        error::{ self,
                                 script_error,
                                 script_error_str,
                                 ScriptError },
                        interpreter::{ CodeManagement,
                                       IndexRegister,
                                       Interpreter,
                                       InterpreterStack,
                                       Registers,
                                       Signal,
                                       ValueStack,
                                       WordHandler,
                                       WordHandlerInfo,
                                       WordManagement } } };



/// List of word handlers known by the interpreter, indexed by the `Primitive` cells.
pub type WordList = Vec<WordHandlerInfo>;



/// An output sink that keeps everything written to it, so the console output of a session can be
/// inspected afterwards.  Clones share the same buffer.
#[derive(Clone, Default)]
pub struct CapturedOutput
{
    buffer: Rc<RefCell<Vec<u8>>>
}


impl CapturedOutput
{
    pub fn new() -> CapturedOutput
    {
        CapturedOutput::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> String
    {
        String::from_utf8_lossy(&self.buffer.borrow()).into_owned()
    }

    /// Forget everything written so far.
    pub fn clear(&self)
    {
        self.buffer.borrow_mut().clear();
    }
}


impl Write for CapturedOutput
{
    fn write(&mut self, data: &[u8]) -> io::Result<usize>
    {
        self.buffer.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()>
    {
        Ok(())
    }
}



/// How a single dispatch step ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step
{
    Continue,
    ReturnToLoop
}



/// The machine: stacks, registers, the program store with its directory, and the primitive
/// dictionary.  Everything the words can reach goes through the interpreter traits.
pub struct RpforthInterpreter
{
    /// The data stack.
    stack: ValueStack,

    /// The user managed scratch stack.
    aux_stack: ValueStack,

    /// Saved return indices.  Each is the index of the cell after the call that pushed it.
    return_stack: Vec<usize>,

    /// The condition flag.
    flag: bool,

    /// The index registers I, J and K.
    registers: [ i64; 3 ],

    /// The cell being executed.
    ip: usize,

    /// Set by a primitive that wants execution to continue somewhere else.
    redirect: Option<usize>,

    /// Set by a primitive that wants the dispatch loop to stop.
    signal: Option<Signal>,

    /// The program store, definitions and volatile code together.
    store: ProgramStore,

    /// The compiler's cycle state.
    compiler: CompilerState,

    /// The composite-word directory.
    directory: Directory,

    /// The primitive dictionary.
    dictionary: Dictionary,

    /// The handlers the dictionary entries point at.
    word_handlers: WordList,

    /// Last resort of word resolution.
    literal_parser: Box<dyn LiteralParser>,

    /// Console output.
    output: Box<dyn Write>,

    config: Config,

    /// Print the data stack after each executed line.
    stack_print: bool,

    /// Directory size when last saved or loaded.
    saved_definitions: usize
}


impl InterpreterStack for RpforthInterpreter
{
    fn stack(&self) -> &ValueStack
    {
        &self.stack
    }

    fn push(&mut self, value: Value)
    {
        self.stack.push(value);
    }

    fn pop(&mut self) -> error::Result<Value>
    {
        match self.stack.pop()
        {
            Some(value) => Ok(value),
            None => script_error_str("Data stack empty, missing argument")
        }
    }

    fn require(&self, count: usize, word: &str) -> error::Result<()>
    {
        if self.stack.len() < count
        {
            script_error(format!("\"{}\" needs {} items, stack has {}",
                                 word,
                                 count,
                                 self.stack.len()))?;
        }

        Ok(())
    }

    fn peek(&self, depth: usize) -> error::Result<&Value>
    {
        if depth >= self.stack.len()
        {
            return script_error(format!("Stack has {} items, can not reach item {}",
                                        self.stack.len(),
                                        depth));
        }

        Ok(&self.stack[self.stack.len() - 1 - depth])
    }

    fn pop_as_int(&mut self) -> error::Result<i64>
    {
        let value = self.peek(0)?;

        match value.as_int()
        {
            Some(number) =>
                {
                    let _ = self.stack.pop();
                    Ok(number)
                },

            None => script_error(format!("Expected an int, found {}", value.type_name()))
        }
    }

    fn pop_as_usize(&mut self) -> error::Result<usize>
    {
        let value = self.peek(0)?;

        match value.as_int()
        {
            Some(number) if number >= 0 =>
                {
                    let _ = self.stack.pop();
                    Ok(number as usize)
                },

            Some(number) => script_error(format!("Expected a non-negative int, found {}", number)),

            None => script_error(format!("Expected an int, found {}", value.type_name()))
        }
    }

    fn pop_as_string(&mut self) -> error::Result<String>
    {
        match self.peek(0)?
        {
            Value::Str(_) =>
                {
                    match self.stack.pop()
                    {
                        Some(Value::Str(text)) => Ok(text),
                        _ => script_error_str("Expected a string value")
                    }
                },

            other => script_error(format!("Expected a string value, found {}", other.type_name()))
        }
    }

    fn clear_stack(&mut self)
    {
        self.stack.clear();
    }

    fn aux_stack(&self) -> &ValueStack
    {
        &self.aux_stack
    }

    fn aux_push(&mut self, value: Value)
    {
        self.aux_stack.push(value);
    }

    fn aux_pop(&mut self) -> error::Result<Value>
    {
        match self.aux_stack.pop()
        {
            Some(value) => Ok(value),
            None => script_error_str("User stack empty")
        }
    }

    fn clear_aux_stack(&mut self)
    {
        self.aux_stack.clear();
    }
}


impl Registers for RpforthInterpreter
{
    fn flag(&self) -> bool
    {
        self.flag
    }

    fn set_flag(&mut self, value: bool)
    {
        self.flag = value;
    }

    fn register(&self, register: IndexRegister) -> i64
    {
        self.registers[register.slot()]
    }

    fn set_register(&mut self, register: IndexRegister, value: i64)
    {
        self.registers[register.slot()] = value;
    }
}


impl CodeManagement for RpforthInterpreter
{
    fn store(&self) -> &ProgramStore
    {
        &self.store
    }

    fn store_mut(&mut self) -> &mut ProgramStore
    {
        &mut self.store
    }

    fn compiler(&self) -> &CompilerState
    {
        &self.compiler
    }

    fn compiler_mut(&mut self) -> &mut CompilerState
    {
        &mut self.compiler
    }

    fn literal_parser(&self) -> &dyn LiteralParser
    {
        self.literal_parser.as_ref()
    }

    fn instruction_pointer(&self) -> usize
    {
        self.ip
    }

    fn return_stack(&self) -> &[usize]
    {
        &self.return_stack
    }

    fn redirect(&mut self, index: usize) -> error::Result<()>
    {
        self.check_index(index)?;

        self.return_stack.push(self.ip + 1);
        self.redirect = Some(index);

        Ok(())
    }

    fn execute_nested(&mut self, index: usize) -> error::Result<()>
    {
        self.check_index(index)?;

        let saved_ip = self.ip;
        let depth = self.return_stack.len();

        // The nested word's final return pops this entry, which is how we know it is done.
        self.return_stack.push(saved_ip);
        self.ip = index;

        while self.return_stack.len() > depth
        {
            if self.step()? == Step::ReturnToLoop
            {
                return script_error(format!("Word at index {} did not return", index));
            }

            if self.signal.is_some()
            {
                break;
            }
        }

        self.ip = saved_ip;
        Ok(())
    }

    fn signal(&mut self, signal: Signal)
    {
        self.signal = Some(signal);
    }

    fn replace_program(&mut self, store: ProgramStore, directory: Directory, boundary: usize)
    {
        debug!("program replaced, {} cells, {} definitions", store.len(), directory.len());

        self.store = store;
        self.directory = directory;
        self.return_stack.clear();
        self.compiler = CompilerState::new();
        self.compiler.set_boundary(boundary);
    }
}


impl WordManagement for RpforthInterpreter
{
    fn add_word(&mut self,
                file: &str,
                line: usize,
                column: usize,
                name: &str,
                handler: Rc<WordHandler>,
                description: &str,
                signature: &str)
    {
        let location = SourceLocation::new_from_info(file, line, column);
        let mut word_info = WordInfo::new(location.clone());

        let info = WordHandlerInfo::new(name.to_string(), location, handler);

        self.word_handlers.push(info);

        word_info.name = name.to_string();
        word_info.description = description.to_string();
        word_info.signature = signature.to_string();
        word_info.handler_index = self.word_handlers.len() - 1;

        self.dictionary.insert(name.to_string(), word_info);
    }

    fn dictionary(&self) -> &Dictionary
    {
        &self.dictionary
    }

    fn word_handler_info(&self, index: usize) -> Option<&WordHandlerInfo>
    {
        self.word_handlers.get(index)
    }

    fn directory(&self) -> &Directory
    {
        &self.directory
    }

    fn directory_mut(&mut self) -> &mut Directory
    {
        &mut self.directory
    }
}


impl Interpreter for RpforthInterpreter
{
    fn output(&mut self) -> &mut dyn Write
    {
        self.output.as_mut()
    }

    fn config(&self) -> &Config
    {
        &self.config
    }

    fn stack_print(&self) -> bool
    {
        self.stack_print
    }

    fn set_stack_print(&mut self, enabled: bool)
    {
        self.stack_print = enabled;
    }

    fn saved_definitions(&self) -> usize
    {
        self.saved_definitions
    }

    fn set_saved_definitions(&mut self, count: usize)
    {
        self.saved_definitions = count;
    }
}


impl RpforthInterpreter
{
    /// A machine with an empty program, writing to stdout and configured with the defaults.  No
    /// primitives are registered yet.
    pub fn new() -> RpforthInterpreter
    {
        RpforthInterpreter::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> RpforthInterpreter
    {
        RpforthInterpreter
            {
                stack: Vec::with_capacity(20),
                aux_stack: Vec::new(),
                return_stack: Vec::with_capacity(40),

                flag: false,
                registers: [ 0; 3 ],

                ip: 0,
                redirect: None,
                signal: None,

                store: ProgramStore::new(),
                compiler: CompilerState::new(),
                directory: Directory::new(),

                dictionary: Dictionary::new(),
                word_handlers: WordList::new(),

                literal_parser: Box::new(StandardLiteralParser),

                output: Box::new(io::stdout()),

                stack_print: !config.no_stack_print,
                saved_definitions: 0,

                config
            }
    }

    /// Send console output somewhere else.
    pub fn with_output(mut self, output: Box<dyn Write>) -> RpforthInterpreter
    {
        self.output = output;
        self
    }

    /// Replace the literal parser used by the compiler.
    pub fn with_literal_parser(mut self, parser: Box<dyn LiteralParser>) -> RpforthInterpreter
    {
        self.literal_parser = parser;
        self
    }

    /// Forget the saved return indices, done after an abort has been reported.
    pub fn clear_return_stack(&mut self)
    {
        self.return_stack.clear();
    }

    /// Run a compiled unit from its first cell until it hands control back to the loop.  A
    /// primitive that raised a signal stops the unit early and the signal is returned.
    ///
    /// On error the instruction pointer is left on the failing cell for the abort report.
    pub fn execute_unit(&mut self, start: usize) -> error::Result<Option<Signal>>
    {
        self.ip = start;
        self.signal = None;
        self.redirect = None;

        loop
        {
            if self.step()? == Step::ReturnToLoop
            {
                break;
            }

            if self.signal.is_some()
            {
                break;
            }
        }

        let signal = self.signal.take();

        // A restart may have cut the store below the saved frames, they cannot be resumed.
        if !self.return_stack.is_empty()
        {
            debug!("unit finished with {} return entries left", self.return_stack.len());
            self.return_stack.clear();
        }

        Ok(signal)
    }

    fn check_index(&self, index: usize) -> error::Result<()>
    {
        if index >= self.store.len()
        {
            return script_error(format!("Index out of execution list range 0:{}",
                                        self.store.len()));
        }

        Ok(())
    }

    fn fatal<T>(&self, message: &str) -> error::Result<T>
    {
        Err(ScriptError::Fatal { ip: self.ip, message: message.to_string() })
    }

    /// Fetch the current cell, perform it and move the instruction pointer.
    fn step(&mut self) -> error::Result<Step>
    {
        let ip = self.ip;

        let Some(cell) = self.store.get(ip)
        else
        {
            return self.fatal("instruction pointer outside the execution list");
        };

        trace!("{:5} {}", ip, cell.op);

        match &cell.op
        {
            Op::DefHeader(_) | Op::BranchTarget => self.ip = ip + 1,

            Op::Call(target) =>
                {
                    let target = *target;

                    self.return_stack.push(ip + 1);
                    self.ip = target;
                },

            Op::Jump(target) => self.ip = *target,

            Op::Return =>
                {
                    match self.return_stack.pop()
                    {
                        Some(index) => self.ip = index,
                        None => return script_error_str("Return stack underflow")
                    }
                },

            Op::PushLiteral(value) =>
                {
                    let value = value.clone();

                    self.stack.push(value);
                    self.ip = ip + 1;
                },

            Op::PushIndex(index) =>
                {
                    let index = *index as i64;

                    self.stack.push(Value::Int(index));
                    self.ip = ip + 1;
                },

            Op::BranchIfFlag(target) =>
                {
                    self.ip = if self.flag { ip + 1 } else { *target };
                },

            Op::BranchIfNotFlag(target) =>
                {
                    self.ip = if self.flag { *target } else { ip + 1 };
                },

            Op::BranchIfUnequal(target) =>
                {
                    let target = *target;

                    self.require(2, "ifneq")?;

                    let length = self.stack.len();

                    self.ip = if self.stack[length - 1] == self.stack[length - 2]
                        {
                            target
                        }
                        else
                        {
                            ip + 1
                        };
                },

            Op::Primitive(index) =>
                {
                    let Some(handler) = self.word_handlers.get(*index).map(|info| info.handler())
                    else
                    {
                        return self.fatal("primitive handler not found");
                    };

                    self.redirect = None;
                    (*handler)(self)?;

                    self.ip = self.redirect.take().unwrap_or(ip + 1);
                },

            Op::ReturnToLoop => return Ok(Step::ReturnToLoop)
        }

        Ok(Step::Continue)
    }
}


impl Default for RpforthInterpreter
{
    fn default() -> Self
    {
        Self::new()
    }
}



#[cfg(test)]
mod tests
{
    use super::*;

    fn program(ops: Vec<Op>) -> RpforthInterpreter
    {
        let mut interpreter = RpforthInterpreter::new();

        for op in ops
        {
            let _ = interpreter.store_mut().push(None, op);
        }

        interpreter
    }

    #[test]
    fn call_and_return_come_back_after_the_call()
    {
        let mut interpreter = program(vec![ Op::DefHeader("two".into()),
                                            Op::PushLiteral(Value::Int(2)),
                                            Op::Return,
                                            Op::Call(0),
                                            Op::Call(0),
                                            Op::ReturnToLoop ]);

        assert_eq!(interpreter.execute_unit(3).unwrap(), None);
        assert_eq!(interpreter.stack(), &vec![ Value::Int(2), Value::Int(2) ]);
        assert!(interpreter.return_stack().is_empty());
    }

    #[test]
    fn return_underflow_aborts()
    {
        let mut interpreter = program(vec![ Op::Return ]);

        assert!(matches!(interpreter.execute_unit(0), Err(ScriptError::Abort { .. })));
        assert_eq!(interpreter.instruction_pointer(), 0);
    }

    #[test]
    fn running_off_the_store_is_fatal()
    {
        let mut interpreter = program(vec![ Op::PushLiteral(Value::Int(1)) ]);

        assert!(matches!(interpreter.execute_unit(0), Err(ScriptError::Fatal { ip: 1, .. })));
    }

    #[test]
    fn branches_follow_the_flag()
    {
        let mut interpreter = program(vec![ Op::BranchIfFlag(2),
                                            Op::PushLiteral(Value::Int(1)),
                                            Op::BranchTarget,
                                            Op::BranchIfNotFlag(5),
                                            Op::PushLiteral(Value::Int(2)),
                                            Op::BranchTarget,
                                            Op::ReturnToLoop ]);

        interpreter.execute_unit(0).unwrap();
        assert_eq!(interpreter.stack(), &vec![ Value::Int(2) ]);

        interpreter.clear_stack();
        interpreter.set_flag(true);
        interpreter.execute_unit(0).unwrap();
        assert_eq!(interpreter.stack(), &vec![ Value::Int(1) ]);
    }

    #[test]
    fn unequal_branch_keeps_operands()
    {
        let mut interpreter = program(vec![ Op::PushLiteral(Value::Int(3)),
                                            Op::PushLiteral(Value::Float(3.0)),
                                            Op::BranchIfUnequal(4),
                                            Op::PushLiteral(Value::Str("differ".into())),
                                            Op::BranchTarget,
                                            Op::ReturnToLoop ]);

        interpreter.execute_unit(0).unwrap();
        assert_eq!(interpreter.stack(), &vec![ Value::Int(3), Value::Float(3.0) ]);
    }

    #[test]
    fn failed_typed_pop_leaves_stack_alone()
    {
        let mut interpreter = RpforthInterpreter::new();

        interpreter.push(Value::Str("x".into()));

        assert!(interpreter.pop_as_int().is_err());
        assert!(interpreter.pop_as_usize().is_err());
        assert_eq!(interpreter.stack().len(), 1);
        assert_eq!(interpreter.pop_as_string().unwrap(), "x");
    }
}
