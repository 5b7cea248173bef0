//! The execution engine.
//!
//! [`Interpreter`] walks the raw program text one character at a time. There
//! is no pre-pass: loops are matched while the program runs, using an active
//! loop stack for loops that were entered and a scratch skip stack for the
//! forward scan past a loop whose guard cell is zero.
//!
//! Memory model:
//! - The tape starts with `number_of_cells` zeroed cells and grows with zeros
//!   whenever `+`, `-` or `,` touch a cell past its end.
//! - Moving left from cell 0 stays on cell 0.
//! - Cell arithmetic wraps modulo 256.
//! - An optional `max_cells` ceiling turns growth past that index into
//!   [`InterpreterError::CellLimitExceeded`].

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::{debug, trace};

use crate::config::EngineConfig;

/// Errors that stop an interpreter run.
#[derive(Debug, thiserror::Error)]
pub enum InterpreterError {
    /// A construction parameter was not a positive integer.
    #[error("Invalid configuration: {field} = '{value}' ({reason})")]
    InvalidConfiguration {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    /// The cell pointer moved past the configured `max_cells` ceiling.
    #[error("Cell limit exceeded at instruction {ip} (ptr={ptr}, max_cells={limit})")]
    CellLimitExceeded { ip: usize, ptr: usize, limit: usize },

    /// A `[` without a matching `]`, or a `]` with no open loop.
    #[error("Unbalanced bracket {kind} at instruction {ip}")]
    UnbalancedBracket { ip: usize, kind: BracketKind },

    /// `,` ran with no input left.
    #[error("Input exhausted at instruction {ip}")]
    InputExhausted { ip: usize },

    /// Reading stdin or writing stdout failed.
    #[error("I/O error at instruction {ip}: {source}")]
    Io {
        ip: usize,
        #[source]
        source: io::Error,
    },

    /// Execution aborted due to step limit.
    #[error("Execution aborted: step limit exceeded ({limit})")]
    StepLimitExceeded { limit: usize },

    /// Execution aborted because the wall-clock timeout elapsed.
    #[error("Execution aborted: wall-clock timeout exceeded ({timeout_ms} ms)")]
    TimedOut { timeout_ms: u64 },

    /// Execution aborted through the cancel flag.
    #[error("Execution aborted: cancelled")]
    Canceled,
}

impl InterpreterError {
    /// Instruction index the failure refers to, when there is one.
    pub fn ip(&self) -> Option<usize> {
        match self {
            InterpreterError::CellLimitExceeded { ip, .. }
            | InterpreterError::UnbalancedBracket { ip, .. }
            | InterpreterError::InputExhausted { ip }
            | InterpreterError::Io { ip, .. } => Some(*ip),
            InterpreterError::InvalidConfiguration { .. }
            | InterpreterError::StepLimitExceeded { .. }
            | InterpreterError::TimedOut { .. }
            | InterpreterError::Canceled => None,
        }
    }
}

/// Which side of a loop had no partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketKind {
    Open,
    Close,
}

impl fmt::Display for BracketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BracketKind::Open => write!(f, "'['"),
            BracketKind::Close => write!(f, "']'"),
        }
    }
}

/// Controls for cooperative cancellation and step limiting.
#[derive(Clone)]
pub struct StepControl {
    pub max_steps: Option<usize>,
    pub cancel_flag: Arc<AtomicBool>,
}

impl StepControl {
    pub fn new(max_steps: Option<usize>, cancel_flag: Arc<AtomicBool>) -> Self {
        Self { max_steps, cancel_flag }
    }
}

type OutputSink = Box<dyn Fn(&[u8]) + Send + Sync>;
type InputProvider = Box<dyn Fn() -> Option<u8> + Send + Sync>;

/// A growable-tape Brainfuck interpreter.
pub struct Interpreter {
    program: Vec<char>,
    tape: Vec<u8>,
    cell_pointer: usize,
    instruction_pointer: usize,
    loop_stack: Vec<usize>,
    skip_stack: Vec<usize>,
    max_cells: Option<usize>,
    steps: usize,
    output_sink: Option<OutputSink>,
    input_provider: Option<InputProvider>,
}

impl Interpreter {
    /// Create an interpreter with 30,000 cells and no ceiling.
    pub fn new(program: &str) -> Self {
        Self::with_config(program, EngineConfig::default())
    }

    /// Create an interpreter from an already validated configuration.
    pub fn with_config(program: &str, config: EngineConfig) -> Self {
        let program: Vec<char> = program.chars().collect();
        debug!(
            cells = config.number_of_cells(),
            max_cells = ?config.max_cells(),
            program_len = program.len(),
            "interpreter created"
        );
        Self {
            program,
            tape: vec![0; config.number_of_cells()],
            cell_pointer: 0,
            instruction_pointer: 0,
            loop_stack: Vec::new(),
            skip_stack: Vec::new(),
            max_cells: config.max_cells(),
            steps: 0,
            output_sink: None,
            input_provider: None,
        }
    }

    /// Create an interpreter from textual construction parameters.
    ///
    /// `None` selects the default for that parameter. Anything that is not a
    /// positive integer (or `unlimited` for `max_cells`) is rejected with
    /// [`InterpreterError::InvalidConfiguration`] before the tape exists.
    pub fn from_raw(
        program: &str,
        number_of_cells: Option<&str>,
        max_cells: Option<&str>,
    ) -> Result<Self, InterpreterError> {
        let config = EngineConfig::from_raw(number_of_cells, max_cells)?;
        Ok(Self::with_config(program, config))
    }

    /// Provide an output sink. When set, '.' sends bytes to this sink instead of stdout.
    /// The sink receives a single-byte slice holding the cell value per '.'.
    pub fn set_output_sink<F>(&mut self, sink: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.output_sink = Some(Box::new(sink));
    }

    /// Provide an input provider. When set, ',' reads from this provider instead of stdin.
    /// Returning None means the input is exhausted.
    pub fn set_input_provider<F>(&mut self, provider: F)
    where
        F: Fn() -> Option<u8> + Send + Sync + 'static,
    {
        self.input_provider = Some(Box::new(provider));
    }

    pub fn tape(&self) -> &[u8] {
        &self.tape
    }

    pub fn cell_pointer(&self) -> usize {
        self.cell_pointer
    }

    pub fn instruction_pointer(&self) -> usize {
        self.instruction_pointer
    }

    /// Number of loops currently entered.
    pub fn loop_depth(&self) -> usize {
        self.loop_stack.len()
    }

    pub fn max_cells(&self) -> Option<usize> {
        self.max_cells
    }

    /// Instructions dispatched so far, no-op characters included.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn is_halted(&self) -> bool {
        self.instruction_pointer >= self.program.len()
    }

    /// Execute the program until the instruction pointer runs off the end.
    pub fn run(&mut self) -> Result<(), InterpreterError> {
        self.execute(None)
    }

    /// Execute with cooperative cancellation and optional step limit.
    pub fn run_with_control(&mut self, step_control: StepControl) -> Result<(), InterpreterError> {
        self.execute(Some(&step_control))
    }

    /// Dispatch the instruction under the instruction pointer.
    ///
    /// Returns `Ok(false)` without doing anything once the program is exhausted.
    pub fn step(&mut self) -> Result<bool, InterpreterError> {
        let Some(&op) = self.program.get(self.instruction_pointer) else {
            return Ok(false);
        };
        trace!(
            ip = self.instruction_pointer,
            ptr = self.cell_pointer,
            cell = self.current_cell(),
            %op,
            "dispatch"
        );

        match op {
            '>' => {
                self.cell_pointer += 1;
                self.instruction_pointer += 1;
            }
            '<' => {
                self.cell_pointer = self.cell_pointer.saturating_sub(1);
                self.instruction_pointer += 1;
            }
            '+' => {
                self.ensure_cell()?;
                let cell = &mut self.tape[self.cell_pointer];
                *cell = cell.wrapping_add(1);
                self.instruction_pointer += 1;
            }
            '-' => {
                self.ensure_cell()?;
                let cell = &mut self.tape[self.cell_pointer];
                *cell = cell.wrapping_sub(1);
                self.instruction_pointer += 1;
            }
            '.' => {
                self.emit(self.current_cell())?;
                self.instruction_pointer += 1;
            }
            ',' => {
                self.ensure_cell()?;
                let byte = self.read_input()?;
                self.tape[self.cell_pointer] = byte;
                self.instruction_pointer += 1;
            }
            '[' => self.loop_begin()?,
            ']' => self.loop_end()?,
            _ => self.instruction_pointer += 1,
        }

        self.steps += 1;
        Ok(true)
    }

    fn execute(&mut self, step_control: Option<&StepControl>) -> Result<(), InterpreterError> {
        let result = loop {
            if self.is_halted() {
                break Ok(());
            }

            if let Some(ctrl) = step_control {
                if ctrl.cancel_flag.load(Ordering::Relaxed) {
                    break Err(InterpreterError::Canceled);
                }
                if let Some(max) = ctrl.max_steps {
                    if self.steps >= max {
                        break Err(InterpreterError::StepLimitExceeded { limit: max });
                    }
                }
            }

            if let Err(err) = self.step() {
                break Err(err);
            }
        };

        match &result {
            Ok(()) => debug!(steps = self.steps, tape_len = self.tape.len(), "run finished"),
            Err(err) => debug!(steps = self.steps, %err, "run halted"),
        }
        result
    }

    /// Cells past the end of the tape have never been written and read as 0.
    fn current_cell(&self) -> u8 {
        self.tape.get(self.cell_pointer).copied().unwrap_or(0)
    }

    /// Apply the ceiling, then grow the tape so the cell pointer is a valid index.
    fn ensure_cell(&mut self) -> Result<(), InterpreterError> {
        if let Some(limit) = self.max_cells {
            if self.cell_pointer > limit {
                return Err(InterpreterError::CellLimitExceeded {
                    ip: self.instruction_pointer,
                    ptr: self.cell_pointer,
                    limit,
                });
            }
        }

        if self.cell_pointer >= self.tape.len() {
            let old_len = self.tape.len();
            self.tape.resize(self.cell_pointer + 1, 0);
            debug!(from = old_len, to = self.tape.len(), "tape grown");
        }
        Ok(())
    }

    fn emit(&self, byte: u8) -> Result<(), InterpreterError> {
        if let Some(sink) = self.output_sink.as_ref() {
            (sink)(&[byte]);
            return Ok(());
        }

        // The cell value is a code point, so 128..=255 become two UTF-8 bytes.
        let mut buf = [0u8; 4];
        let encoded = char::from(byte).encode_utf8(&mut buf);
        io::stdout()
            .write_all(encoded.as_bytes())
            .map_err(|source| InterpreterError::Io { ip: self.instruction_pointer, source })
    }

    fn read_input(&self) -> Result<u8, InterpreterError> {
        let ip = self.instruction_pointer;
        if let Some(provider) = self.input_provider.as_ref() {
            return (provider)().ok_or(InterpreterError::InputExhausted { ip });
        }

        let mut buf = [0u8; 1];
        match io::stdin().lock().read_exact(&mut buf) {
            Ok(()) => Ok(buf[0]),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(InterpreterError::InputExhausted { ip })
            }
            Err(source) => Err(InterpreterError::Io { ip, source }),
        }
    }

    fn loop_begin(&mut self) -> Result<(), InterpreterError> {
        if self.current_cell() != 0 {
            self.loop_stack.push(self.instruction_pointer);
            self.instruction_pointer += 1;
            return Ok(());
        }

        // The scan starts on this '[' so the skip stack is never empty on the first ']'.
        self.skip_stack.clear();
        for (i, &c) in self.program.iter().enumerate().skip(self.instruction_pointer) {
            match c {
                '[' => self.skip_stack.push(i),
                ']' => {
                    self.skip_stack.pop();
                    if self.skip_stack.is_empty() {
                        trace!(from = self.instruction_pointer, to = i + 1, "loop skipped");
                        self.instruction_pointer = i + 1;
                        return Ok(());
                    }
                }
                _ => {}
            }
        }

        self.skip_stack.clear();
        Err(InterpreterError::UnbalancedBracket {
            ip: self.instruction_pointer,
            kind: BracketKind::Open,
        })
    }

    fn loop_end(&mut self) -> Result<(), InterpreterError> {
        let Some(&open) = self.loop_stack.last() else {
            return Err(InterpreterError::UnbalancedBracket {
                ip: self.instruction_pointer,
                kind: BracketKind::Close,
            });
        };

        if self.current_cell() != 0 {
            self.instruction_pointer = open + 1;
        } else {
            self.loop_stack.pop();
            self.instruction_pointer += 1;
        }
        Ok(())
    }
}
