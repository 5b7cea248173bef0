//! A Brainfuck interpreter over a growable tape.
//!
//! The engine executes the eight instructions `><+-.,[]` directly from the
//! program text. Every other character is a comment.
//!
//! Features and behaviors:
//! - Memory tape of byte cells (30,000 by default), initialized to 0.
//! - The tape grows on demand, up to an optional `max_cells` ceiling.
//! - Moving left from cell 0 stays on cell 0; cell arithmetic wraps.
//! - `,` reads a single byte; running out of input is an error.
//! - `.` writes the current cell as a character (no newline).
//! - Loops are matched while running; unbalanced brackets are reported as errors.
//!
//! Quick start:
//!
//! ```no_run
//! use tape_bf::Interpreter;
//!
//! // Classic "Hello World!" in Brainfuck
//! let code = "++++++++++[>+++++++>++++++++++>+++>+<<<<-]>++.>+.+++++++..+++.>++.<<+++++++++++++++.>.+++.------.--------.>+.>.";
//! let mut bf = Interpreter::new(code);
//! bf.run().expect("program should run");
//! ```

pub mod cli_util;
pub mod commands;
pub mod config;
pub mod interpreter;
pub mod loader;

pub use config::EngineConfig;
pub use interpreter::{BracketKind, Interpreter, InterpreterError, StepControl};
