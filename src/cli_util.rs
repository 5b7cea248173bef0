use std::io::{self, IsTerminal, Write};

use nu_ansi_term::Color;

use crate::InterpreterError;

/// Short, user-facing description of a failure, without position.
pub fn describe(err: &InterpreterError) -> String {
    match err {
        InterpreterError::InvalidConfiguration { field, value, reason } => {
            format!("Configuration error: {field} {reason} (got '{value}')")
        }
        InterpreterError::CellLimitExceeded { ptr, limit, .. } => format!(
            "Runtime error: cannot grow the tape past the max_cells limit (ptr={ptr}, max_cells={limit})"
        ),
        InterpreterError::UnbalancedBracket { kind, .. } => {
            format!("Runtime error: unbalanced {kind} detected")
        }
        InterpreterError::InputExhausted { .. } => "Runtime error: input exhausted".to_string(),
        InterpreterError::Io { source, .. } => format!("I/O error: {source}"),
        InterpreterError::StepLimitExceeded { limit } => {
            format!("Execution aborted: step limit exceeded ({limit})")
        }
        InterpreterError::TimedOut { timeout_ms } => {
            format!("Execution aborted: wall-clock timeout exceeded ({timeout_ms} ms)")
        }
        InterpreterError::Canceled => "Execution aborted: cancelled".to_string(),
    }
}

/// Pretty-print an [`InterpreterError`], with caret positioning when it carries an instruction index.
/// If `program` is `Some("bf")`, prefix messages with "bf: ...".
pub fn print_interpreter_error(program: Option<&str>, code: &str, err: &InterpreterError) {
    let msg = prefix_program(program, &describe(err));
    match err.ip() {
        Some(ip) => print_error_with_context(&msg, code, ip),
        None => print_error(&msg),
    }
}

pub fn prefix_program(program: Option<&str>, msg: &str) -> String {
    match program {
        Some(p) => format!("{p}: {msg}"),
        None => msg.to_string(),
    }
}

/// Print a one-line error to stderr, red when stderr is a terminal.
pub fn print_error(msg: &str) {
    let mut stderr = io::stderr().lock();
    if io::stderr().is_terminal() {
        let _ = writeln!(stderr, "{}", Color::Red.paint(msg));
    } else {
        let _ = writeln!(stderr, "{msg}");
    }
    let _ = stderr.flush();
}

/// Print a concise error with instruction index and a caret context window,
/// working with UTF-8 by slicing using char indices.
pub fn print_error_with_context(prefix: &str, code: &str, pos: usize) {
    print_error(&format!("{prefix} at instruction {pos}"));
    let (slice, caret) = context_window(code, pos);
    eprintln!("  {slice}");
    eprintln!("  {caret}");
    let _ = io::stderr().flush();
}

/// A short window of `code` around `pos` and a caret line pointing at it.
/// Newlines and tabs in the window are shown as spaces so the caret lines up.
pub fn context_window(code: &str, pos: usize) -> (String, String) {
    const WINDOW_CHARS: usize = 32;

    let start_char = pos.saturating_sub(WINDOW_CHARS);
    let slice: String = code
        .chars()
        .skip(start_char)
        .take(pos - start_char + WINDOW_CHARS + 1)
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();

    let mut caret = " ".repeat(pos - start_char);
    caret.push('^');
    (slice, caret)
}
