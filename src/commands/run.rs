use clap::Args;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cli_util::{prefix_program, print_error, print_interpreter_error};
use crate::config::{self, EngineConfig, FileSettings};
use crate::loader;
use crate::{Interpreter, InterpreterError, StepControl};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_INTERRUPTED: i32 = 130;

/// How long a first Ctrl+C waits for the run to stop at an instruction boundary.
const INTERRUPT_GRACE: Duration = Duration::from_millis(250);

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Program file to run
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Number of cells to start off with (fallback BF_NUMBER_OF_CELLS; default 30000)
    #[arg(short = 'n', long = "number-of-cells", alias = "number_of_cells", value_name = "N")]
    pub number_of_cells: Option<String>,

    /// Highest cell index the tape may grow to, or "unlimited" (fallback BF_MAX_CELLS)
    #[arg(short = 'm', long = "max-cells", alias = "max_cells", value_name = "N")]
    pub max_cells: Option<String>,

    /// Maximum interpreter steps before abort (fallback BF_MAX_STEPS; default unlimited)
    #[arg(long = "max-steps", value_name = "N")]
    pub max_steps: Option<String>,

    /// Wall-clock timeout in milliseconds (fallback BF_TIMEOUT_MS; default none)
    #[arg(long = "timeout", value_name = "MS")]
    pub timeout_ms: Option<String>,

    /// Program text given inline; parts are concatenated
    #[arg(value_name = "code", trailing_var_arg = true, allow_hyphen_values = true)]
    pub code: Vec<String>,
}

/// Fully resolved settings for one run.
#[derive(Debug)]
struct RunSettings {
    engine: EngineConfig,
    max_steps: Option<usize>,
    timeout_ms: Option<u64>,
}

/// Resolve flags against `env` and the config `file`: flag, then env, then file.
fn resolve_settings<E>(
    args: &RunArgs,
    file: FileSettings,
    env: E,
) -> Result<RunSettings, InterpreterError>
where
    E: Fn(&str) -> Option<String>,
{
    let number_of_cells = config::resolve(
        args.number_of_cells.clone(),
        env("BF_NUMBER_OF_CELLS"),
        file.number_of_cells,
    );
    let max_cells = config::resolve(args.max_cells.clone(), env("BF_MAX_CELLS"), file.max_cells);
    let engine = EngineConfig::from_raw(number_of_cells.as_deref(), max_cells.as_deref())?;

    let max_steps = config::resolve(args.max_steps.clone(), env("BF_MAX_STEPS"), file.max_steps)
        .map(|raw| config::parse_positive("max_steps", &raw))
        .transpose()?;
    let timeout_ms = config::resolve(args.timeout_ms.clone(), env("BF_TIMEOUT_MS"), file.timeout_ms)
        .map(|raw| config::parse_positive("timeout_ms", &raw).map(|ms| ms as u64))
        .transpose()?;

    Ok(RunSettings { engine, max_steps, timeout_ms })
}

pub fn run(program: &str, args: RunArgs) -> i32 {
    if args.file.is_none() && args.code.is_empty() {
        print_error(&prefix_program(Some(program), "no program given; use --file <PATH> or pass code"));
        return EXIT_USAGE;
    }

    if args.file.is_some() && !args.code.is_empty() {
        print_error(&prefix_program(Some(program), "cannot use positional code together with --file"));
        return EXIT_USAGE;
    }

    // Configuration is validated before the program is even loaded.
    let settings = match resolve_settings(&args, config::load_file_settings(), config::env_var) {
        Ok(s) => s,
        Err(err) => {
            print_interpreter_error(Some(program), "", &err);
            return EXIT_USAGE;
        }
    };
    debug!(?settings, "resolved settings");

    let code = match args.file.as_deref() {
        Some(path) => match loader::load_file(path) {
            Ok(code) => code,
            Err(err) => {
                print_error(&prefix_program(Some(program), &err.to_string()));
                return EXIT_FAILURE;
            }
        },
        None => loader::from_parts(&args.code),
    };

    let cancel = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(program, Arc::clone(&cancel));

    let ctrl = StepControl::new(settings.max_steps, Arc::clone(&cancel));
    let result = match settings.timeout_ms {
        Some(ms) => run_with_timeout(code.clone(), settings.engine, ctrl, ms),
        None => Interpreter::with_config(&code, settings.engine).run_with_control(ctrl),
    };

    let _ = io::stdout().flush();
    match result {
        Ok(()) => EXIT_OK,
        Err(InterpreterError::Canceled) => {
            print_error(&prefix_program(Some(program), "Execution aborted: interrupted"));
            EXIT_INTERRUPTED
        }
        Err(err) => {
            print_interpreter_error(Some(program), &code, &err);
            EXIT_FAILURE
        }
    }
}

/// Ctrl+C sets the cancel flag so the run stops between instructions. A run
/// that is blocked (e.g. `,` waiting on stdin) cannot see the flag, so the
/// handler exits with 130 itself after a short grace period, skipped when the
/// flag was already set.
fn install_interrupt_handler(program: &str, cancel: Arc<AtomicBool>) {
    let program = program.to_string();
    let result = ctrlc::set_handler(move || {
        if !cancel.swap(true, Ordering::SeqCst) {
            thread::sleep(INTERRUPT_GRACE);
        }
        let _ = io::stdout().flush();
        print_error(&prefix_program(Some(&program), "Execution aborted: interrupted"));
        std::process::exit(EXIT_INTERRUPTED);
    });
    if let Err(e) = result {
        warn!(error = %e, "failed to set ctrl+c handler");
    }
}

/// Execute on a worker thread with cooperative cancellation once `timeout_ms` elapses.
fn run_with_timeout(
    code: String,
    engine: EngineConfig,
    ctrl: StepControl,
    timeout_ms: u64,
) -> Result<(), InterpreterError> {
    let cancel = Arc::clone(&ctrl.cancel_flag);
    let (tx, rx) = mpsc::channel::<Result<(), InterpreterError>>();

    thread::spawn(move || {
        let mut bf = Interpreter::with_config(&code, engine);
        let _ = tx.send(bf.run_with_control(ctrl));
    });

    match rx.recv_timeout(Duration::from_millis(timeout_ms)) {
        Ok(res) => res,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            cancel.store(true, Ordering::Relaxed);
            Err(InterpreterError::TimedOut { timeout_ms })
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(InterpreterError::Canceled),
    }
}
