use clap::Parser;
use std::env;

use tape_bf::commands::run::{self, RunArgs};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "bf",
    version,
    about = "Run a Brainfuck program on a growable tape",
    after_help = "Options must come before inline code: everything after the first code part is program text.\n\
                  Input (`,`) reads one byte from stdin; running out of input is an error.\n\
                  Logging goes to stderr and is controlled by RUST_LOG (e.g. RUST_LOG=tape_bf=debug)."
)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    // We still pull the program name for error message consistency
    let program = env::args().next().unwrap_or_else(|| String::from("bf"));
    let program = std::path::Path::new(&program)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("bf")
        .to_string();

    let cli = Cli::parse();
    init_logging();

    let code = run::run(&program, cli.run);
    std::process::exit(code);
}
