use assert_cmd::Command;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::{Read, Write};
use std::process::{Command as StdCommand, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const HELLO: &str = "++++++++++[>+++++++>++++++++++>+++>+<<<<-]>++.>+.+++++++..+++.>++.<<+++++++++++++++.>.+++.------.--------.>+.>.";

/// `bf` with an isolated config file location.
fn cargo_bin() -> Command {
    let mut cmd = Command::cargo_bin("bf").unwrap();
    cmd.env("BF_CONFIG", "/nonexistent/bf.toml")
        .env_remove("BF_NUMBER_OF_CELLS")
        .env_remove("BF_MAX_CELLS")
        .env_remove("BF_MAX_STEPS")
        .env_remove("BF_TIMEOUT_MS")
        .env_remove("RUST_LOG")
        .timeout(Duration::from_secs(5));
    cmd
}

/// `bf` as a plain child process, for tests that need to hold its pipes.
fn spawn_bf(code: &str) -> std::process::Child {
    StdCommand::cargo_bin("bf")
        .unwrap()
        .env("BF_CONFIG", "/nonexistent/bf.toml")
        .env_remove("BF_MAX_STEPS")
        .env_remove("BF_TIMEOUT_MS")
        .env_remove("RUST_LOG")
        .arg(code)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap()
}

fn wait_with_deadline(child: &mut std::process::Child, limit: Duration) -> std::process::ExitStatus {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("bf still running after {limit:?}");
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn write_tempfile(content: &str) -> tempfile::NamedTempFile {
    let mut tf = tempfile::NamedTempFile::new().expect("tempfile");
    write!(tf, "{}", content).unwrap();
    tf
}

#[test]
fn positional_code_prints_cell_value() {
    cargo_bin()
        .arg("+++.")
        .assert()
        .success()
        .stdout("\u{3}")
        .stderr(predicate::str::is_empty());
}

#[test]
fn file_program_runs_hello_world() {
    let tf = write_tempfile(&format!("prints a greeting\n{HELLO}\n"));
    cargo_bin()
        .arg("--file")
        .arg(tf.path())
        .assert()
        .success()
        .stdout("Hello World!\n");
}

#[test]
fn code_starting_with_minus_after_separator() {
    cargo_bin()
        .args(["--", "-."])
        .assert()
        .success()
        .stdout("\u{ff}");
}

#[test]
fn input_is_echoed() {
    cargo_bin()
        .arg(",.")
        .write_stdin("Z")
        .assert()
        .success()
        .stdout("Z");
}

#[test]
fn exhausted_input_is_an_error() {
    cargo_bin()
        .arg(",")
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("input exhausted"));
}

#[test]
fn stray_close_bracket_reports_position() {
    cargo_bin()
        .arg("+.]")
        .assert()
        .code(1)
        .stdout("\u{1}")
        .stderr(
            predicate::str::contains("unbalanced ']'")
                .and(predicate::str::contains("at instruction 2"))
                .and(predicate::str::contains("    ^")),
        );
}

#[test]
fn unmatched_open_bracket_is_an_error() {
    cargo_bin()
        .arg("[[]")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unbalanced '['"));
}

#[test]
fn max_cells_limit_stops_the_run() {
    cargo_bin()
        .args(["--max_cells", "2", ">>>+."])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("max_cells=2"));
}

#[test]
fn small_initial_tape_grows() {
    cargo_bin()
        .args(["-n", "1", ">>>>+++."])
        .assert()
        .success()
        .stdout("\u{3}");
}

#[test]
fn invalid_cell_count_is_a_usage_error() {
    cargo_bin()
        .args(["--number-of-cells", "0", "+"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("number_of_cells must be greater than 0"));

    cargo_bin()
        .args(["-m", "many", "+"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("max_cells must be an integer"));
}

#[test]
fn invalid_env_value_is_rejected() {
    cargo_bin()
        .env("BF_NUMBER_OF_CELLS", "-4")
        .arg("+")
        .assert()
        .code(2);
}

#[test]
fn missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.bf");
    cargo_bin()
        .arg("-f")
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn file_and_code_together_is_a_usage_error() {
    let tf = write_tempfile("+");
    cargo_bin()
        .arg("--file")
        .arg(tf.path())
        .arg("+")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot use positional code together with --file"));
}

#[test]
fn no_program_is_a_usage_error() {
    cargo_bin().assert().code(2);
}

#[test]
fn timeout_aborts_infinite_loop() {
    cargo_bin()
        .args(["--timeout", "100", "+[]"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("wall-clock timeout exceeded (100 ms)"));
}

#[test]
fn step_limit_from_env() {
    cargo_bin()
        .env("BF_MAX_STEPS", "5")
        .arg("+[]")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("step limit exceeded (5)"));
}

#[test]
fn config_file_sets_max_cells() {
    let tf = write_tempfile("[interpreter]\nmax_cells = 1\n");
    cargo_bin()
        .env("BF_CONFIG", tf.path())
        .arg(">>+")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("max_cells=1"));
}

#[test]
fn flag_overrides_config_file() {
    let tf = write_tempfile("[interpreter]\nmax_cells = 1\n");
    cargo_bin()
        .env("BF_CONFIG", tf.path())
        .args(["--max-cells", "unlimited", ">>+."])
        .assert()
        .success()
        .stdout("\u{1}");
}

#[test]
fn debug_logging_goes_to_stderr() {
    cargo_bin()
        .env("RUST_LOG", "tape_bf=debug")
        .arg("+.")
        .assert()
        .success()
        .stdout("\u{1}")
        .stderr(predicate::str::contains("run finished"));
}

#[cfg(unix)]
#[test]
fn sigint_while_blocked_on_input_exits_130() {
    let mut child = spawn_bf(",");
    // Keep stdin open so ',' blocks; give bf time to install its handler.
    let _stdin = child.stdin.take().unwrap();
    thread::sleep(Duration::from_millis(500));

    let killed = StdCommand::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(killed.success());

    let status = wait_with_deadline(&mut child, Duration::from_secs(3));
    assert_eq!(status.code(), Some(130));

    let mut stderr = String::new();
    child.stderr.take().unwrap().read_to_string(&mut stderr).unwrap();
    assert!(stderr.contains("Execution aborted: interrupted"), "stderr: {stderr}");
}

#[cfg(unix)]
#[test]
fn closed_stdout_is_an_io_error() {
    let mut child = spawn_bf("+[.]");
    let mut stdout = child.stdout.take().unwrap();
    let mut first = [0u8; 1];
    stdout.read_exact(&mut first).unwrap();
    assert_eq!(first, [1]);
    drop(stdout);

    let status = wait_with_deadline(&mut child, Duration::from_secs(5));
    assert_eq!(status.code(), Some(1));

    let mut stderr = String::new();
    child.stderr.take().unwrap().read_to_string(&mut stderr).unwrap();
    assert!(stderr.contains("I/O error"), "stderr: {stderr}");
}

#[test]
fn help_says_options_come_first() {
    cargo_bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Options must come before inline code"));
}
