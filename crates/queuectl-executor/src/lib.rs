//! Subprocess invocation primitive: run a command with an optional wall-clock
//! timeout, return `{exit_code, stdout, stderr, duration_ms, timed_out}`.
//!
//! This is deliberately blocking: the worker loop is single-threaded and
//! cooperative (spec.md §5 — no in-process async), so `execute` is a plain
//! function over `std::process::Command`, not a future.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const SHELL_METACHARACTERS: &[&str] = &["|", ">", "<", "&", "&&", "||", ";"];

/// Outcome of running one job command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: i64,
    pub timed_out: bool,
}

/// Run `command`, waiting at most `timeout_s` seconds (no limit if `None` or
/// `<= 0`).
///
/// Shell metacharacters route the command through the host shell; otherwise
/// it is tokenized POSIX-style and invoked directly, falling back to the
/// shell if tokenization fails or the tokenized program can't be found (a
/// shell builtin such as `exit` or `cd`, for instance).
pub fn execute(command: &str, timeout_s: Option<i64>) -> ExecutionResult {
    let start = Instant::now();
    let timeout = timeout_s.filter(|t| *t > 0).map(|t| Duration::from_secs(t as u64));

    let direct = !SHELL_METACHARACTERS.iter().any(|op| command.contains(op));
    let spawned = build_command(command, direct)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let spawned = match spawned {
        Err(e) if direct && e.kind() == std::io::ErrorKind::NotFound => shell_command(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn(),
        other => other,
    };

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            return ExecutionResult {
                exit_code: -1,
                stdout: String::new(),
                stderr: format!("Execution error: {e}"),
                duration_ms: elapsed_ms(start),
                timed_out: false,
            }
        }
    };

    let readers = PipeReaders::spawn(&mut child);

    match timeout {
        Some(timeout) => wait_with_timeout(&mut child, readers, timeout, timeout_s.unwrap_or(0), start),
        None => wait_to_completion(child, readers, start),
    }
}

fn build_command(command: &str, attempt_direct: bool) -> Command {
    if attempt_direct {
        if let Some(mut tokens) = shlex::split(command).filter(|t| !t.is_empty()) {
            let program = tokens.remove(0);
            let mut cmd = Command::new(program);
            cmd.args(tokens);
            return cmd;
        }
    }

    shell_command(command)
}

fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

/// Drains a child's stdout/stderr on background threads as soon as it's
/// spawned, independent of whether the caller is also polling `try_wait`.
/// Without this, a child that fills its pipe buffer before exiting blocks on
/// `write()` forever while nothing reads the other end, so `try_wait` never
/// observes the exit and the job gets killed and misreported as timed out.
struct PipeReaders {
    stdout: JoinHandle<String>,
    stderr: JoinHandle<String>,
}

impl PipeReaders {
    fn spawn(child: &mut Child) -> Self {
        let stdout = read_pipe_in_background(child.stdout.take());
        let stderr = read_pipe_in_background(child.stderr.take());
        Self { stdout, stderr }
    }

    fn join(self) -> (String, String) {
        let stdout = self.stdout.join().unwrap_or_default();
        let stderr = self.stderr.join().unwrap_or_default();
        (stdout, stderr)
    }
}

fn read_pipe_in_background<R>(pipe: Option<R>) -> JoinHandle<String>
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

fn wait_to_completion(mut child: Child, readers: PipeReaders, start: Instant) -> ExecutionResult {
    let wait_result = child.wait();
    let (stdout, stderr) = readers.join();

    match wait_result {
        Ok(status) => ExecutionResult {
            exit_code: status.code().unwrap_or(-1) as i64,
            stdout,
            stderr,
            duration_ms: elapsed_ms(start),
            timed_out: false,
        },
        Err(e) => ExecutionResult {
            exit_code: -1,
            stdout,
            stderr: format!("Execution error: {e}"),
            duration_ms: elapsed_ms(start),
            timed_out: false,
        },
    }
}

fn wait_with_timeout(
    child: &mut Child,
    readers: PipeReaders,
    timeout: Duration,
    timeout_s: i64,
    start: Instant,
) -> ExecutionResult {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let (stdout, stderr) = readers.join();
                return ExecutionResult {
                    exit_code: status.code().unwrap_or(-1) as i64,
                    stdout,
                    stderr,
                    duration_ms: elapsed_ms(start),
                    timed_out: false,
                };
            }
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    let (stdout, mut stderr) = readers.join();
                    stderr.push_str(&format!("\n[TIMEOUT after {timeout_s}s]"));
                    return ExecutionResult {
                        exit_code: -1,
                        stdout,
                        stderr,
                        duration_ms: elapsed_ms(start),
                        timed_out: true,
                    };
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(e) => {
                let _ = readers.join();
                return ExecutionResult {
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: format!("Execution error: {e}"),
                    duration_ms: elapsed_ms(start),
                    timed_out: false,
                }
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> i64 {
    start.elapsed().as_millis() as i64
}
