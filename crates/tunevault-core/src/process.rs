//! Non-blocking execution of external tool processes.
//!
//! A spawned process is observed through a [`ProcessHandle`]: reader threads
//! drain stdout and stderr line by line into a shared buffer, and a waiter
//! thread reaps the child and marks the handle complete. The host polls the
//! handle from its scheduler tick; nothing here blocks the caller.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, warn};

/// Exit code reported when the process could not be launched at all.
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = -1;

/// Final result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, or [`LAUNCH_FAILURE_EXIT_CODE`] when the process never
    /// started or was killed by a signal.
    pub exit_code: i32,
    /// Merged stdout and stderr, newline-joined.
    pub output: String,
}

impl ProcessOutput {
    /// True when the process exited with code zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Default)]
struct SharedState {
    lines: Mutex<Vec<String>>,
    exit_code: Mutex<Option<i32>>,
    done: AtomicBool,
}

/// Handle to a running (or already finished) process.
///
/// Completion implies all output lines have been captured: the waiter thread
/// joins the reader threads before setting the completion flag.
#[derive(Debug)]
pub struct ProcessHandle {
    shared: Arc<SharedState>,
    drained: usize,
}

impl ProcessHandle {
    fn running(shared: Arc<SharedState>) -> Self {
        Self { shared, drained: 0 }
    }

    /// Build a handle that is already complete.
    ///
    /// Used for launch failures and by tests that simulate tool output.
    #[must_use]
    pub fn completed(exit_code: i32, output_lines: Vec<String>) -> Self {
        let shared = Arc::new(SharedState::default());
        if let Ok(mut lines) = shared.lines.lock() {
            *lines = output_lines;
        }
        if let Ok(mut code) = shared.exit_code.lock() {
            *code = Some(exit_code);
        }
        shared.done.store(true, Ordering::SeqCst);
        Self { shared, drained: 0 }
    }

    /// Lines captured since the previous drain, in arrival order.
    pub fn drain_lines(&mut self) -> Vec<String> {
        let Ok(lines) = self.shared.lines.lock() else {
            return Vec::new();
        };
        let fresh: Vec<String> = lines[self.drained..].to_vec();
        self.drained = lines.len();
        fresh
    }

    /// True once the process has exited and all output is captured.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.shared.done.load(Ordering::SeqCst)
    }

    /// Non-blocking completion check.
    ///
    /// Returns `None` while the process is still running; once complete,
    /// returns the exit code and the full merged output.
    #[must_use]
    pub fn try_complete(&self) -> Option<ProcessOutput> {
        if !self.is_complete() {
            return None;
        }

        let exit_code = self
            .shared
            .exit_code
            .lock()
            .ok()
            .and_then(|code| *code)
            .unwrap_or(LAUNCH_FAILURE_EXIT_CODE);
        let output = self
            .shared
            .lines
            .lock()
            .map(|lines| lines.join("\n"))
            .unwrap_or_default();

        Some(ProcessOutput { exit_code, output })
    }
}

/// Seam for launching external processes, mockable in tests.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    /// Launch `program` with `args`, optionally in `working_dir`.
    ///
    /// Never fails: a launch error yields an already-completed handle with
    /// [`LAUNCH_FAILURE_EXIT_CODE`] and empty output.
    fn run<'a>(&self, program: &Path, args: &[String], working_dir: Option<&'a Path>)
    -> ProcessHandle;
}

/// [`CommandRunner`] backed by `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &Path, args: &[String], working_dir: Option<&Path>) -> ProcessHandle {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = working_dir {
            command.current_dir(dir);
        }

        debug!(program = %program.display(), ?args, "Launching external process");

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %program.display(), error = %e, "Failed to launch process");
                return ProcessHandle::completed(LAUNCH_FAILURE_EXIT_CODE, Vec::new());
            }
        };

        let shared = Arc::new(SharedState::default());
        let mut readers = Vec::new();

        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_line_reader(stdout, Arc::clone(&shared)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader(stderr, Arc::clone(&shared)));
        }

        let waiter_shared = Arc::clone(&shared);
        std::thread::spawn(move || {
            // wait() reaps the child even on error paths.
            let status = child.wait();
            for reader in readers {
                let _ = reader.join();
            }
            let exit_code = match status {
                Ok(status) => status.code().unwrap_or(LAUNCH_FAILURE_EXIT_CODE),
                Err(e) => {
                    warn!(error = %e, "Failed to wait for process");
                    LAUNCH_FAILURE_EXIT_CODE
                }
            };
            if let Ok(mut code) = waiter_shared.exit_code.lock() {
                *code = Some(exit_code);
            }
            waiter_shared.done.store(true, Ordering::SeqCst);
        });

        ProcessHandle::running(shared)
    }
}

fn spawn_line_reader<R>(stream: R, shared: Arc<SharedState>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines() {
            match line {
                Ok(text) => {
                    if let Ok(mut lines) = shared.lines.lock() {
                        lines.push(text);
                    }
                }
                Err(_) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    fn wait_for_completion(handle: &ProcessHandle) -> ProcessOutput {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(output) = handle.try_complete() {
                return output;
            }
            assert!(Instant::now() < deadline, "process did not finish in time");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn completed_handle_reports_immediately() {
        let handle = ProcessHandle::completed(0, vec!["a".to_string(), "b".to_string()]);
        assert!(handle.is_complete());
        let output = handle.try_complete().expect("should be complete");
        assert!(output.success());
        assert_eq!(output.output, "a\nb");
    }

    #[test]
    fn drain_lines_returns_each_line_once() {
        let mut handle = ProcessHandle::completed(0, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(handle.drain_lines(), vec!["a".to_string(), "b".to_string()]);
        assert!(handle.drain_lines().is_empty());
    }

    #[test]
    fn launch_failure_yields_sentinel_exit_code() {
        let runner = SystemCommandRunner;
        let handle = runner.run(
            &PathBuf::from("/nonexistent/tool-that-does-not-exist"),
            &[],
            None,
        );
        let output = wait_for_completion(&handle);
        assert_eq!(output.exit_code, LAUNCH_FAILURE_EXIT_CODE);
        assert!(output.output.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_and_stderr_merged() {
        let runner = SystemCommandRunner;
        let handle = runner.run(
            &PathBuf::from("/bin/sh"),
            &[
                "-c".to_string(),
                "echo out-line; echo err-line >&2".to_string(),
            ],
            None,
        );
        let output = wait_for_completion(&handle);
        assert!(output.success());
        assert!(output.output.contains("out-line"));
        assert!(output.output.contains("err-line"));
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_code_is_reported() {
        let runner = SystemCommandRunner;
        let handle = runner.run(
            &PathBuf::from("/bin/sh"),
            &["-c".to_string(), "exit 3".to_string()],
            None,
        );
        let output = wait_for_completion(&handle);
        assert_eq!(output.exit_code, 3);
    }
}
