use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::Serialize;

use crate::error::Error;
use crate::io::spawn_line_pump;

/// How long output still in flight is collected after the process has exited.
const DRAIN_AFTER_EXIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Stdout(String),
    Stderr(String),
}

/// Terminal classification of an external process.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitState {
    /// The process was killed because the user asked for it
    pub killed_by_request: bool,
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
}

/// Killed on request is a cancellation whatever the exit code. Anything but a normal
/// exit with code 0 is a failure.
pub fn classify_exit(exit: &ExitState) -> Outcome {
    match (exit.killed_by_request, exit.code) {
        (true, _) => Outcome::Cancelled,
        (false, Some(0)) => Outcome::Succeeded,
        (false, _) => Outcome::Failed,
    }
}

pub fn last_non_empty_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}

/// A spawned child whose stdout and stderr are pumped into a channel by reader threads.
/// Everything else happens on the caller's thread through non-blocking calls.
pub struct ExternalProcess {
    program: PathBuf,
    child: Child,
    rx: Receiver<ProcessEvent>,
    kill_requested: bool,
    exit: Option<ExitState>,
}

impl ExternalProcess {
    pub fn spawn(program: &Path, args: &[String], working_dir: &Path) -> Result<Self> {
        tracing::debug!("Spawning {program:?} {args:?} in {working_dir:?}");

        let mut child = Command::new(program)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => eyre!(Error::ExternalToolMissing {
                    path: program.to_path_buf()
                }),
                _ => eyre!(Error::Spawn {
                    program: program.to_path_buf(),
                    message: err.to_string(),
                }),
            })?;

        let (tx, rx) = channel();

        if let Some(stdout) = child.stdout.take() {
            spawn_line_pump(stdout, tx.clone(), ProcessEvent::Stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_pump(stderr, tx, ProcessEvent::Stderr);
        }

        tracing::info!("Started {program:?} (pid {})", child.id());

        Ok(Self {
            program: program.to_path_buf(),
            child,
            rx,
            kill_requested: false,
            exit: None,
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Output received since the last call, in delivery order.
    pub fn drain(&mut self) -> Vec<ProcessEvent> {
        self.rx.try_iter().collect()
    }

    /// Kill the process on behalf of the user. The exit is then classified as cancelled,
    /// unless the process had already exited on its own.
    pub fn kill(&mut self) -> Result<()> {
        if self.try_exit()?.is_some() {
            return Ok(());
        }
        self.kill_requested = true;
        match self.child.kill() {
            Ok(()) => {
                tracing::info!("Killed {:?}", self.program);
                Ok(())
            }
            // Already exited
            Err(err) if err.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(err) => Err(eyre!(Error::Spawn {
                program: self.program.clone(),
                message: err.to_string(),
            })),
        }
    }

    /// Non-blocking exit check. Once the process has exited the same state is returned.
    pub fn try_exit(&mut self) -> Result<Option<ExitState>> {
        if let Some(exit) = self.exit {
            return Ok(Some(exit));
        }

        let status = self.child.try_wait().map_err(|err| {
            eyre!(Error::Spawn {
                program: self.program.clone(),
                message: err.to_string(),
            })
        })?;

        Ok(status.map(|status| {
            let exit = ExitState {
                killed_by_request: self.kill_requested,
                code: status.code(),
            };
            tracing::debug!("{:?} exited with {status}", self.program);
            self.exit = Some(exit);
            exit
        }))
    }

    /// Collect output still in flight after exit, until both streams close or a short
    /// grace period passes.
    pub fn drain_remaining(&mut self) -> Vec<ProcessEvent> {
        let deadline = Instant::now() + DRAIN_AFTER_EXIT;
        let mut events = vec![];

        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(left) {
                Ok(event) => events.push(event),
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    tracing::debug!("Output of {:?} still open after exit", self.program);
                    break;
                }
            }
        }

        events
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.try_exit(), Ok(None))
    }
}

impl Drop for ExternalProcess {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_classification() {
        let exit = |killed_by_request, code| ExitState {
            killed_by_request,
            code,
        };

        assert_eq!(Outcome::Cancelled, classify_exit(&exit(true, Some(0))));
        assert_eq!(Outcome::Cancelled, classify_exit(&exit(true, None)));
        assert_eq!(Outcome::Cancelled, classify_exit(&exit(true, Some(9))));
        assert_eq!(Outcome::Succeeded, classify_exit(&exit(false, Some(0))));
        assert_eq!(Outcome::Failed, classify_exit(&exit(false, Some(1))));
        assert_eq!(Outcome::Failed, classify_exit(&exit(false, None)));
    }

    #[test]
    fn last_line_skips_blank_lines() {
        assert_eq!(Some("boom"), last_non_empty_line("a\nboom\n\n  \n"));
        assert_eq!(None, last_non_empty_line("\n"));
    }

    #[cfg(unix)]
    #[test]
    fn kill_after_exit_is_not_a_cancellation() {
        let mut process = ExternalProcess::spawn(
            Path::new("/bin/sh"),
            &["-c".to_string(), "exit 0".to_string()],
            Path::new("."),
        )
        .unwrap();

        // Exited but not yet observed through `try_exit`
        std::thread::sleep(Duration::from_millis(500));
        process.kill().unwrap();

        let exit = process.try_exit().unwrap().unwrap();
        assert!(!exit.killed_by_request);
        assert_eq!(Outcome::Succeeded, classify_exit(&exit));
    }

    #[cfg(unix)]
    #[test]
    fn kill_of_running_process_is_a_cancellation() {
        let mut process = ExternalProcess::spawn(
            Path::new("/bin/sh"),
            &["-c".to_string(), "exec sleep 30".to_string()],
            Path::new("."),
        )
        .unwrap();

        process.kill().unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        let exit = loop {
            if let Some(exit) = process.try_exit().unwrap() {
                break exit;
            }
            assert!(Instant::now() < deadline, "process was not killed");
            std::thread::sleep(Duration::from_millis(20));
        };
        assert_eq!(Outcome::Cancelled, classify_exit(&exit));
    }

    #[test]
    fn missing_program_is_reported() {
        let report = ExternalProcess::spawn(
            Path::new("tests/data/no_such_program"),
            &[],
            Path::new("."),
        )
        .err()
        .unwrap();
        assert!(matches!(
            report.downcast_ref::<Error>(),
            Some(Error::ExternalToolMissing { .. })
        ));
    }
}
