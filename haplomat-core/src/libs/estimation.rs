use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use color_eyre::eyre::eyre;
use color_eyre::{Report, Result};
use serde::Serialize;

use crate::error::Error;
use crate::io::{remove_if_exists, write_file};
use crate::loci::InputDialect;
use crate::parameters::{RunParameters, RunPaths};
use crate::process::{classify_exit, last_non_empty_line, ExternalProcess, Outcome, ProcessEvent};
use crate::reference::Installation;
use crate::results::{ingest, read_trace, Ingestion};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub const STARTED: &str = "Hapl-o-Mat started.";
pub const FINISHED: &str = "Finished!";
pub const CANCELLED: &str = "Cancelled!";
pub const FAILED: &str = "Error!";

pub fn timestamp(at: DateTime<Local>) -> String {
    at.format("%a %b %e %H:%M:%S %Y").to_string()
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    Succeeded,
    Cancelled,
    Failed,
}

impl From<Outcome> for RunStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Succeeded => Self::Succeeded,
            Outcome::Cancelled => Self::Cancelled,
            Outcome::Failed => Self::Failed,
        }
    }
}

/// One estimation run, owned by the orchestrator until the process has exited.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub dialect: InputDialect,
    /// Everything shown in the run log so far
    pub stdout: String,
    pub started: DateTime<Local>,
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    /// Last non-empty line the estimator wrote to stderr
    pub last_error: Option<String>,
}

impl RunRecord {
    /// The error shown for a run that did not succeed. Without stderr output the exit
    /// code stands in for the message.
    pub fn failure(&self) -> Error {
        Error::RunFailed {
            code: self.exit_code,
            last_line: self
                .last_error
                .clone()
                .unwrap_or_else(|| format!("exit code {:?}", self.exit_code)),
        }
    }
}

/// Where and how the estimator is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
    pub program: PathBuf,
    pub working_dir: PathBuf,
}

impl Launcher {
    pub fn for_installation(installation: &Installation) -> Self {
        Self {
            program: installation.estimator(),
            working_dir: installation.root.clone(),
        }
    }
}

#[derive(Debug)]
pub struct RunCompletion {
    pub record: RunRecord,
    pub log_path: PathBuf,
    /// Set when the run log could not be written
    pub log_error: Option<Report>,
    /// Results of a succeeded run
    pub ingestion: Option<Result<Ingestion>>,
}

#[derive(Debug, Default)]
pub struct RunProgress {
    /// Output fragments in delivery order, not necessarily full lines
    pub output: Vec<String>,
    /// Full trace, present when the trace file was read during this poll
    pub trace: Option<Vec<f64>>,
    pub completion: Option<RunCompletion>,
}

struct ActiveRun {
    process: ExternalProcess,
    record: RunRecord,
    paths: RunPaths,
    last_trace_read: Instant,
    /// Output not yet handed out by `poll`
    unsent: Vec<String>,
}

/// Runs the estimator for a committed parameter set and follows it to completion.
pub struct RunOrchestrator {
    launcher: Launcher,
    poll_interval: Duration,
    active: Option<ActiveRun>,
    last_status: Option<RunStatus>,
}

impl RunOrchestrator {
    pub fn new(launcher: Launcher) -> Self {
        Self {
            launcher,
            poll_interval: DEFAULT_POLL_INTERVAL,
            active: None,
            last_status: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Status of the current run, or of the last finished one.
    pub fn status(&self) -> Option<RunStatus> {
        match &self.active {
            Some(run) => Some(run.record.status),
            None => self.last_status,
        }
    }

    /// Start the estimator. A trace left over from an earlier run with the same output
    /// paths is deleted first.
    pub fn start(&mut self, params: &RunParameters, dialect: InputDialect) -> Result<()> {
        if self.active.is_some() {
            return Err(eyre!(Error::AlreadyRunning));
        }

        if !self.launcher.program.is_file() {
            return Err(eyre!(Error::ExternalToolMissing {
                path: self.launcher.program.clone()
            }));
        }

        let paths = params.paths();
        remove_if_exists(&paths.epsilon)?;

        let started = Local::now();
        let process = ExternalProcess::spawn(
            &self.launcher.program,
            &[dialect.as_arg().to_string()],
            &self.launcher.working_dir,
        )?;

        tracing::info!("Hapl-o-Mat started with {dialect}");

        let header = format!("{STARTED}\n{}\n", timestamp(started));

        self.last_status = None;
        self.active = Some(ActiveRun {
            process,
            record: RunRecord {
                dialect,
                stdout: header.clone(),
                started,
                status: RunStatus::Pending,
                exit_code: None,
                last_error: None,
            },
            paths,
            last_trace_read: Instant::now(),
            unsent: vec![header],
        });

        Ok(())
    }

    /// Ask for the run to stop. The exit is reported as cancelled by a later poll.
    pub fn cancel(&mut self) -> Result<()> {
        if let Some(run) = self.active.as_mut() {
            tracing::info!("Cancelling Hapl-o-Mat");
            run.process.kill()?;
        }
        Ok(())
    }

    /// Non-blocking. Returns new output, starting with the run header, re-reads the trace
    /// once per poll interval and finalizes the run once the process has exited.
    pub fn poll(&mut self) -> Result<RunProgress> {
        let mut progress = RunProgress::default();

        let Some(run) = self.active.as_mut() else {
            return Ok(progress);
        };
        progress.output.append(&mut run.unsent);

        let mut events = run.process.drain();
        let exit = run.process.try_exit()?;
        if exit.is_some() {
            events.extend(run.process.drain_remaining());
        }

        for event in events {
            let text = match event {
                ProcessEvent::Stdout(text) => text,
                ProcessEvent::Stderr(text) => {
                    tracing::warn!("Hapl-o-Mat: {}", text.trim_end());
                    if let Some(line) = last_non_empty_line(&text) {
                        run.record.last_error = Some(line.to_string());
                    }
                    text
                }
            };
            run.record.stdout.push_str(&text);
            progress.output.push(text);
        }

        if exit.is_some() || run.last_trace_read.elapsed() >= self.poll_interval {
            progress.trace = Some(read_trace(&run.paths.epsilon));
            run.last_trace_read = Instant::now();
        }

        let Some(exit) = exit else {
            return Ok(progress);
        };

        // Process has exited, the run is finalized
        let Some(mut run) = self.active.take() else {
            return Ok(progress);
        };

        let outcome = classify_exit(&exit);
        let marker = match outcome {
            Outcome::Succeeded => FINISHED,
            Outcome::Cancelled => CANCELLED,
            Outcome::Failed => FAILED,
        };
        let end = format!("\n{marker}\n{}\n", timestamp(Local::now()));
        run.record.stdout.push_str(&end);
        progress.output.push(end);

        run.record.status = outcome.into();
        run.record.exit_code = exit.code;
        self.last_status = Some(run.record.status);

        let log_error = match write_file(&run.paths.log, &run.record.stdout) {
            Ok(()) => {
                tracing::info!("Log file saved as {:?}", run.paths.log);
                None
            }
            Err(err) => {
                tracing::error!("Failed to save the run log: {err:#}");
                Some(err)
            }
        };

        tracing::info!("Hapl-o-Mat ended: {outcome:?} (exit code {:?})", exit.code);

        let ingestion = match outcome {
            Outcome::Succeeded => Some(ingest(&run.paths)),
            _ => None,
        };

        progress.completion = Some(RunCompletion {
            record: run.record,
            log_path: run.paths.log,
            log_error,
            ingestion,
        });

        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_estimator_is_rejected_before_spawn() {
        let launcher = Launcher::for_installation(&Installation::new("tests/data/no_installation"));
        let mut orchestrator = RunOrchestrator::new(launcher);

        let params = RunParameters::from_defaults(
            PathBuf::from("tests/data/mac_input.txt"),
            PathBuf::from("tests/results"),
            "Missing".into(),
            Default::default(),
            &Default::default(),
        );

        let report = orchestrator.start(&params, InputDialect::Mac).unwrap_err();
        assert!(matches!(
            report.downcast_ref::<Error>(),
            Some(Error::ExternalToolMissing { .. })
        ));
        assert!(!orchestrator.is_running());
        assert_eq!(None, orchestrator.status());
    }

    #[test]
    fn failure_prefers_stderr() {
        let mut record = RunRecord {
            dialect: InputDialect::Mac,
            stdout: String::new(),
            started: Local::now(),
            status: RunStatus::Failed,
            exit_code: Some(2),
            last_error: None,
        };
        assert_eq!(
            "Hapl-o-Mat did not finish successfully (exit code Some(2)): exit code Some(2)",
            record.failure().to_string()
        );

        record.last_error = Some("Unknown locus".into());
        assert!(matches!(
            record.failure(),
            Error::RunFailed { last_line, .. } if last_line == "Unknown locus"
        ));
    }

    #[test]
    fn idle_poll_is_empty() {
        let mut orchestrator = RunOrchestrator::new(Launcher {
            program: PathBuf::from("haplomat"),
            working_dir: PathBuf::from("."),
        });
        let progress = orchestrator.poll().unwrap();
        assert!(progress.output.is_empty());
        assert!(progress.completion.is_none());
    }
}
