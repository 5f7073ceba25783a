use chrono::Local;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::Serialize;

use crate::error::{Error, ErrorKind};
use crate::notice::UserNotice;
use crate::process::{classify_exit, last_non_empty_line, ExternalProcess, Outcome, ProcessEvent};
use crate::reference::{Installation, ReferenceData, StatusIndicator};

const TOOL: &str = "BuildData";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    Running,
    Succeeded,
    Cancelled,
    Failed,
    Unavailable,
}

impl UpdateState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Idle | Self::Running)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    Cancelled,
    Failed { last_line: String },
    Unavailable,
}

impl UpdateOutcome {
    pub fn notice(&self) -> Option<UserNotice> {
        match self {
            Self::Updated | Self::Cancelled => None,
            Self::Failed { last_line } => Some(UserNotice::from(&Error::ExternalProcess {
                tool: TOOL.into(),
                code: None,
                last_line: last_line.clone(),
            })),
            Self::Unavailable => Some(UserNotice::error(
                "Data download not possible.",
                "Please check the correct installation of the Hapl-o-Mat file system.",
            )),
        }
    }

    /// Indicator for the reference data after the update. `reference` is the data
    /// installed once the update has ended.
    pub fn indicator(&self, reference: Option<&ReferenceData>) -> StatusIndicator {
        match (self, reference) {
            (Self::Unavailable, _) => StatusIndicator::Unavailable,
            (Self::Updated, Some(data)) => data.indicator(),
            (Self::Updated, None) => StatusIndicator::Error,
            (Self::Failed { .. } | Self::Cancelled, Some(_)) => StatusIndicator::Caution,
            (Self::Failed { .. } | Self::Cancelled, None) => StatusIndicator::Error,
        }
    }

    /// Status text for the reference data after the update.
    pub fn status_text(&self, reference: Option<&ReferenceData>) -> String {
        let current = reference
            .map(ReferenceData::status_text)
            .unwrap_or_else(|| "No data files available. Please update!".into());
        match (self, reference) {
            (Self::Unavailable, _) => format!(
                "Data download not possible.\nPlease check the correct installation of Hapl-o-Mat file system.\n{current}"
            ),
            (Self::Failed { .. } | Self::Cancelled, Some(_)) => {
                format!("Data download aborted.\nAvailable data is used.\n{current}")
            }
            _ => current,
        }
    }
}

#[derive(Debug, Default)]
pub struct UpdateProgress {
    /// Output lines of the tool and status messages, in order
    pub output: Vec<String>,
    /// Set exactly once, when the update reaches a terminal state
    pub outcome: Option<UpdateOutcome>,
}

/// Refreshes the reference data by running the `BuildData` tool of the installation.
pub struct DataUpdate {
    state: UpdateState,
    process: Option<ExternalProcess>,
    pending: Option<UpdateOutcome>,
    output: Vec<String>,
}

impl DataUpdate {
    pub fn new() -> Self {
        Self {
            state: UpdateState::Idle,
            process: None,
            pending: None,
            output: vec![],
        }
    }

    pub fn state(&self) -> UpdateState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == UpdateState::Running
    }

    /// Running, or ended with an outcome that was not polled yet.
    pub fn needs_poll(&self) -> bool {
        self.is_running() || self.pending.is_some()
    }

    /// Start the update tool. A missing tool ends the update as unavailable without
    /// spawning anything; the outcome is reported by the next [`DataUpdate::poll`].
    pub fn start(&mut self, installation: &Installation, python: &str) -> Result<()> {
        if self.is_running() {
            return Err(eyre!(Error::AlreadyRunning));
        }
        self.pending = None;
        self.output = vec!["Starting download ...".into()];

        let Some(tool) = installation.update_tool(python) else {
            tracing::warn!(
                "No update tool in {:?}",
                installation.prepare_data_dir()
            );
            self.finish(UpdateState::Unavailable, UpdateOutcome::Unavailable);
            return Ok(());
        };

        match ExternalProcess::spawn(&tool.program, &tool.args, &tool.working_dir) {
            Ok(process) => {
                self.process = Some(process);
                self.state = UpdateState::Running;
                Ok(())
            }
            Err(report) => {
                let kind = report.downcast_ref::<Error>().map(Error::kind);
                match kind {
                    Some(ErrorKind::ExternalToolMissing) => {
                        tracing::warn!("{report}");
                        self.finish(UpdateState::Unavailable, UpdateOutcome::Unavailable);
                        Ok(())
                    }
                    _ => {
                        self.finish(
                            UpdateState::Failed,
                            UpdateOutcome::Failed {
                                last_line: report.to_string(),
                            },
                        );
                        Ok(())
                    }
                }
            }
        }
    }

    pub fn cancel(&mut self) -> Result<()> {
        if let Some(process) = self.process.as_mut() {
            process.kill()?;
        }
        Ok(())
    }

    /// Non-blocking. Forwards new output and reports the outcome once.
    pub fn poll(&mut self) -> Result<UpdateProgress> {
        let mut progress = UpdateProgress {
            output: std::mem::take(&mut self.output),
            outcome: None,
        };

        if let Some(process) = self.process.as_mut() {
            let mut events = process.drain();
            let exit = process.try_exit()?;
            if exit.is_some() {
                events.extend(process.drain_remaining());
            }

            let mut stderr = String::new();
            for event in events {
                match event {
                    ProcessEvent::Stdout(text) => progress.output.push(text),
                    ProcessEvent::Stderr(text) => stderr.push_str(&text),
                }
            }

            if let Some(last_line) = last_non_empty_line(&stderr) {
                // Failure is terminal, a later exit must not override it
                tracing::error!("{TOOL} reported an error: {last_line}");
                let last_line = last_line.to_string();
                if exit.is_none() {
                    process.kill()?;
                }
                self.process = None;
                self.finish(UpdateState::Failed, UpdateOutcome::Failed { last_line });
            } else if let Some(exit) = exit {
                let outcome = match classify_exit(&exit) {
                    Outcome::Succeeded => {
                        self.output.push(format!(
                            "All data files updated.\n{}",
                            Local::now().format("%a %b %e %H:%M:%S %Y")
                        ));
                        (UpdateState::Succeeded, UpdateOutcome::Updated)
                    }
                    Outcome::Cancelled => {
                        self.output.push("Data download cancelled.".into());
                        (UpdateState::Cancelled, UpdateOutcome::Cancelled)
                    }
                    Outcome::Failed => {
                        let last_line = progress
                            .output
                            .iter()
                            .rev()
                            .find_map(|chunk| last_non_empty_line(chunk))
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("exit code {:?}", exit.code));
                        (UpdateState::Failed, UpdateOutcome::Failed { last_line })
                    }
                };
                self.process = None;
                self.finish(outcome.0, outcome.1);
            }
        }

        progress.output.append(&mut self.output);
        progress.outcome = self.pending.take();
        Ok(progress)
    }

    fn finish(&mut self, state: UpdateState, outcome: UpdateOutcome) {
        tracing::info!("Data update ended: {outcome:?}");
        self.state = state;
        self.pending = Some(outcome);
    }
}
