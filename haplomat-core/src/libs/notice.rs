use color_eyre::Report;

use crate::error::{Error, ErrorKind};

/// Appended to the failures of the external tools.
pub const UPDATE_GUIDANCE: &str = "Please read tutorial for option of manual data update.";
pub const RUN_GUIDANCE: &str =
    "Please check the run log, the input file and the parameter settings before starting again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

/// A message for the user, independent of how a front-end shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotice {
    pub kind: NoticeKind,
    pub title: String,
    pub body: String,
}

impl UserNotice {
    pub fn new(kind: NoticeKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeKind::Info, title, body)
    }

    pub fn warning(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeKind::Warning, title, body)
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, title, body)
    }

    /// Classify a report. Reports that do not carry an [`Error`] are unexpected and shown as errors.
    pub fn from_report(report: &Report) -> Self {
        match report.downcast_ref::<Error>() {
            Some(err) => Self::from(err),
            None => Self::error("Error", format!("{report:#}")),
        }
    }

    /// Emit the notice through tracing, used by the headless front-end.
    pub fn log(&self) {
        match self.kind {
            NoticeKind::Info => tracing::info!("{}: {}", self.title, self.body),
            NoticeKind::Warning => tracing::warn!("{}: {}", self.title, self.body),
            NoticeKind::Error => tracing::error!("{}: {}", self.title, self.body),
        }
    }
}

impl From<&Error> for UserNotice {
    fn from(err: &Error) -> Self {
        match err.kind() {
            ErrorKind::Configuration => Self::warning("Invalid configuration", err.to_string()),
            ErrorKind::ExternalToolMissing => Self::error("Tool not available", err.to_string()),
            ErrorKind::ExternalProcessFailure => match err {
                Error::ExternalProcess { last_line, .. } => Self::error(
                    "Error: Update not successful.",
                    format!("{last_line}\n{UPDATE_GUIDANCE}"),
                ),
                Error::RunFailed { last_line, .. } => Self::error(
                    "Error: Hapl-o-Mat run not successful.",
                    format!("{last_line}\n{RUN_GUIDANCE}"),
                ),
                _ => Self::error("Error: Hapl-o-Mat run not successful.", err.to_string()),
            },
            ErrorKind::UnexpectedState => Self::error("Unexpected state", err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use color_eyre::eyre::eyre;

    use super::*;

    #[test]
    fn notices_follow_error_kind() {
        let notice = UserNotice::from(&Error::InvalidRunId {
            run_id: "a b".into(),
        });
        assert_eq!(NoticeKind::Warning, notice.kind);

        let notice = UserNotice::from(&Error::ExternalToolMissing {
            path: PathBuf::from("haplomat"),
        });
        assert_eq!(NoticeKind::Error, notice.kind);

        let notice = UserNotice::from(&Error::ExternalProcess {
            tool: "BuildData".into(),
            code: Some(1),
            last_line: "urlopen error".into(),
        });
        assert!(notice.body.starts_with("urlopen error\n"));
        assert!(notice.body.ends_with(UPDATE_GUIDANCE));

        let notice = UserNotice::from(&Error::RunFailed {
            code: Some(3),
            last_line: "Unknown locus XYZ".into(),
        });
        assert_eq!("Error: Hapl-o-Mat run not successful.", notice.title);
        assert_eq!(format!("Unknown locus XYZ\n{RUN_GUIDANCE}"), notice.body);
    }

    #[test]
    fn reports_are_downcast() {
        let report = eyre!(Error::NoGenotypes {
            path: PathBuf::from("input.txt")
        });
        assert_eq!(NoticeKind::Warning, UserNotice::from_report(&report).kind);

        let report = eyre!("something else");
        assert_eq!(NoticeKind::Error, UserNotice::from_report(&report).kind);
    }
}
