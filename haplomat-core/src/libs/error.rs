use std::path::PathBuf;

use thiserror::Error as ThisError;

/// Classification used to decide how an error is presented and whether the flow can continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Recovered locally by asking the user to fix the configuration
    Configuration,
    /// The flow halts at the current stage only
    ExternalToolMissing,
    /// Shown with the last captured stderr line, no automatic retry
    ExternalProcessFailure,
    /// An expected file is missing after a reported success
    UnexpectedState,
}

#[rustfmt::skip]
#[derive(ThisError, Debug)]
pub enum Error {
    #[error("Failed to open file: {path:?}")]
    Io { path: PathBuf },

    #[error("Input path or file not found: {path:?}")]
    FileNotFound { path: PathBuf },

    #[error("Parameter file {path:?} is missing the mandatory entries: {}", .missing.join(", "))]
    InvalidParameterFile { path: PathBuf, missing: Vec<String> },

    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error("{key} must be a float value between 0 and 1 (e.g. 0.00001 or 1e-5), got {value:?}")]
    OutOfUnitInterval { key: String, value: String },

    #[error("SEED must be an integer value between 0 and 1,000,000,000, got {value:?}")]
    InvalidSeed { value: String },

    #[error("Epsilon value must be <= {bound} (1/(2*n)), got {value:?}")]
    EpsilonAboveBound { value: String, bound: String },

    #[error("RunID must not contain space characters or one of the following characters: _, \\, /, *, ?, :, \", <, >, |, or %. Got {run_id:?}")]
    InvalidRunId { run_id: String },

    #[error("Unknown locus resolution {code:?}")]
    UnknownResolution { code: String },

    #[error("Unknown initialization {value:?}, expected one of equal, numberOccurrence, perturbation, random")]
    UnknownInitialization { value: String },

    #[error("The input file {path:?} contains no genotypes")]
    NoGenotypes { path: PathBuf },

    #[error("No locus resolution chosen")]
    NoResolutions,

    #[error("Please set the path to the Hapl-o-Mat directory")]
    NoInstallation,

    #[error("Please set parameters before starting Hapl-o-Mat")]
    ParametersNotCommitted,

    #[error("A process is already running")]
    AlreadyRunning,

    #[error("External tool not found: {path:?}")]
    ExternalToolMissing { path: PathBuf },

    #[error("Failed to start {program:?}: {message}")]
    Spawn { program: PathBuf, message: String },

    #[error("{tool} did not finish successfully (exit code {code:?}): {last_line}")]
    ExternalProcess { tool: String, code: Option<i32>, last_line: String },

    #[error("Hapl-o-Mat did not finish successfully (exit code {code:?}): {last_line}")]
    RunFailed { code: Option<i32>, last_line: String },

    #[error("Expected result file is missing: {path:?}")]
    MissingResultFile { path: PathBuf },

    #[error("The run log {path:?} has no line containing {marker:?}")]
    MissingLogMarker { path: PathBuf, marker: String },

    #[error("Unknown entry in url_config.txt: {name}")]
    UnknownSource { name: String },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use Error::*;

        match self {
            ExternalToolMissing { .. } | Spawn { .. } => ErrorKind::ExternalToolMissing,
            ExternalProcess { .. } | RunFailed { .. } => ErrorKind::ExternalProcessFailure,
            MissingResultFile { .. } | MissingLogMarker { .. } | Io { .. } => {
                ErrorKind::UnexpectedState
            }
            _ => ErrorKind::Configuration,
        }
    }
}
