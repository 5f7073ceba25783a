use std::thread;
use std::time::Duration;

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::args::SessionArgs;
use crate::error::Error;
use crate::session::Session;

/// Probe a genotype file
pub mod inspect_input;

/// Build, validate and commit a parameter set
pub mod write_parameters;

/// Run the estimator to completion
pub mod estimate;

/// Statistics, tables and plots of a finished run
pub mod show_results;

/// Refresh the reference data
pub mod update_data;

/// Download sources of the reference data
pub mod data_sources;

/// Interval of the headless poll loops.
const POLL_SLEEP: Duration = Duration::from_millis(200);

/// Open the session in the configuration directory. A given installation directory
/// replaces the recorded one.
#[doc(hidden)]
pub fn open_session(args: &SessionArgs) -> Result<Session> {
    let mut session = Session::open(&args.config_dir);
    if let Some(python) = &args.python {
        session = session.with_python(python);
    }

    if let Some(dir) = &args.installation {
        session.select_installation(dir)?;
    }

    if session.installation().is_none() {
        return Err(eyre!(Error::NoInstallation));
    }

    Ok(session)
}

/// Print the queued notices through tracing.
#[doc(hidden)]
pub fn log_notices(session: &mut Session) {
    for notice in session.take_notices() {
        notice.log();
    }
}

#[doc(hidden)]
pub fn pause() {
    thread::sleep(POLL_SLEEP);
}
