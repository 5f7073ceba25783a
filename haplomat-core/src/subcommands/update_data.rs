use std::io::Write;

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::args::SessionArgs;
use crate::data_update::UpdateOutcome;
use crate::error::Error;
use crate::subcommands::{log_notices, open_session, pause};

#[doc(hidden)]
#[tracing::instrument]
pub fn run(args: &SessionArgs) -> Result<()> {
    let mut session = open_session(args)?;
    println!("{}", session.reference_status());

    session.start_data_update()?;
    log_notices(&mut session);

    let stdout = std::io::stdout();
    let outcome = loop {
        let progress = session.poll_data_update()?;

        let mut lock = stdout.lock();
        for line in &progress.output {
            writeln!(lock, "{}", line.trim_end())?;
        }
        lock.flush()?;

        if let Some(outcome) = progress.outcome {
            break outcome;
        }
        pause();
    };

    log_notices(&mut session);
    println!("{}", session.reference_status());

    match outcome {
        UpdateOutcome::Updated | UpdateOutcome::Cancelled => Ok(()),
        UpdateOutcome::Unavailable => Err(eyre!(Error::ExternalToolMissing {
            path: session
                .installation()
                .map(|i| i.prepare_data_dir())
                .unwrap_or_default(),
        })),
        UpdateOutcome::Failed { last_line } => Err(eyre!(Error::ExternalProcess {
            tool: "BuildData".into(),
            code: None,
            last_line,
        })),
    }
}
