use std::io::Write;
use std::path::Path;
use std::time::Duration;

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::args::{DisplayArgs, SessionArgs};
use crate::error::Error;
use crate::estimation::RunStatus;
use crate::subcommands::show_results::print_results;
use crate::subcommands::{log_notices, open_session, pause};
use crate::utils::format_scientific;

#[doc(hidden)]
#[tracing::instrument(skip(display_args), fields(display = ?display_args))]
pub fn run(
    parameters: &Path,
    poll_seconds: u64,
    display_args: &DisplayArgs,
    args: &SessionArgs,
) -> Result<()> {
    let policy = display_args.policy()?;
    let mut session =
        open_session(args)?.with_poll_interval(Duration::from_secs(poll_seconds));

    let committed = session.commit_parameter_file(parameters)?;
    tracing::info!("Committed\n{}", committed.describe());
    log_notices(&mut session);

    session.start_run()?;

    let stdout = std::io::stdout();
    let mut completion = None;
    while completion.is_none() {
        pause();
        let progress = session.poll_run()?;

        let mut lock = stdout.lock();
        for chunk in &progress.output {
            write!(lock, "{chunk}")?;
        }
        lock.flush()?;

        if let Some(last) = progress.trace.as_ref().and_then(|t| t.last()) {
            tracing::info!(
                "Iteration {}: epsilon {}",
                session.trace().len(),
                format_scientific(*last, 3)
            );
        }

        completion = progress.completion;
    }
    log_notices(&mut session);

    match session.run_status() {
        Some(RunStatus::Succeeded) => {
            if let Some(results) = session.results().and_then(|i| i.result_set()) {
                print_results(results, policy)?;
            }
            Ok(())
        }
        _ => Err(eyre!(match completion {
            Some(completion) => completion.record.failure(),
            None => Error::RunFailed {
                code: None,
                last_line: "no exit status received".into(),
            },
        })),
    }
}
