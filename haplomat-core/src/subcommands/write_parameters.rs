use std::path::PathBuf;

use color_eyre::{eyre::WrapErr, Result};

use crate::args::{EstimationArgs, SessionArgs};
use crate::error::Error;
use crate::parameters::{LocusResolutionMap, RunParameters};
use crate::subcommands::{log_notices, open_session};

/// Resolutions not given on the command line are taken from the last saved parameter
/// set, the remaining loci are ignored.
#[doc(hidden)]
#[tracing::instrument(skip(estimation))]
pub fn run(
    input: PathBuf,
    output: PathBuf,
    run_id: String,
    resolutions: Option<&str>,
    estimation: &EstimationArgs,
    args: &SessionArgs,
) -> Result<()> {
    // The estimator runs in the installation directory
    let input = std::path::absolute(&input).wrap_err(Error::Io { path: input })?;
    let output = std::path::absolute(&output).wrap_err(Error::Io { path: output })?;

    let mut session = open_session(args)?;

    let loaded = session.load_defaults();
    let mut previous = loaded
        .last_saved
        .map(|params| params.resolutions)
        .unwrap_or_default();
    if let Some(resolutions) = resolutions {
        for (locus, resolution) in LocusResolutionMap::from_display_value(resolutions)?.iter() {
            previous.set(locus.clone(), *resolution);
        }
    }

    let (summary, resolved) = session.inspect_input(&input, &previous)?;
    log_notices(&mut session);

    let defaults = estimation.apply(&loaded.defaults);
    let params = RunParameters::from_defaults(input, output, run_id, resolved.map, &defaults);

    let committed =
        session.commit_parameters(params, summary.dialect, Some(summary.genotype_count))?;
    let copy = committed.params.parameter_copy(committed.dialect);

    println!("{}", committed.describe());
    println!("Parameters saved as {}", copy.display());

    Ok(())
}
