use std::path::Path;

use color_eyre::Result;

use crate::args::SessionArgs;
use crate::parameters::LocusResolutionMap;
use crate::subcommands::{log_notices, open_session};
use crate::utils::format_scientific;

#[doc(hidden)]
#[tracing::instrument]
pub fn run(file: &Path, args: &SessionArgs) -> Result<()> {
    let mut session = open_session(args)?;
    let (summary, resolved) = session.inspect_input(file, &LocusResolutionMap::new())?;
    log_notices(&mut session);

    println!("Input file: {}", summary.path.display());
    println!("Format: {} ({})", summary.dialect, summary.dialect.describe());
    println!("Genotypes: {}", summary.genotype_count);
    println!("Loci: {}", summary.loci.join(", "));
    if !resolved.missing.is_empty() {
        println!("Loci without reference data: {}", resolved.missing.join(", "));
    }
    match summary.recommended_epsilon() {
        Some(epsilon) => println!("Recommended epsilon: {}", format_scientific(epsilon, 3)),
        None => println!("Recommended epsilon: none, the input holds no genotypes"),
    }

    Ok(())
}
