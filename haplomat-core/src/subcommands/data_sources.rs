use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::args::SessionArgs;
use crate::error::Error;
use crate::reference::DataSources;
use crate::subcommands::open_session;

/// List the download sources, or replace the given ones with `file=url` pairs.
#[doc(hidden)]
#[tracing::instrument]
pub fn run(set: &[String], args: &SessionArgs) -> Result<()> {
    let session = open_session(args)?;
    let installation = session
        .installation()
        .ok_or_else(|| eyre!(Error::NoInstallation))?;

    // Unknown entries are reported while reading and dropped on write
    let (mut sources, _) = DataSources::read(installation)?;

    if !set.is_empty() {
        for pair in set {
            let (name, url) = pair.split_once('=').ok_or_else(|| {
                eyre!(Error::InvalidValue {
                    key: "source".into(),
                    value: pair.clone(),
                })
            })?;
            sources.set(name.trim(), url.trim())?;
        }
        sources.write(installation)?;
    }

    for (name, url) in sources.iter() {
        println!("{name}\t{url}");
    }

    Ok(())
}
