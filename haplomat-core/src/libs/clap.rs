use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::{eyre::WrapErr, Result};
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::time::OffsetTime;

use crate::args::{DisplayArgs, EstimationArgs, GraphArgs, SessionArgs};
use crate::error::Error;
use crate::subcommands::{
    data_sources, estimate, inspect_input, show_results, update_data, write_parameters,
};

#[derive(Parser, Debug)]
#[command(author, version, about, styles=get_styles())]
pub struct Arguments {
    #[command(subcommand)]
    cmd: SubCommand,
}

#[derive(Args, Debug, Clone)]
pub struct LogAndVerbosity {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, default_value_t = 3)]
    pub verbosity: u8,

    /// A file path to save logs to
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,

    /// Silence all warning and info messages
    #[arg(long)]
    pub silent: bool,
}

#[derive(Subcommand, Debug)]
pub enum SubCommand {
    /// Detect the input format and loci of a genotype file
    InspectInput {
        /// Genotype file in MAC or GLSC format
        file: PathBuf,

        #[command(flatten)]
        session: SessionArgs,

        #[command(flatten)]
        log_and_verbosity: LogAndVerbosity,
    },

    /// Validate a parameter set and write it for the estimator
    WriteParameters {
        /// Genotype file in MAC or GLSC format
        input: PathBuf,

        /// Output directory of the estimator
        #[arg(short = 'o', long = "outdir", default_value_os_t = PathBuf::from("./"), value_hint = clap::ValueHint::DirPath)]
        output: PathBuf,

        /// Prefix of the output files
        #[arg(short = 'r', long, default_value_t = String::new())]
        run_id: String,

        /// Resolution per locus, e.g. A:g,B:2field,C:ignore
        #[arg(short = 'R', long)]
        resolutions: Option<String>,

        #[command(flatten)]
        estimation: EstimationArgs,

        #[command(flatten)]
        session: SessionArgs,

        #[command(flatten)]
        log_and_verbosity: LogAndVerbosity,
    },

    /// Run the estimator with a parameter file and show the results
    Run {
        /// Parameter file, e.g. results/Run1_parametersMAC
        #[arg(short = 'p', long)]
        parameters: PathBuf,

        /// Seconds between reads of the epsilon trace
        #[arg(long, default_value_t = 10)]
        poll_seconds: u64,

        #[command(flatten)]
        display: DisplayArgs,

        #[command(flatten)]
        session: SessionArgs,

        #[command(flatten)]
        log_and_verbosity: LogAndVerbosity,
    },

    /// Summarize the output files of a finished run
    Results {
        /// Parameter file of the run
        #[arg(short = 'p', long)]
        parameters: PathBuf,

        #[command(flatten)]
        display: DisplayArgs,

        /// Print the statistics as JSON
        #[arg(long)]
        json: bool,

        /// Write the frequency and epsilon plots as SVG into this directory
        #[arg(long, value_hint = clap::ValueHint::DirPath)]
        plot: Option<PathBuf>,

        #[command(flatten)]
        graph_args: GraphArgs,

        #[command(flatten)]
        log_and_verbosity: LogAndVerbosity,
    },

    /// Refresh the IPD-IMGT/HLA reference data
    UpdateData {
        #[command(flatten)]
        session: SessionArgs,

        #[command(flatten)]
        log_and_verbosity: LogAndVerbosity,
    },

    /// List or edit the download sources of the reference data
    Sources {
        /// New source as file=url, e.g. hla_nom_g.txt=https://...
        #[arg(long = "set", value_delimiter = ' ', num_args = 1..)]
        set: Vec<String>,

        #[command(flatten)]
        session: SessionArgs,

        #[command(flatten)]
        log_and_verbosity: LogAndVerbosity,
    },
}

impl SubCommand {
    pub fn log_and_verbosity(&self) -> (u8, &Option<PathBuf>, bool) {
        match self {
            Self::InspectInput {
                log_and_verbosity, ..
            }
            | Self::WriteParameters {
                log_and_verbosity, ..
            }
            | Self::Run {
                log_and_verbosity, ..
            }
            | Self::Results {
                log_and_verbosity, ..
            }
            | Self::UpdateData {
                log_and_verbosity, ..
            }
            | Self::Sources {
                log_and_verbosity, ..
            } => (
                log_and_verbosity.verbosity,
                &log_and_verbosity.log_file,
                log_and_verbosity.silent,
            ),
        }
    }

    pub fn output(&self) -> Option<PathBuf> {
        match self {
            Self::WriteParameters { output, .. } => Some(output.clone()),
            Self::Results { plot, .. } => plot.clone(),
            _ => None,
        }
    }
}

pub fn run_args(args: Arguments) -> Result<()> {
    let (verbosity, log_file, is_silent) = args.cmd.log_and_verbosity();

    let (level, wrtr, _guard) = init_tracing(verbosity, log_file, is_silent)?;

    let timer = time::format_description::parse("[hour]:[minute]:[second].[subsecond digits:3]")?;
    let time_offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = OffsetTime::new(time_offset, timer);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(wrtr)
        .with_timer(timer)
        .init();

    if let Some(output) = args.cmd.output() {
        if let Err(e) = std::fs::create_dir(&output) {
            match e.kind() {
                std::io::ErrorKind::AlreadyExists => (),
                _ => return Err(e).wrap_err(Error::Io { path: output }),
            }
        }
    }

    run_cmd(args.cmd)?;

    Ok(())
}

pub fn run_cmd(cmd: SubCommand) -> Result<()> {
    match cmd {
        SubCommand::InspectInput { file, session, .. } => inspect_input::run(&file, &session)?,
        SubCommand::WriteParameters {
            input,
            output,
            run_id,
            resolutions,
            estimation,
            session,
            ..
        } => write_parameters::run(
            input,
            output,
            run_id,
            resolutions.as_deref(),
            &estimation,
            &session,
        )?,
        SubCommand::Run {
            parameters,
            poll_seconds,
            display,
            session,
            ..
        } => estimate::run(&parameters, poll_seconds, &display, &session)?,
        SubCommand::Results {
            parameters,
            display,
            json,
            plot,
            graph_args,
            ..
        } => show_results::run(&parameters, &display, json, plot.as_deref(), graph_args)?,
        SubCommand::UpdateData { session, .. } => update_data::run(&session)?,
        SubCommand::Sources { set, session, .. } => data_sources::run(&set, &session)?,
    }

    Ok(())
}

pub fn init_tracing(
    verbosity: u8,
    log_file: &Option<PathBuf>,
    is_silent: bool,
) -> Result<(Level, NonBlocking, WorkerGuard)> {
    let level = if is_silent {
        Level::ERROR
    } else {
        match verbosity {
            0 | 1 => Level::ERROR,
            2 => Level::WARN,
            3 => Level::INFO,
            4 => Level::DEBUG,
            5..=u8::MAX => Level::TRACE,
        }
    };

    // Write logs to stderr or file
    let (wrtr, _guard) = match log_file {
        Some(path) => {
            let file = std::fs::File::options()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .wrap_err(Error::Io { path: path.clone() })?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    Ok((level, wrtr, _guard))
}

pub fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .usage(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
        )
        .header(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
        )
        .literal(
            anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
        .invalid(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
        )
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
        )
        .valid(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
        .placeholder(
            anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing() {
        let (level, _, _) = init_tracing(1, &None, false).unwrap();
        assert_eq!(Level::ERROR, level);
        let (level, _, _) = init_tracing(2, &None, false).unwrap();
        assert_eq!(Level::WARN, level);
        let (level, _, _) = init_tracing(3, &None, false).unwrap();
        assert_eq!(Level::INFO, level);
        let (level, _, _) = init_tracing(4, &None, false).unwrap();
        assert_eq!(Level::DEBUG, level);
        let (level, _, _) = init_tracing(5, &None, false).unwrap();
        assert_eq!(Level::TRACE, level);
        let (level, _, _) = init_tracing(5, &None, true).unwrap();
        assert_eq!(Level::ERROR, level);
    }

    #[test]
    fn parse_results_command() {
        let args = Arguments::try_parse_from([
            "haplomat-cli",
            "results",
            "--parameters",
            "results/Run1_parametersMAC",
            "--cumulative",
            "0.9",
            "--plot",
            "plots",
            "--log-y",
        ])
        .unwrap();

        assert_eq!(Some(PathBuf::from("plots")), args.cmd.output());
        match args.cmd {
            SubCommand::Results {
                display,
                graph_args,
                json,
                ..
            } => {
                assert_eq!(Some(0.9), display.cumulative);
                assert!(graph_args.log_y);
                assert!(!json);
            }
            _ => panic!("parsed into the wrong subcommand"),
        }
    }

    #[test]
    fn display_flags_conflict() {
        let args = Arguments::try_parse_from([
            "haplomat-cli",
            "results",
            "-p",
            "params",
            "--all",
            "--top",
            "5",
        ]);
        assert!(args.is_err());
    }
}
