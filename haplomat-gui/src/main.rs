use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use eframe::Theme;

use haplomat_core::clap::LogAndVerbosity;
use haplomat_core::session::Session;

mod app;
mod central_panel;
mod notices;
mod parameters_window;
mod plot;
mod resolution;
mod side_panel;

use crate::app::HaplomatApp;

/// Configure, run and inspect Hapl-o-Mat estimations
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(flatten)]
    pub log_and_verbosity: LogAndVerbosity,

    /// Directory holding the installation record and the default parameters
    #[arg(long, default_value_os_t = PathBuf::from("./"))]
    pub config_dir: PathBuf,

    /// Python interpreter running the data update
    #[arg(long)]
    pub python: Option<String>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let lv = args.log_and_verbosity.clone();
    let (level, wrtr, _guard) =
        haplomat_core::clap::init_tracing(lv.verbosity, &lv.log_file, lv.silent)?;

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(wrtr)
        .init();

    let mut session = Session::open(&args.config_dir);
    if let Some(python) = args.python {
        session = session.with_python(python);
    }

    let app = HaplomatApp::new(session);

    let options = eframe::NativeOptions {
        default_theme: Theme::Light,
        initial_window_size: Some(egui::vec2(1280.0, 860.0)),
        ..Default::default()
    };

    eframe::run_native("Hapl-o-Mat", options, Box::new(|_| Box::new(app)))
        .map_err(|err| eyre!("Failed to start the window: {err}"))
}
