use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;

use crate::data_update::{DataUpdate, UpdateOutcome, UpdateProgress};
use crate::error::Error;
use crate::estimation::{Launcher, RunOrchestrator, RunProgress, RunStatus, DEFAULT_POLL_INTERVAL};
use crate::io::{read_first_line, write_file};
use crate::loci::{probe_input, resolve_loci, InputDialect, InputSummary, ResolvedLoci};
use crate::notice::UserNotice;
use crate::parameters::{self, load_defaults, LoadedDefaults, LocusResolutionMap, RunParameters};
use crate::reference::{default_python, Installation, ReferenceData, StatusIndicator};
use crate::results::Ingestion;

/// Single line file holding the installation directory.
pub const INSTALLATION_RECORD: &str = "pathHaplomat";
/// Default parameter set, rewritten on every commit.
pub const DEFAULT_PARAMETERS: &str = "parametersDefault";

/// A validated parameter set that was written for the estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedParameters {
    pub params: RunParameters,
    pub dialect: InputDialect,
    pub genotype_count: Option<usize>,
}

impl CommittedParameters {
    /// One line summary: input, resolutions, epsilon and run id.
    pub fn describe(&self) -> String {
        let resolutions = self
            .params
            .resolutions
            .active()
            .map(|(locus, r)| format!("{locus}:{r}"))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "Input file: {}\nResolution: {resolutions}\nEpsilon: {}\nRunID: {}",
            self.params.input.display(),
            crate::utils::format_float(self.params.epsilon),
            self.params.run_id
        )
    }
}

/// State shared by the front-ends, initialized in order: installation, input loci,
/// parameters, run.
pub struct Session {
    config_dir: PathBuf,
    python: String,
    poll_interval: Duration,
    installation: Option<Installation>,
    reference: Option<ReferenceData>,
    reference_indicator: StatusIndicator,
    reference_status: String,
    committed: Option<CommittedParameters>,
    update: DataUpdate,
    update_log: String,
    run: Option<RunOrchestrator>,
    run_log: String,
    trace: Vec<f64>,
    results: Option<Ingestion>,
    notices: Vec<UserNotice>,
}

impl Session {
    /// Open a session whose persisted files live in `config_dir`. A recorded installation
    /// directory is loaded right away.
    pub fn open(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        let mut session = Self {
            config_dir,
            python: default_python().to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            installation: None,
            reference: None,
            reference_indicator: StatusIndicator::Error,
            reference_status: "No data files available. Please update!".into(),
            committed: None,
            update: DataUpdate::new(),
            update_log: String::new(),
            run: None,
            run_log: String::new(),
            trace: vec![],
            results: None,
            notices: vec![],
        };

        match read_first_line(&session.installation_record()) {
            Some(dir) if Path::new(&dir).is_dir() => {
                tracing::info!("Using the recorded installation {dir}");
                session.use_installation(Installation::new(dir));
            }
            Some(dir) => tracing::warn!("Recorded installation {dir} does not exist"),
            None => tracing::debug!("No installation recorded yet"),
        }

        session
    }

    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self.refresh_reference();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn installation_record(&self) -> PathBuf {
        self.config_dir.join(INSTALLATION_RECORD)
    }

    pub fn default_parameters(&self) -> PathBuf {
        self.config_dir.join(DEFAULT_PARAMETERS)
    }

    pub fn installation(&self) -> Option<&Installation> {
        self.installation.as_ref()
    }

    fn require_installation(&self) -> Result<&Installation> {
        self.installation
            .as_ref()
            .ok_or_else(|| eyre!(Error::NoInstallation))
    }

    /// Switch to another installation directory and record it for the next session.
    pub fn select_installation(&mut self, dir: &Path) -> Result<()> {
        if self.is_busy() {
            return Err(eyre!(Error::AlreadyRunning));
        }
        if !dir.is_dir() {
            return Err(eyre!(Error::FileNotFound {
                path: dir.to_path_buf()
            }));
        }
        let dir = std::path::absolute(dir).wrap_err(Error::Io {
            path: dir.to_path_buf(),
        })?;

        write_file(
            &self.installation_record(),
            &format!("{}\n", dir.display()),
        )?;
        tracing::info!("Recorded installation {dir:?}");

        self.use_installation(Installation::new(dir));
        Ok(())
    }

    fn use_installation(&mut self, installation: Installation) {
        self.installation = Some(installation);
        self.run = None;
        self.refresh_reference();
    }

    /// Re-read the reference data of the installation.
    pub fn refresh_reference(&mut self) {
        let Some(installation) = self.installation.as_ref() else {
            return;
        };

        self.reference = match ReferenceData::load(installation) {
            Ok(reference) => reference,
            Err(err) => {
                tracing::error!("Failed to read the reference data: {err:#}");
                None
            }
        };

        (self.reference_indicator, self.reference_status) = match &self.reference {
            Some(data) => (data.indicator(), data.status_text()),
            None => (
                StatusIndicator::Error,
                "No data files available. Please update!".into(),
            ),
        };

        if !self.update_tool_available() {
            self.reference_status.push_str(
                "\nUpdate package not available.\nPlease check correct setting\nof Hapl-o-Mat path.",
            );
            self.reference_indicator = StatusIndicator::Error;
        }
    }

    pub fn reference(&self) -> Option<&ReferenceData> {
        self.reference.as_ref()
    }

    pub fn reference_indicator(&self) -> StatusIndicator {
        self.reference_indicator
    }

    pub fn reference_status(&self) -> &str {
        &self.reference_status
    }

    pub fn known_loci(&self) -> &[String] {
        self.reference
            .as_ref()
            .map(|r| r.loci.as_slice())
            .unwrap_or_default()
    }

    pub fn update_tool_available(&self) -> bool {
        self.installation
            .as_ref()
            .is_some_and(|i| i.update_tool(&self.python).is_some())
    }

    /// Probe an input file and resolve its loci against the reference data. Missing loci
    /// are also queued as a notice.
    pub fn inspect_input(
        &mut self,
        input: &Path,
        previous: &LocusResolutionMap,
    ) -> Result<(InputSummary, ResolvedLoci)> {
        self.require_installation()?;
        let summary = probe_input(input)?;
        let resolved = resolve_loci(&summary.loci, self.known_loci(), previous);
        if let Some(notice) = resolved.missing_notice() {
            self.notices.push(notice);
        }
        Ok((summary, resolved))
    }

    /// Default values for a new configuration. A missing default file is reported as a
    /// notice and the built-in values are used.
    pub fn load_defaults(&mut self) -> LoadedDefaults {
        let loaded = load_defaults(&self.default_parameters());
        if loaded.missing_file {
            self.notices.push(UserNotice::warning(
                "Default parameters not found",
                "No default parameter file was found. Built-in default values are used.",
            ));
        }
        loaded
    }

    pub fn committed(&self) -> Option<&CommittedParameters> {
        self.committed.as_ref()
    }

    /// Validate and write a parameter set: the estimator's parameter file, the user copy
    /// in the output directory and the default parameter file. Clears earlier results.
    ///
    /// Rejected while a process runs, the estimator reads its parameter file at any time.
    pub fn commit_parameters(
        &mut self,
        params: RunParameters,
        dialect: InputDialect,
        genotype_count: Option<usize>,
    ) -> Result<&CommittedParameters> {
        if self.is_busy() {
            return Err(eyre!(Error::AlreadyRunning));
        }
        let installation = self.require_installation()?;
        params.validate(genotype_count)?;

        let estimator_file = dialect.parameter_file(&installation.root);
        let user_copy = params.parameter_copy(dialect);
        let default_file = self.default_parameters();

        parameters::save(&params, &[&estimator_file, &user_copy, &default_file])?;
        tracing::info!("Parameters saved as {user_copy:?}");

        self.run_log.clear();
        self.trace.clear();
        self.results = None;

        Ok(&*self.committed.insert(CommittedParameters {
            params,
            dialect,
            genotype_count,
        }))
    }

    /// Commit an existing parameter file after probing its input.
    pub fn commit_parameter_file(&mut self, path: &Path) -> Result<&CommittedParameters> {
        if self.is_busy() {
            return Err(eyre!(Error::AlreadyRunning));
        }
        let mut params = parameters::load(path)?;
        let (summary, resolved) = self.inspect_input(&params.input, &params.resolutions)?;
        params.resolutions = resolved.map;
        self.commit_parameters(params, summary.dialect, Some(summary.genotype_count))
    }

    pub fn is_busy(&self) -> bool {
        self.update.is_running() || self.run.as_ref().is_some_and(RunOrchestrator::is_running)
    }

    // Data update

    pub fn start_data_update(&mut self) -> Result<()> {
        let installation = self.require_installation()?.clone();
        if let Some(notice) = installation.existing_downloads_notice() {
            self.notices.push(notice);
        }
        self.update_log.clear();
        self.update.start(&installation, &self.python)
    }

    pub fn cancel_data_update(&mut self) -> Result<()> {
        self.update.cancel()
    }

    pub fn data_update(&self) -> &DataUpdate {
        &self.update
    }

    pub fn update_log(&self) -> &str {
        &self.update_log
    }

    /// Poll the data update. On its outcome the reference data is re-read and the
    /// indicator follows the outcome.
    pub fn poll_data_update(&mut self) -> Result<UpdateProgress> {
        let progress = self.update.poll()?;
        for chunk in &progress.output {
            self.update_log.push_str(chunk);
        }

        if let Some(outcome) = &progress.outcome {
            self.finish_data_update(outcome);
        }

        Ok(progress)
    }

    fn finish_data_update(&mut self, outcome: &UpdateOutcome) {
        self.refresh_reference();
        self.reference_indicator = outcome.indicator(self.reference.as_ref());
        self.reference_status = outcome.status_text(self.reference.as_ref());
        if let Some(notice) = outcome.notice() {
            self.notices.push(notice);
        }
    }

    // Estimation run

    fn orchestrator(&mut self) -> Result<&mut RunOrchestrator> {
        let launcher = Launcher::for_installation(self.require_installation()?);
        let poll_interval = self.poll_interval;
        Ok(self
            .run
            .get_or_insert_with(|| RunOrchestrator::new(launcher).with_poll_interval(poll_interval)))
    }

    /// Start the estimator with the committed parameters. The log, trace and results of
    /// the previous run are kept when the start fails.
    pub fn start_run(&mut self) -> Result<()> {
        let committed = self
            .committed
            .clone()
            .ok_or_else(|| eyre!(Error::ParametersNotCommitted))?;

        self.orchestrator()?
            .start(&committed.params, committed.dialect)?;

        self.run_log.clear();
        self.trace.clear();
        self.results = None;
        Ok(())
    }

    pub fn cancel_run(&mut self) -> Result<()> {
        match self.run.as_mut() {
            Some(run) => run.cancel(),
            None => Ok(()),
        }
    }

    pub fn run_status(&self) -> Option<RunStatus> {
        self.run.as_ref().and_then(RunOrchestrator::status)
    }

    pub fn run_log(&self) -> &str {
        &self.run_log
    }

    pub fn trace(&self) -> &[f64] {
        &self.trace
    }

    pub fn results(&self) -> Option<&Ingestion> {
        self.results.as_ref()
    }

    /// Poll the estimation run. The ingestion of a succeeded run is moved into the
    /// session, see [`Session::results`].
    pub fn poll_run(&mut self) -> Result<RunProgress> {
        let Some(run) = self.run.as_mut() else {
            return Ok(RunProgress::default());
        };

        let mut progress = run.poll()?;

        for chunk in &progress.output {
            self.run_log.push_str(chunk);
        }
        if let Some(trace) = &progress.trace {
            self.trace = trace.clone();
        }

        if let Some(completion) = progress.completion.as_mut() {
            if let Some(report) = &completion.log_error {
                self.notices.push(UserNotice::from_report(report));
            }
            if completion.record.status == RunStatus::Failed {
                self.notices
                    .push(UserNotice::from(&completion.record.failure()));
            }
            match completion.ingestion.take() {
                Some(Ok(ingestion)) => {
                    if let Some(notice) = ingestion.notice() {
                        self.notices.push(notice);
                    }
                    self.results = Some(ingestion);
                }
                Some(Err(report)) => {
                    tracing::error!("{report:#}");
                    self.notices.push(UserNotice::from_report(&report));
                }
                None => {}
            }
        }

        Ok(progress)
    }

    /// Kill running processes before the application exits.
    pub fn shutdown(&mut self) {
        if let Err(err) = self.cancel_run() {
            tracing::error!("{err:#}");
        }
        if let Err(err) = self.cancel_data_update() {
            tracing::error!("{err:#}");
        }
    }

    pub fn push_notice(&mut self, notice: UserNotice) {
        self.notices.push(notice);
    }

    pub fn push_report(&mut self, report: &color_eyre::Report) {
        tracing::debug!("{report:?}");
        self.notices.push(UserNotice::from_report(report));
    }

    pub fn take_notices(&mut self) -> Vec<UserNotice> {
        std::mem::take(&mut self.notices)
    }
}
