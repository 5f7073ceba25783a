use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use color_eyre::Result;
use eframe::egui;
use egui_file::FileDialog;

use haplomat_core::estimation::RunStatus;
use haplomat_core::notice::UserNotice;
use haplomat_core::results::{
    parse_cumulative, parse_top, AxisScale, DisplayPolicy, DEFAULT_CUMULATIVE, DEFAULT_TOP,
};
use haplomat_core::session::Session;

use crate::central_panel::central_panel;
use crate::notices::{quit_window, show_notice};
use crate::parameters_window::ParameterForm;
use crate::side_panel::side_panel;

/// Repaint interval while a subprocess is running.
const BUSY_REPAINT: Duration = Duration::from_millis(200);

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum View {
    RunLog,
    UpdateLog,
    Results,
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum FileTarget {
    Installation,
    Input,
    OutputDir,
    ParameterFile,
}

/// A file dialog and what its selection is used for.
pub struct OpenDialog {
    pub dialog: FileDialog,
    pub target: FileTarget,
}

impl OpenDialog {
    pub fn file(initial: Option<PathBuf>, target: FileTarget) -> Self {
        let mut dialog = FileDialog::open_file(initial);
        dialog.open();
        Self { dialog, target }
    }

    pub fn folder(initial: Option<PathBuf>, target: FileTarget) -> Self {
        let mut dialog = FileDialog::select_folder(initial);
        dialog.open();
        Self { dialog, target }
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum PolicyChoice {
    Top,
    All,
    AboveEpsilon,
    Cumulative,
}

/// Result presentation controls. `policy` only changes when the choice and its field
/// parse, so an invalid field keeps the last table on screen.
pub struct DisplaySettings {
    pub choice: PolicyChoice,
    pub top: String,
    pub cumulative: String,
    pub policy: DisplayPolicy,
    pub log_x: bool,
    pub log_y: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            choice: PolicyChoice::Top,
            top: DEFAULT_TOP.to_string(),
            cumulative: DEFAULT_CUMULATIVE.to_string(),
            policy: DisplayPolicy::Top(DEFAULT_TOP),
            log_x: false,
            log_y: false,
        }
    }
}

impl DisplaySettings {
    pub fn apply(&mut self) -> Result<()> {
        self.policy = match self.choice {
            PolicyChoice::Top => DisplayPolicy::Top(parse_top(&self.top)?),
            PolicyChoice::All => DisplayPolicy::All,
            PolicyChoice::AboveEpsilon => DisplayPolicy::AboveRecommendedEpsilon,
            PolicyChoice::Cumulative => {
                DisplayPolicy::CumulativeCutoff(parse_cumulative(&self.cumulative)?)
            }
        };
        Ok(())
    }

    pub fn scales(&self) -> (AxisScale, AxisScale) {
        (AxisScale::from_log(self.log_x), AxisScale::from_log(self.log_y))
    }
}

pub struct HaplomatApp {
    session: Session,
    view: View,
    display: DisplaySettings,
    form: Option<ParameterForm>,
    dialog: Option<OpenDialog>,
    notices: VecDeque<UserNotice>,
    confirm_quit: bool,
    quit_confirmed: bool,
}

impl HaplomatApp {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            view: View::RunLog,
            display: DisplaySettings::default(),
            form: None,
            dialog: None,
            notices: VecDeque::new(),
            confirm_quit: false,
            quit_confirmed: false,
        }
    }

    /// Pump the running subprocesses. Runs once per frame.
    fn poll(&mut self, ctx: &egui::Context) {
        if self.session.data_update().needs_poll() {
            if let Err(report) = self.session.poll_data_update() {
                self.session.push_report(&report);
            }
        }

        if self.session.run_status() == Some(RunStatus::Pending) {
            match self.session.poll_run() {
                Ok(progress) => {
                    if let Some(completion) = progress.completion {
                        tracing::info!(
                            "Hapl-o-Mat ended as {:?}, log saved to {:?}",
                            completion.record.status,
                            completion.log_path
                        );
                        if self.session.results().and_then(|i| i.result_set()).is_some() {
                            self.view = View::Results;
                        }
                    }
                }
                Err(report) => self.session.push_report(&report),
            }
        }

        if self.session.is_busy() {
            ctx.request_repaint_after(BUSY_REPAINT);
        }
    }

    fn handle_dialog(&mut self, ctx: &egui::Context) {
        let Some(open) = self.dialog.as_mut() else {
            return;
        };

        if open.dialog.show(ctx).selected() {
            let target = open.target;
            let path = open.dialog.path().map(|p| p.to_path_buf());
            self.dialog = None;
            if let Some(path) = path {
                self.select(target, path);
            }
        }
    }

    fn select(&mut self, target: FileTarget, path: PathBuf) {
        match target {
            FileTarget::Installation => {
                if let Err(report) = self.session.select_installation(&path) {
                    self.session.push_report(&report);
                }
            }
            FileTarget::Input => {
                if let Some(form) = self.form.as_mut() {
                    form.set_input(&mut self.session, path);
                }
            }
            FileTarget::OutputDir => {
                if let Some(form) = self.form.as_mut() {
                    form.set_output_dir(path);
                }
            }
            FileTarget::ParameterFile => match self.session.commit_parameter_file(&path) {
                Ok(committed) => tracing::info!("Parameters loaded\n{}", committed.describe()),
                Err(report) => self.session.push_report(&report),
            },
        }
    }
}

impl eframe::App for HaplomatApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        self.poll(ctx);

        let Self {
            session,
            view,
            display,
            form,
            dialog,
            ..
        } = self;

        side_panel(ctx, session, view, form, dialog);
        central_panel(ctx, session, view, display);

        if let Some(open_form) = form.as_mut() {
            if !open_form.show(ctx, session, dialog) {
                *form = None;
            }
        }

        self.handle_dialog(ctx);

        for notice in self.session.take_notices() {
            notice.log();
            self.notices.push_back(notice);
        }
        show_notice(ctx, &mut self.notices);

        if self.confirm_quit {
            match quit_window(ctx) {
                Some(true) => {
                    self.quit_confirmed = true;
                    self.session.shutdown();
                    frame.close();
                }
                Some(false) => self.confirm_quit = false,
                None => {}
            }
        }
    }

    fn on_close_event(&mut self) -> bool {
        if self.quit_confirmed || !self.session.is_busy() {
            self.session.shutdown();
            return true;
        }
        self.confirm_quit = true;
        false
    }
}
