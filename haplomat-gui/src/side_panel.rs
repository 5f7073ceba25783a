use eframe::egui;
use egui::{Color32, Margin, RichText};

use haplomat_core::estimation::RunStatus;
use haplomat_core::reference::StatusIndicator;
use haplomat_core::session::Session;

use crate::app::{FileTarget, OpenDialog, View};
use crate::parameters_window::ParameterForm;

pub fn indicator_color(indicator: StatusIndicator) -> Color32 {
    match indicator {
        StatusIndicator::Ok => Color32::from_rgb(46, 160, 67),
        StatusIndicator::Error => Color32::from_rgb(207, 34, 46),
        StatusIndicator::Caution => Color32::from_rgb(230, 140, 0),
        StatusIndicator::Unavailable => Color32::GRAY,
    }
}

fn run_status_text(status: Option<RunStatus>) -> &'static str {
    match status {
        None => "Not started",
        Some(RunStatus::Pending) => "Hapl-o-Mat is running ...",
        Some(RunStatus::Succeeded) => "Finished",
        Some(RunStatus::Cancelled) => "Cancelled",
        Some(RunStatus::Failed) => "Error",
    }
}

pub fn side_panel(
    ctx: &egui::Context,
    session: &mut Session,
    view: &mut View,
    form: &mut Option<ParameterForm>,
    dialog: &mut Option<OpenDialog>,
) -> egui::InnerResponse<()> {
    egui::SidePanel::left("sidebar")
        .default_width(280.0)
        .frame(egui::Frame {
            fill: egui::Color32::WHITE,
            inner_margin: Margin::symmetric(5.0, 5.0),
            ..Default::default()
        })
        .show(ctx, |ui| {
            let busy = session.is_busy();
            let installation = session.installation().map(|i| i.root.clone());

            ui.heading("Hapl-o-Mat directory");
            match &installation {
                Some(root) => ui.label(root.display().to_string()),
                None => ui.label(RichText::new("Please set the path").color(Color32::GRAY)),
            };
            if ui.add_enabled(!busy, egui::Button::new("Select directory")).clicked() {
                *dialog = Some(OpenDialog::folder(installation.clone(), FileTarget::Installation));
            }

            ui.add_space(5.0);
            ui.heading("Reference data");
            ui.horizontal(|ui| {
                ui.colored_label(indicator_color(session.reference_indicator()), "⏺");
                ui.label(session.reference_status());
            });
            if let Some(reference) = session.reference() {
                ui.label("Loci:");
                for row in reference.loci_rows() {
                    ui.monospace(row);
                }
            }

            ui.horizontal(|ui| {
                let updating = session.data_update().is_running();
                if ui
                    .add_enabled(installation.is_some() && !busy, egui::Button::new("Update data"))
                    .clicked()
                {
                    match session.start_data_update() {
                        Ok(()) => *view = View::UpdateLog,
                        Err(report) => session.push_report(&report),
                    }
                }
                if ui.add_enabled(updating, egui::Button::new("Cancel update")).clicked() {
                    if let Err(report) = session.cancel_data_update() {
                        session.push_report(&report);
                    }
                }
            });

            ui.add_space(5.0);
            ui.heading("Parameters");
            ui.horizontal(|ui| {
                let ready = installation.is_some() && !busy;
                if ui.add_enabled(ready, egui::Button::new("Set parameters")).clicked() {
                    *form = Some(ParameterForm::new(session));
                }
                if ui.add_enabled(ready, egui::Button::new("Load parameter file")).clicked() {
                    *dialog = Some(OpenDialog::file(None, FileTarget::ParameterFile));
                }
            });
            match session.committed() {
                Some(committed) => ui.label(committed.describe()),
                None => ui.label(RichText::new("No parameters set").color(Color32::GRAY)),
            };

            ui.add_space(5.0);
            ui.heading("Estimation");
            let running = session.run_status() == Some(RunStatus::Pending);
            ui.horizontal(|ui| {
                let ready = session.committed().is_some() && !busy;
                if ui.add_enabled(ready, egui::Button::new("Start Hapl-o-Mat")).clicked() {
                    match session.start_run() {
                        Ok(()) => *view = View::RunLog,
                        Err(report) => session.push_report(&report),
                    }
                }
                if ui.add_enabled(running, egui::Button::new("Cancel run")).clicked() {
                    if let Err(report) = session.cancel_run() {
                        session.push_report(&report);
                    }
                }
            });
            ui.label(run_status_text(session.run_status()));
        })
}
