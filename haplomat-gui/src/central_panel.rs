use eframe::egui;
use egui::{Color32, RichText};

use color_eyre::Report;
use haplomat_core::results::{Ingestion, ResultSet};
use haplomat_core::session::Session;

use crate::app::{DisplaySettings, PolicyChoice, View};
use crate::plot::{epsilon_plot, frequency_plot};

pub fn central_panel(
    ctx: &egui::Context,
    session: &mut Session,
    view: &mut View,
    display: &mut DisplaySettings,
) -> egui::InnerResponse<()> {
    egui::CentralPanel::default().show(ctx, |ui| {
        let has_results = session.results().and_then(Ingestion::result_set).is_some();

        ui.horizontal(|ui| {
            ui.selectable_value(view, View::RunLog, "Hapl-o-Mat log");
            ui.selectable_value(view, View::UpdateLog, "Data update log");
            ui.add_enabled_ui(has_results, |ui| {
                ui.selectable_value(view, View::Results, "Results");
            });
        });
        ui.separator();

        match view {
            View::UpdateLog => log_view(ui, "update_log", session.update_log()),
            View::RunLog => {
                let height = ui.available_height() / 2.0;
                ui.allocate_ui(egui::vec2(ui.available_width(), height), |ui| {
                    log_view(ui, "run_log", session.run_log());
                });
                ui.separator();
                axis_toggles(ui, display);
                epsilon_plot(ui, "live_epsilon", session.trace(), display);
            }
            View::Results => {
                let error = display_controls(ui, display);
                match session.results().and_then(Ingestion::result_set) {
                    Some(results) => results_view(ui, results, display),
                    None => {
                        ui.label(RichText::new("No results").color(Color32::GRAY));
                    }
                }
                if let Some(report) = error {
                    session.push_report(&report);
                }
            }
        }
    })
}

fn log_view(ui: &mut egui::Ui, id: &str, text: &str) {
    egui::ScrollArea::vertical()
        .id_source(id)
        .stick_to_bottom(true)
        .auto_shrink([false, false])
        .show(ui, |ui| {
            ui.monospace(text);
        });
}

fn axis_toggles(ui: &mut egui::Ui, display: &mut DisplaySettings) {
    ui.horizontal(|ui| {
        ui.checkbox(&mut display.log_x, "log x");
        ui.checkbox(&mut display.log_y, "log y");
    });
}

/// Returns the parse error of an edited field, the policy is then left as it was.
fn display_controls(ui: &mut egui::Ui, display: &mut DisplaySettings) -> Option<Report> {
    let mut changed = false;

    ui.horizontal(|ui| {
        changed |= ui
            .radio_value(&mut display.choice, PolicyChoice::Top, "Top")
            .changed();
        let field = ui.add(egui::TextEdit::singleline(&mut display.top).desired_width(50.0));
        changed |= field.lost_focus();

        changed |= ui
            .radio_value(&mut display.choice, PolicyChoice::All, "All")
            .changed();
        changed |= ui
            .radio_value(
                &mut display.choice,
                PolicyChoice::AboveEpsilon,
                "Frequency >= epsilon",
            )
            .changed();

        changed |= ui
            .radio_value(&mut display.choice, PolicyChoice::Cumulative, "Cumulated frequency")
            .changed();
        let field =
            ui.add(egui::TextEdit::singleline(&mut display.cumulative).desired_width(60.0));
        changed |= field.lost_focus();

        ui.separator();
        ui.checkbox(&mut display.log_x, "log x");
        ui.checkbox(&mut display.log_y, "log y");
    });
    ui.separator();

    match changed {
        true => display.apply().err(),
        false => None,
    }
}

fn results_view(ui: &mut egui::Ui, results: &ResultSet, display: &DisplaySettings) {
    let stats = results.statistics();

    ui.columns(2, |columns| {
        let ui = &mut columns[0];
        egui::Grid::new("statistics")
            .num_columns(2)
            .striped(true)
            .show(ui, |ui| {
                ui.label("Number of haplotypes");
                ui.label(stats.haplotype_count.to_string());
                ui.end_row();
                ui.label("Number of genotypes");
                ui.label(stats.genotype_count.to_string());
                ui.end_row();
                ui.label("Recommended epsilon");
                ui.label(stats.recommended_epsilon_text.as_str());
                ui.end_row();
                ui.label("Haplotypes >= epsilon");
                ui.label(stats.above_recommended_epsilon.to_string());
                ui.end_row();
                ui.label("Sum of cut frequencies");
                ui.label(stats.cut_mass.as_str());
                ui.end_row();
            });
        ui.separator();

        let shown = results.displayed(display.policy);
        ui.label(format!("Showing {} of {} haplotypes", shown.len(), results.len()));
        let row_height = ui.text_style_height(&egui::TextStyle::Monospace);
        egui::ScrollArea::vertical()
            .id_source("frequency_table")
            .auto_shrink([false, false])
            .show_rows(ui, row_height, shown.len(), |ui, rows| {
                for row in &shown[rows] {
                    ui.monospace(row.raw.as_str());
                }
            });

        let ui = &mut columns[1];
        frequency_plot(ui, results, display);
        ui.separator();
        epsilon_plot(ui, "epsilon", &results.trace, display);
    });
}
