use eframe::egui;
use egui::Color32;
use egui_plot::{Line, Plot, PlotPoints, Points};

use haplomat_core::results::{rank_points, ResultSet};

use crate::app::DisplaySettings;

const MARKER_COLOR: Color32 = Color32::from_rgb(31, 119, 180);

fn axis_label(label: &str, log: bool) -> String {
    match log {
        true => format!("log10({label})"),
        false => label.to_string(),
    }
}

pub fn init_plot(id: &str, x_label: &str, y_label: &str, settings: &DisplaySettings) -> Plot {
    let (x_name, y_name) = (x_label.to_string(), y_label.to_string());
    let (log_x, log_y) = (settings.log_x, settings.log_y);

    Plot::new(id)
        .auto_bounds_x()
        .auto_bounds_y()
        .x_axis_label(axis_label(x_label, log_x))
        .y_axis_label(axis_label(y_label, log_y))
        .label_formatter(move |_name, value| {
            let x = if log_x { 10f64.powf(value.x) } else { value.x };
            let y = if log_y { 10f64.powf(value.y) } else { value.y };
            format!("{x_name}: {x:.0}\n{y_name}: {y:.3e}")
        })
}

/// Frequency against rank for the displayed part of the table.
pub fn frequency_plot(ui: &mut egui::Ui, results: &ResultSet, settings: &DisplaySettings) {
    let (x, y) = settings.scales();
    let points: PlotPoints = results
        .frequency_points(settings.policy, x, y)
        .into_iter()
        .collect();

    init_plot("frequencies", "rank", "frequency", settings)
        .height(ui.available_height() / 2.0 - 10.0)
        .show(ui, |plot_ui| {
            plot_ui.points(Points::new(points).radius(3.0).color(MARKER_COLOR));
        });
}

/// Epsilon against iteration, always the whole trace.
pub fn epsilon_plot(ui: &mut egui::Ui, id: &str, trace: &[f64], settings: &DisplaySettings) {
    let (x, y) = settings.scales();
    let values = rank_points(trace, x, y);
    let line: PlotPoints = values.iter().copied().collect();
    let points: PlotPoints = values.into_iter().collect();

    init_plot(id, "iteration", "epsilon", settings).show(ui, |plot_ui| {
        plot_ui.line(Line::new(line).color(Color32::from_rgb(120, 120, 120)));
        plot_ui.points(Points::new(points).radius(3.0).color(MARKER_COLOR));
    });
}
