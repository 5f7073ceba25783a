use eframe::egui;
use egui::{Color32, RichText};
use strum::IntoEnumIterator;

use haplomat_core::parameters::{LocusResolutionMap, Resolution};

/// One row per locus of the input. Loci unknown to the reference data are listed but
/// cannot be resolved.
pub fn resolution_grid(ui: &mut egui::Ui, resolutions: &mut LocusResolutionMap, missing: &[String]) {
    let loci: Vec<String> = resolutions.loci().cloned().collect();

    egui::Grid::new("resolutions")
        .num_columns(2)
        .striped(true)
        .show(ui, |ui| {
            for locus in loci {
                ui.label(locus.as_str());
                let mut selected = resolutions.get(&locus);
                egui::ComboBox::from_id_source(("resolution", locus.as_str()))
                    .selected_text(selected.name())
                    .show_ui(ui, |ui| {
                        for resolution in Resolution::iter() {
                            ui.selectable_value(&mut selected, resolution, resolution.name());
                        }
                    });
                if selected != resolutions.get(&locus) {
                    resolutions.set(locus, selected);
                }
                ui.end_row();
            }

            for locus in missing {
                ui.label(locus.as_str());
                ui.label(RichText::new("not in reference data").color(Color32::GRAY));
                ui.end_row();
            }
        });
}
