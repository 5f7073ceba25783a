use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use eframe::egui;
use egui::{Color32, RichText};
use strum::IntoEnumIterator;

use haplomat_core::error::Error;
use haplomat_core::loci::{InputDialect, InputSummary};
use haplomat_core::parameters::{Field, Initialization, LocusResolutionMap, RunParameters};
use haplomat_core::session::Session;
use haplomat_core::utils::{format_float, format_scientific};

use crate::app::{FileTarget, OpenDialog};
use crate::resolution::resolution_grid;

const FIELDS: [Field; 5] = [
    Field::RunId,
    Field::MinimalFrequencyGenotypes,
    Field::Epsilon,
    Field::CutHaplotypeFrequencies,
    Field::Seed,
];

/// The parameter dialog. Numeric fields are kept as typed and checked when they lose
/// focus; nothing is written before "Save" validates the whole set.
pub struct ParameterForm {
    input: Option<PathBuf>,
    summary: Option<InputSummary>,
    missing: Vec<String>,
    resolutions: LocusResolutionMap,
    output_dir: Option<PathBuf>,
    run_id: String,
    minimal_frequency: String,
    epsilon: String,
    cut: String,
    seed: String,
    do_ambiguity_filter: bool,
    expand_lines: bool,
    write_genotypes: bool,
    renormalize: bool,
    initialization: Initialization,
    errors: BTreeMap<&'static str, String>,
}

impl ParameterForm {
    /// Start from the default file, or from the last saved configuration when there is one.
    pub fn new(session: &mut Session) -> Self {
        let loaded = session.load_defaults();
        let defaults = loaded.defaults;

        let mut form = Self {
            input: None,
            summary: None,
            missing: vec![],
            resolutions: LocusResolutionMap::new(),
            output_dir: None,
            run_id: String::new(),
            minimal_frequency: format_float(defaults.minimal_frequency_genotypes),
            epsilon: format_float(defaults.epsilon),
            cut: format_float(defaults.cut_haplotype_frequencies),
            seed: defaults.seed.to_string(),
            do_ambiguity_filter: defaults.do_ambiguity_filter,
            expand_lines: defaults.expand_lines_ambiguity_filter,
            write_genotypes: defaults.write_genotypes,
            renormalize: defaults.renormalize,
            initialization: defaults.initialization,
            errors: BTreeMap::new(),
        };

        if let Some(last) = loaded.last_saved {
            form.run_id = last.run_id;
            form.output_dir = Some(last.output_dir);
            form.resolutions = last.resolutions;
            if last.input.is_file() {
                form.set_input(session, last.input);
            }
        }

        form
    }

    /// Probe a new input file. Choices for loci that are still present are kept.
    pub fn set_input(&mut self, session: &mut Session, path: PathBuf) {
        match session.inspect_input(&path, &self.resolutions) {
            Ok((summary, resolved)) => {
                tracing::info!(
                    "{path:?}: {} input, {} genotypes, loci {}",
                    summary.dialect.describe(),
                    summary.genotype_count,
                    summary.loci.join(", ")
                );
                self.resolutions = resolved.map;
                self.missing = resolved.missing;
                self.summary = Some(summary);
                self.input = Some(path);
                self.check(Field::Epsilon);
            }
            Err(report) => session.push_report(&report),
        }
    }

    pub fn set_output_dir(&mut self, path: PathBuf) {
        self.output_dir = Some(path);
    }

    fn genotype_count(&self) -> Option<usize> {
        self.summary.as_ref().map(|s| s.genotype_count)
    }

    fn raw(&self, field: Field) -> &str {
        match field {
            Field::RunId => &self.run_id,
            Field::MinimalFrequencyGenotypes => &self.minimal_frequency,
            Field::Epsilon => &self.epsilon,
            Field::CutHaplotypeFrequencies => &self.cut,
            Field::Seed => &self.seed,
        }
    }

    fn raw_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::RunId => &mut self.run_id,
            Field::MinimalFrequencyGenotypes => &mut self.minimal_frequency,
            Field::Epsilon => &mut self.epsilon,
            Field::CutHaplotypeFrequencies => &mut self.cut,
            Field::Seed => &mut self.seed,
        }
    }

    fn check(&mut self, field: Field) {
        match field.validate(self.raw(field), self.genotype_count()) {
            Ok(()) => {
                self.errors.remove(field.key());
            }
            Err(report) => {
                self.errors.insert(field.key(), report.to_string());
            }
        }
    }

    fn parse<T: FromStr>(&self, field: Field) -> Result<T> {
        let raw = self.raw(field).trim();
        field.validate(raw, self.genotype_count())?;
        raw.parse::<T>().map_err(|_| {
            eyre!(Error::InvalidValue {
                key: field.key().into(),
                value: raw.into(),
            })
        })
    }

    /// The parameter set as entered, with the dialect and genotype count of its input.
    pub fn build(&self) -> Result<(RunParameters, InputDialect, Option<usize>)> {
        let (Some(input), Some(summary)) = (&self.input, &self.summary) else {
            return Err(eyre!(Error::InvalidValue {
                key: "input file".into(),
                value: String::new(),
            }));
        };
        let Some(output_dir) = &self.output_dir else {
            return Err(eyre!(Error::InvalidValue {
                key: "output directory".into(),
                value: String::new(),
            }));
        };

        let params = RunParameters {
            input: input.clone(),
            output_dir: output_dir.clone(),
            run_id: self.parse(Field::RunId)?,
            resolutions: self.resolutions.clone(),
            minimal_frequency_genotypes: self.parse(Field::MinimalFrequencyGenotypes)?,
            do_ambiguity_filter: self.do_ambiguity_filter,
            expand_lines_ambiguity_filter: self.expand_lines,
            write_genotypes: self.write_genotypes,
            initialization: self.initialization,
            epsilon: self.parse(Field::Epsilon)?,
            cut_haplotype_frequencies: self.parse(Field::CutHaplotypeFrequencies)?,
            renormalize: self.renormalize,
            seed: self.parse(Field::Seed)?,
        };

        Ok((params, summary.dialect, Some(summary.genotype_count)))
    }

    fn text_field(&mut self, ui: &mut egui::Ui, label: &str, field: Field) {
        ui.label(label);
        let response =
            ui.add(egui::TextEdit::singleline(self.raw_mut(field)).desired_width(140.0));
        if response.lost_focus() {
            self.check(field);
        }
        ui.end_row();
    }

    fn save(&mut self, session: &mut Session) -> bool {
        FIELDS.into_iter().for_each(|field| self.check(field));

        let committed = self
            .build()
            .and_then(|(params, dialect, count)| {
                session
                    .commit_parameters(params, dialect, count)
                    .map(|c| c.describe())
            });

        match committed {
            Ok(description) => {
                tracing::info!("Parameters set\n{description}");
                true
            }
            Err(report) => {
                session.push_report(&report);
                false
            }
        }
    }

    /// Draw the window. Returns false once it is closed or saved.
    pub fn show(
        &mut self,
        ctx: &egui::Context,
        session: &mut Session,
        dialog: &mut Option<OpenDialog>,
    ) -> bool {
        let mut open = true;
        let mut done = false;

        egui::Window::new("Parameters")
            .open(&mut open)
            .default_width(480.0)
            .show(ctx, |ui| {
                ui.heading("Files");
                egui::Grid::new("files").num_columns(3).show(ui, |ui| {
                    ui.label("Input file");
                    ui.label(path_text(&self.input));
                    if ui.button("Browse").clicked() {
                        *dialog = Some(OpenDialog::file(self.input.clone(), FileTarget::Input));
                    }
                    ui.end_row();

                    ui.label("Output directory");
                    ui.label(path_text(&self.output_dir));
                    if ui.button("Browse").clicked() {
                        *dialog = Some(OpenDialog::folder(
                            self.output_dir.clone(),
                            FileTarget::OutputDir,
                        ));
                    }
                    ui.end_row();
                });

                if let Some(summary) = &self.summary {
                    let epsilon = summary
                        .recommended_epsilon()
                        .map(|e| format_scientific(e, 3))
                        .unwrap_or_else(|| "-".into());
                    ui.label(format!(
                        "{} with {} genotypes, recommended epsilon <= {epsilon}",
                        summary.dialect.describe(),
                        summary.genotype_count
                    ));
                }

                ui.add_space(5.0);
                ui.heading("Loci and resolutions");
                resolution_grid(ui, &mut self.resolutions, &self.missing);

                ui.add_space(5.0);
                ui.heading("Reports");
                egui::Grid::new("reports").num_columns(2).show(ui, |ui| {
                    self.text_field(ui, "RunID", Field::RunId);
                    self.text_field(
                        ui,
                        "Minimal genotype frequency",
                        Field::MinimalFrequencyGenotypes,
                    );
                });
                ui.checkbox(&mut self.do_ambiguity_filter, "Ambiguity filter");
                ui.add_enabled(
                    self.do_ambiguity_filter,
                    egui::Checkbox::new(&mut self.expand_lines, "Expand lines in ambiguity filter"),
                );
                ui.checkbox(&mut self.write_genotypes, "Write genotypes");

                ui.add_space(5.0);
                ui.heading("EM algorithm");
                egui::Grid::new("algorithm").num_columns(2).show(ui, |ui| {
                    ui.label("Initialization");
                    egui::ComboBox::from_id_source("initialization")
                        .selected_text(self.initialization.as_str())
                        .show_ui(ui, |ui| {
                            for init in Initialization::iter() {
                                ui.selectable_value(&mut self.initialization, init, init.as_str());
                            }
                        });
                    ui.end_row();

                    self.text_field(ui, "Epsilon", Field::Epsilon);
                    self.text_field(ui, "Frequency cut", Field::CutHaplotypeFrequencies);
                    self.text_field(ui, "Seed", Field::Seed);
                });
                ui.checkbox(&mut self.renormalize, "Renormalize frequencies");

                for message in self.errors.values() {
                    ui.label(RichText::new(message.as_str()).color(Color32::from_rgb(207, 34, 46)));
                }

                ui.separator();
                let busy = session.is_busy();
                if busy {
                    ui.label(
                        RichText::new("Parameters cannot be saved while a process is running.")
                            .color(Color32::GRAY),
                    );
                }
                ui.horizontal(|ui| {
                    let save = ui.add_enabled(!busy, egui::Button::new("Save"));
                    if save.clicked() && self.save(session) {
                        done = true;
                    }
                    if ui.button("Cancel").clicked() {
                        done = true;
                    }
                });
            });

        open && !done
    }
}

fn path_text(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "-".into(),
    }
}
