use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::io::{read_to_string, write_file};
use crate::loci::InputDialect;
use crate::utils::{format_float, recommended_epsilon};

pub const FILENAME_INPUT: &str = "FILENAME_INPUT";
pub const FILENAME_HAPLOTYPES: &str = "FILENAME_HAPLOTYPES";
pub const FILENAME_GENOTYPES: &str = "FILENAME_GENOTYPES";
pub const FILENAME_HAPLOTYPEFREQUENCIES: &str = "FILENAME_HAPLOTYPEFREQUENCIES";
pub const FILENAME_EPSILON_LOGL: &str = "FILENAME_EPSILON_LOGL";
pub const LOCI_AND_RESOLUTIONS: &str = "LOCI_AND_RESOLUTIONS";
pub const MINIMAL_FREQUENCY_GENOTYPES: &str = "MINIMAL_FREQUENCY_GENOTYPES";
pub const DO_AMBIGUITYFILTER: &str = "DO_AMBIGUITYFILTER";
pub const EXPAND_LINES_AMBIGUITYFILTER: &str = "EXPAND_LINES_AMBIGUITYFILTER";
pub const WRITE_GENOTYPES: &str = "WRITE_GENOTYPES";
pub const INITIALIZATION_HAPLOTYPEFREQUENCIES: &str = "INITIALIZATION_HAPLOTYPEFREQUENCIES";
pub const EPSILON: &str = "EPSILON";
pub const CUT_HAPLOTYPEFREQUENCIES: &str = "CUT_HAPLOTYPEFREQUENCIES";
pub const RENORMALIZE_HAPLOTYPEFREQUENCIES: &str = "RENORMALIZE_HAPLOTYPEFREQUENCIES";
pub const SEED: &str = "SEED";

/// Keys every parameter file must contain, in the order they are written.
pub const REQUIRED_KEYS: [&str; 15] = [
    FILENAME_INPUT,
    FILENAME_HAPLOTYPES,
    FILENAME_GENOTYPES,
    FILENAME_HAPLOTYPEFREQUENCIES,
    FILENAME_EPSILON_LOGL,
    LOCI_AND_RESOLUTIONS,
    MINIMAL_FREQUENCY_GENOTYPES,
    DO_AMBIGUITYFILTER,
    EXPAND_LINES_AMBIGUITYFILTER,
    WRITE_GENOTYPES,
    INITIALIZATION_HAPLOTYPEFREQUENCIES,
    EPSILON,
    CUT_HAPLOTYPEFREQUENCIES,
    RENORMALIZE_HAPLOTYPEFREQUENCIES,
    SEED,
];

pub const MAX_SEED: u32 = 1_000_000_000;

/// Characters a run id must not contain. The run id becomes a file name prefix and the
/// run id is recovered from file names by splitting at `_`.
pub const FORBIDDEN_RUN_ID_CHARS: [char; 12] =
    ['_', '\\', '/', '*', '?', ':', '"', '<', '>', '|', '%', ' '];

#[derive(Serialize, Deserialize, Clone, Copy, Default, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[cfg_attr(feature = "enum_methods", derive(strum::EnumIter))]
pub enum Resolution {
    /// g group
    #[cfg_attr(feature = "clap", value(name = "g"))]
    SmallG,
    /// G group
    #[cfg_attr(feature = "clap", value(name = "G"))]
    BigG,
    /// P group
    #[cfg_attr(feature = "clap", value(name = "P"))]
    P,
    #[cfg_attr(feature = "clap", value(name = "1field"))]
    OneField,
    #[cfg_attr(feature = "clap", value(name = "2field"))]
    TwoField,
    #[cfg_attr(feature = "clap", value(name = "3field"))]
    ThreeField,
    #[cfg_attr(feature = "clap", value(name = "4field"))]
    FourField,
    /// Locus is left out of the estimation
    #[default]
    #[cfg_attr(feature = "clap", value(name = "ignore"))]
    Ignored,
}

impl Resolution {
    /// Token written to `LOCI_AND_RESOLUTIONS`. Ignored loci are not written.
    ///
    /// Field resolutions use the digit-count tokens of the estimator:
    /// 1field is `2d`, 2field is `4d`, 3field is `6d` and 4field is `8d`.
    pub fn file_code(&self) -> Option<&'static str> {
        match self {
            Self::SmallG => Some("g"),
            Self::BigG => Some("G"),
            Self::P => Some("P"),
            Self::OneField => Some("2d"),
            Self::TwoField => Some("4d"),
            Self::ThreeField => Some("6d"),
            Self::FourField => Some("8d"),
            Self::Ignored => None,
        }
    }

    pub fn from_file_code(code: &str) -> Result<Self> {
        Ok(match code {
            "g" => Self::SmallG,
            "G" => Self::BigG,
            "P" => Self::P,
            "2d" => Self::OneField,
            "4d" => Self::TwoField,
            "6d" => Self::ThreeField,
            "8d" => Self::FourField,
            _ => return Err(eyre!(Error::UnknownResolution { code: code.into() })),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SmallG => "g",
            Self::BigG => "G",
            Self::P => "P",
            Self::OneField => "1field",
            Self::TwoField => "2field",
            Self::ThreeField => "3field",
            Self::FourField => "4field",
            Self::Ignored => "ignore locus",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Resolution {
    type Err = color_eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "g" => Self::SmallG,
            "G" => Self::BigG,
            "P" => Self::P,
            "1field" => Self::OneField,
            "2field" => Self::TwoField,
            "3field" => Self::ThreeField,
            "4field" => Self::FourField,
            "ignore" | "ignore locus" => Self::Ignored,
            _ => return Err(eyre!(Error::UnknownResolution { code: s.into() })),
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[cfg_attr(feature = "enum_methods", derive(strum::EnumIter))]
pub enum Initialization {
    Equal,
    #[cfg_attr(feature = "clap", value(name = "numberOccurrence"))]
    NumberOccurrence,
    #[default]
    Perturbation,
    Random,
}

impl Initialization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::NumberOccurrence => "numberOccurrence",
            Self::Perturbation => "perturbation",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for Initialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Initialization {
    type Err = color_eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "equal" => Self::Equal,
            "numberOccurrence" => Self::NumberOccurrence,
            "perturbation" => Self::Perturbation,
            "random" => Self::Random,
            _ => return Err(eyre!(Error::UnknownInitialization { value: s.into() })),
        })
    }
}

/// Requested output resolution per locus. Ignored loci compare equal to absent ones.
#[derive(Serialize, Deserialize, Clone, Default, Debug)]
pub struct LocusResolutionMap(BTreeMap<String, Resolution>);

impl LocusResolutionMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, locus: &str) -> Resolution {
        self.0.get(locus).copied().unwrap_or_default()
    }

    pub fn set(&mut self, locus: impl Into<String>, resolution: Resolution) {
        self.0.insert(locus.into(), resolution);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Resolution)> {
        self.0.iter()
    }

    pub fn loci(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Loci that take part in the estimation.
    pub fn active(&self) -> impl Iterator<Item = (&String, &Resolution)> {
        self.0.iter().filter(|(_, r)| **r != Resolution::Ignored)
    }

    pub fn has_active(&self) -> bool {
        self.active().next().is_some()
    }

    /// Keep only `loci`, each either with its earlier choice or as ignored.
    pub fn carry_over<'a>(&self, loci: impl IntoIterator<Item = &'a String>) -> Self {
        Self(
            loci.into_iter()
                .map(|locus| (locus.clone(), self.get(locus)))
                .collect(),
        )
    }

    pub fn to_file_value(&self) -> String {
        self.active()
            .filter_map(|(locus, r)| r.file_code().map(|code| format!("{locus}:{code}")))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn from_file_value(value: &str) -> Result<Self> {
        let mut map = Self::new();
        for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (locus, code) = pair.split_once(':').ok_or_else(|| {
                eyre!(Error::InvalidValue {
                    key: LOCI_AND_RESOLUTIONS.into(),
                    value: value.into(),
                })
            })?;
            map.set(locus.trim(), Resolution::from_file_code(code.trim())?);
        }
        Ok(map)
    }

    /// Parse the long-form listing used on the command line, e.g. `A:g,B:2field`.
    pub fn from_display_value(value: &str) -> Result<Self> {
        let mut map = Self::new();
        for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (locus, name) = pair.split_once(':').ok_or_else(|| {
                eyre!(Error::InvalidValue {
                    key: LOCI_AND_RESOLUTIONS.into(),
                    value: value.into(),
                })
            })?;
            map.set(locus.trim(), name.trim().parse()?);
        }
        Ok(map)
    }
}

impl PartialEq for LocusResolutionMap {
    fn eq(&self, other: &Self) -> bool {
        self.active().eq(other.active())
    }
}

impl Eq for LocusResolutionMap {}

impl FromIterator<(String, Resolution)> for LocusResolutionMap {
    fn from_iter<T: IntoIterator<Item = (String, Resolution)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Output files of a run, always derived from the output directory and run id.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct RunPaths {
    pub haplotypes: PathBuf,
    pub genotypes: PathBuf,
    pub frequencies: PathBuf,
    pub epsilon: PathBuf,
    pub log: PathBuf,
}

pub fn run_id_prefix(run_id: &str) -> String {
    match run_id {
        "" => String::new(),
        id => format!("{id}_"),
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RunParameters {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub run_id: String,
    pub resolutions: LocusResolutionMap,
    pub minimal_frequency_genotypes: f64,
    pub do_ambiguity_filter: bool,
    pub expand_lines_ambiguity_filter: bool,
    pub write_genotypes: bool,
    pub initialization: Initialization,
    pub epsilon: f64,
    pub cut_haplotype_frequencies: f64,
    pub renormalize: bool,
    pub seed: u32,
}

impl RunParameters {
    pub fn from_defaults(
        input: PathBuf,
        output_dir: PathBuf,
        run_id: String,
        resolutions: LocusResolutionMap,
        defaults: &ParameterDefaults,
    ) -> Self {
        Self {
            input,
            output_dir,
            run_id,
            resolutions,
            minimal_frequency_genotypes: defaults.minimal_frequency_genotypes,
            do_ambiguity_filter: defaults.do_ambiguity_filter,
            expand_lines_ambiguity_filter: defaults.expand_lines_ambiguity_filter,
            write_genotypes: defaults.write_genotypes,
            initialization: defaults.initialization,
            epsilon: defaults.epsilon,
            cut_haplotype_frequencies: defaults.cut_haplotype_frequencies,
            renormalize: defaults.renormalize,
            seed: defaults.seed,
        }
    }

    pub fn paths(&self) -> RunPaths {
        let prefix = run_id_prefix(&self.run_id);
        let file = |suffix: &str| self.output_dir.join(format!("{prefix}{suffix}"));
        RunPaths {
            haplotypes: file("haplotypes.dat"),
            genotypes: file("genotypes.dat"),
            frequencies: file("htf.dat"),
            epsilon: file("epsilon.dat"),
            log: file("log.dat"),
        }
    }

    /// Location of the user's copy of the parameter file, e.g. `results/Run1_parametersMAC`.
    pub fn parameter_copy(&self, dialect: InputDialect) -> PathBuf {
        self.output_dir.join(format!(
            "{}parameters{}",
            run_id_prefix(&self.run_id),
            dialect.as_arg()
        ))
    }

    pub fn defaults(&self) -> ParameterDefaults {
        ParameterDefaults {
            minimal_frequency_genotypes: self.minimal_frequency_genotypes,
            do_ambiguity_filter: self.do_ambiguity_filter,
            expand_lines_ambiguity_filter: self.expand_lines_ambiguity_filter,
            initialization: self.initialization,
            epsilon: self.epsilon,
            cut_haplotype_frequencies: self.cut_haplotype_frequencies,
            renormalize: self.renormalize,
            seed: self.seed,
            write_genotypes: self.write_genotypes,
        }
    }

    /// Check every field. `genotype_count` bounds epsilon when the input has been probed.
    pub fn validate(&self, genotype_count: Option<usize>) -> Result<()> {
        validate_run_id(&self.run_id)?;
        check_unit_interval(MINIMAL_FREQUENCY_GENOTYPES, self.minimal_frequency_genotypes)?;
        check_unit_interval(CUT_HAPLOTYPEFREQUENCIES, self.cut_haplotype_frequencies)?;
        check_epsilon(self.epsilon, genotype_count)?;

        if self.seed > MAX_SEED {
            return Err(eyre!(Error::InvalidSeed {
                value: self.seed.to_string()
            }));
        }

        if !self.resolutions.has_active() {
            return Err(eyre!(Error::NoResolutions));
        }

        if !self.input.exists() {
            return Err(eyre!(Error::FileNotFound {
                path: self.input.clone()
            }));
        }

        Ok(())
    }

    pub fn to_file_string(&self) -> String {
        let paths = self.paths();
        let path = |p: &Path| p.display().to_string();
        let bool_str = |b: bool| if b { "true" } else { "false" };

        let sections: [(&str, Vec<(&str, String)>); 3] = [
            (
                "#file name",
                vec![
                    (FILENAME_INPUT, path(&self.input)),
                    (FILENAME_HAPLOTYPES, path(&paths.haplotypes)),
                    (FILENAME_GENOTYPES, path(&paths.genotypes)),
                    (FILENAME_HAPLOTYPEFREQUENCIES, path(&paths.frequencies)),
                    (FILENAME_EPSILON_LOGL, path(&paths.epsilon)),
                ],
            ),
            (
                "#reports",
                vec![
                    (LOCI_AND_RESOLUTIONS, self.resolutions.to_file_value()),
                    (
                        MINIMAL_FREQUENCY_GENOTYPES,
                        format_float(self.minimal_frequency_genotypes),
                    ),
                    (DO_AMBIGUITYFILTER, bool_str(self.do_ambiguity_filter).into()),
                    (
                        EXPAND_LINES_AMBIGUITYFILTER,
                        bool_str(self.expand_lines_ambiguity_filter).into(),
                    ),
                    (WRITE_GENOTYPES, bool_str(self.write_genotypes).into()),
                ],
            ),
            (
                "#EM-algorithm",
                vec![
                    (
                        INITIALIZATION_HAPLOTYPEFREQUENCIES,
                        self.initialization.to_string(),
                    ),
                    (EPSILON, format_float(self.epsilon)),
                    (
                        CUT_HAPLOTYPEFREQUENCIES,
                        format_float(self.cut_haplotype_frequencies),
                    ),
                    (
                        RENORMALIZE_HAPLOTYPEFREQUENCIES,
                        bool_str(self.renormalize).into(),
                    ),
                    (SEED, self.seed.to_string()),
                ],
            ),
        ];

        let mut out = String::new();
        for (header, entries) in sections {
            out.push_str(header);
            out.push('\n');
            for (key, value) in entries {
                out.push_str(&format!("{key}={value}\n"));
            }
        }
        out
    }

    fn from_entries(path: &Path, entries: &IndexMap<String, String>) -> Result<Self> {
        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|key| !entries.contains_key(**key))
            .map(|key| key.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(eyre!(Error::InvalidParameterFile {
                path: path.to_path_buf(),
                missing,
            }));
        }

        // Checked above
        let get = |key: &str| entries.get(key).map(String::as_str).unwrap_or_default();

        let frequencies = PathBuf::from(get(FILENAME_HAPLOTYPEFREQUENCIES));
        let output_dir = frequencies
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let run_id = frequencies
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.split_once('_'))
            .map(|(id, _)| id.to_string())
            .unwrap_or_default();

        Ok(Self {
            input: PathBuf::from(get(FILENAME_INPUT)),
            output_dir,
            run_id,
            resolutions: LocusResolutionMap::from_file_value(get(LOCI_AND_RESOLUTIONS))?,
            minimal_frequency_genotypes: parse_float(
                MINIMAL_FREQUENCY_GENOTYPES,
                get(MINIMAL_FREQUENCY_GENOTYPES),
            )?,
            do_ambiguity_filter: parse_bool(DO_AMBIGUITYFILTER, get(DO_AMBIGUITYFILTER))?,
            expand_lines_ambiguity_filter: parse_bool(
                EXPAND_LINES_AMBIGUITYFILTER,
                get(EXPAND_LINES_AMBIGUITYFILTER),
            )?,
            write_genotypes: parse_bool(WRITE_GENOTYPES, get(WRITE_GENOTYPES))?,
            initialization: get(INITIALIZATION_HAPLOTYPEFREQUENCIES).parse()?,
            epsilon: parse_float(EPSILON, get(EPSILON))?,
            cut_haplotype_frequencies: parse_float(
                CUT_HAPLOTYPEFREQUENCIES,
                get(CUT_HAPLOTYPEFREQUENCIES),
            )?,
            renormalize: parse_bool(
                RENORMALIZE_HAPLOTYPEFREQUENCIES,
                get(RENORMALIZE_HAPLOTYPEFREQUENCIES),
            )?,
            seed: parse_seed(get(SEED))?,
        })
    }
}

/// The nine values a new configuration starts from.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ParameterDefaults {
    pub minimal_frequency_genotypes: f64,
    pub do_ambiguity_filter: bool,
    pub expand_lines_ambiguity_filter: bool,
    pub initialization: Initialization,
    pub epsilon: f64,
    pub cut_haplotype_frequencies: f64,
    pub renormalize: bool,
    pub seed: u32,
    pub write_genotypes: bool,
}

impl ParameterDefaults {
    pub const BUILT_IN: Self = Self {
        minimal_frequency_genotypes: 1e-5,
        do_ambiguity_filter: false,
        expand_lines_ambiguity_filter: false,
        initialization: Initialization::Perturbation,
        epsilon: 1e-6,
        cut_haplotype_frequencies: 1e-6,
        renormalize: false,
        seed: 0,
        write_genotypes: true,
    };

    pub fn to_file_string(&self) -> String {
        format!(
            "{MINIMAL_FREQUENCY_GENOTYPES}={}\n\
             {DO_AMBIGUITYFILTER}={}\n\
             {EXPAND_LINES_AMBIGUITYFILTER}={}\n\
             {INITIALIZATION_HAPLOTYPEFREQUENCIES}={}\n\
             {EPSILON}={}\n\
             {CUT_HAPLOTYPEFREQUENCIES}={}\n\
             {RENORMALIZE_HAPLOTYPEFREQUENCIES}={}\n\
             {SEED}={}\n\
             {WRITE_GENOTYPES}={}\n",
            format_float(self.minimal_frequency_genotypes),
            self.do_ambiguity_filter,
            self.expand_lines_ambiguity_filter,
            self.initialization,
            format_float(self.epsilon),
            format_float(self.cut_haplotype_frequencies),
            self.renormalize,
            self.seed,
            self.write_genotypes,
        )
    }

    /// Take every value from `entries`, falling back to the built-in value per key.
    /// Returns the keys that fell back.
    fn from_entries(entries: &IndexMap<String, String>) -> (Self, Vec<&'static str>) {
        let builtin = Self::BUILT_IN;
        let mut fallbacks = vec![];

        let mut take = |key: &'static str| {
            let value = entries.get(key).map(String::as_str);
            if value.is_none() {
                fallbacks.push(key);
            }
            value
        };

        let minimal = take(MINIMAL_FREQUENCY_GENOTYPES)
            .map(|v| parse_float(MINIMAL_FREQUENCY_GENOTYPES, v));
        let ambiguity = take(DO_AMBIGUITYFILTER).map(|v| parse_bool(DO_AMBIGUITYFILTER, v));
        let expand = take(EXPAND_LINES_AMBIGUITYFILTER)
            .map(|v| parse_bool(EXPAND_LINES_AMBIGUITYFILTER, v));
        let initialization =
            take(INITIALIZATION_HAPLOTYPEFREQUENCIES).map(|v| v.parse::<Initialization>());
        let epsilon = take(EPSILON).map(|v| parse_float(EPSILON, v));
        let cut = take(CUT_HAPLOTYPEFREQUENCIES).map(|v| parse_float(CUT_HAPLOTYPEFREQUENCIES, v));
        let renormalize = take(RENORMALIZE_HAPLOTYPEFREQUENCIES)
            .map(|v| parse_bool(RENORMALIZE_HAPLOTYPEFREQUENCIES, v));
        let seed = take(SEED).map(parse_seed);
        let write = take(WRITE_GENOTYPES).map(|v| parse_bool(WRITE_GENOTYPES, v));

        let defaults = Self {
            minimal_frequency_genotypes: resolve(
                &mut fallbacks,
                MINIMAL_FREQUENCY_GENOTYPES,
                minimal,
                builtin.minimal_frequency_genotypes,
            ),
            do_ambiguity_filter: resolve(
                &mut fallbacks,
                DO_AMBIGUITYFILTER,
                ambiguity,
                builtin.do_ambiguity_filter,
            ),
            expand_lines_ambiguity_filter: resolve(
                &mut fallbacks,
                EXPAND_LINES_AMBIGUITYFILTER,
                expand,
                builtin.expand_lines_ambiguity_filter,
            ),
            initialization: resolve(
                &mut fallbacks,
                INITIALIZATION_HAPLOTYPEFREQUENCIES,
                initialization,
                builtin.initialization,
            ),
            epsilon: resolve(&mut fallbacks, EPSILON, epsilon, builtin.epsilon),
            cut_haplotype_frequencies: resolve(
                &mut fallbacks,
                CUT_HAPLOTYPEFREQUENCIES,
                cut,
                builtin.cut_haplotype_frequencies,
            ),
            renormalize: resolve(
                &mut fallbacks,
                RENORMALIZE_HAPLOTYPEFREQUENCIES,
                renormalize,
                builtin.renormalize,
            ),
            seed: resolve(&mut fallbacks, SEED, seed, builtin.seed),
            write_genotypes: resolve(
                &mut fallbacks,
                WRITE_GENOTYPES,
                write,
                builtin.write_genotypes,
            ),
        };

        (defaults, fallbacks)
    }
}

fn resolve<T>(
    fallbacks: &mut Vec<&'static str>,
    key: &'static str,
    value: Option<Result<T>>,
    builtin: T,
) -> T {
    match value {
        Some(Ok(v)) => v,
        Some(Err(err)) => {
            tracing::warn!("Using the built-in default for {key}: {err}");
            fallbacks.push(key);
            builtin
        }
        None => builtin,
    }
}

impl Default for ParameterDefaults {
    fn default() -> Self {
        Self::BUILT_IN
    }
}

#[derive(Debug, Clone)]
pub struct LoadedDefaults {
    pub defaults: ParameterDefaults,
    /// A complete parameter set found in the default file.
    pub last_saved: Option<RunParameters>,
    /// The default file did not exist and every value is built in.
    pub missing_file: bool,
    /// Keys that were absent or unparsable and use the built-in value.
    pub fallbacks: Vec<&'static str>,
}

/// Read the default parameter file, falling back to [`ParameterDefaults::BUILT_IN`].
pub fn load_defaults(path: &Path) -> LoadedDefaults {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!("Default parameter file {path:?} could not be read ({err}), using built-in defaults");
            return LoadedDefaults {
                defaults: ParameterDefaults::BUILT_IN,
                last_saved: None,
                missing_file: true,
                fallbacks: vec![],
            };
        }
    };

    let entries = parse_key_values(&text);
    let (defaults, fallbacks) = ParameterDefaults::from_entries(&entries);

    if !fallbacks.is_empty() {
        tracing::info!("Built-in defaults used for {}", fallbacks.join(", "));
    }

    let last_saved = match RunParameters::from_entries(path, &entries) {
        Ok(p) => Some(p),
        Err(err) => {
            tracing::debug!("No complete parameter set in {path:?}: {err}");
            None
        }
    };

    LoadedDefaults {
        defaults,
        last_saved,
        missing_file: false,
        fallbacks,
    }
}

pub fn save_defaults(defaults: &ParameterDefaults, path: &Path) -> Result<()> {
    write_file(path, &defaults.to_file_string())
}

/// Parse a parameter file.
pub fn load(path: &Path) -> Result<RunParameters> {
    let text = read_to_string(path)?;
    let entries = parse_key_values(&text);
    RunParameters::from_entries(path, &entries)
        .wrap_err_with(|| format!("Failed to load parameters from {path:?}"))
}

/// Write a parameter file to each of `paths`.
pub fn save(params: &RunParameters, paths: &[&Path]) -> Result<()> {
    let contents = params.to_file_string();
    for path in paths {
        write_file(path, &contents)?;
        tracing::debug!("Wrote parameters to {path:?}");
    }
    Ok(())
}

/// `KEY=value` lines; `#` starts a comment line and the first `=` splits.
pub fn parse_key_values(text: &str) -> IndexMap<String, String> {
    let mut entries = IndexMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_once('=') {
            Some((key, value)) => {
                entries.insert(key.trim().to_string(), value.trim().to_string());
            }
            None => tracing::debug!("Skipping parameter line without '=': {line}"),
        }
    }
    entries
}

fn parse_float(key: &str, value: &str) -> Result<f64> {
    value.trim().parse::<f64>().map_err(|_| {
        eyre!(Error::InvalidValue {
            key: key.into(),
            value: value.into(),
        })
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(eyre!(Error::InvalidValue {
            key: key.into(),
            value: value.into(),
        })),
    }
}

fn parse_seed(value: &str) -> Result<u32> {
    match value.trim().parse::<u32>() {
        Ok(seed) if seed <= MAX_SEED => Ok(seed),
        _ => Err(eyre!(Error::InvalidSeed {
            value: value.into()
        })),
    }
}

fn check_unit_interval(key: &str, value: f64) -> Result<f64> {
    match value > 0.0 && value < 1.0 {
        true => Ok(value),
        false => Err(eyre!(Error::OutOfUnitInterval {
            key: key.into(),
            value: format_float(value),
        })),
    }
}

fn check_epsilon(value: f64, genotype_count: Option<usize>) -> Result<f64> {
    check_unit_interval(EPSILON, value)?;
    if let Some(bound) = genotype_count.and_then(recommended_epsilon) {
        if value > bound {
            return Err(eyre!(Error::EpsilonAboveBound {
                value: format_float(value),
                bound: format_float(bound),
            }));
        }
    }
    Ok(value)
}

pub fn validate_run_id(run_id: &str) -> Result<()> {
    match run_id.contains(FORBIDDEN_RUN_ID_CHARS) {
        true => Err(eyre!(Error::InvalidRunId {
            run_id: run_id.into()
        })),
        false => Ok(()),
    }
}

/// Fields that are typed in as free text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    RunId,
    MinimalFrequencyGenotypes,
    Epsilon,
    CutHaplotypeFrequencies,
    Seed,
}

impl Field {
    pub fn key(&self) -> &'static str {
        match self {
            Self::RunId => "RunID",
            Self::MinimalFrequencyGenotypes => MINIMAL_FREQUENCY_GENOTYPES,
            Self::Epsilon => EPSILON,
            Self::CutHaplotypeFrequencies => CUT_HAPLOTYPEFREQUENCIES,
            Self::Seed => SEED,
        }
    }

    /// Check `raw` as typed by the user. The epsilon bound applies only when the genotype
    /// count of the input is known.
    pub fn validate(&self, raw: &str, genotype_count: Option<usize>) -> Result<()> {
        let raw = raw.trim();
        match self {
            Self::RunId => validate_run_id(raw),
            Self::Seed => parse_seed(raw).map(|_| ()),
            Self::MinimalFrequencyGenotypes | Self::CutHaplotypeFrequencies => {
                let value = parse_float(self.key(), raw).map_err(|_| {
                    eyre!(Error::OutOfUnitInterval {
                        key: self.key().into(),
                        value: raw.into(),
                    })
                })?;
                check_unit_interval(self.key(), value).map(|_| ())
            }
            Self::Epsilon => {
                let value = parse_float(EPSILON, raw).map_err(|_| {
                    eyre!(Error::OutOfUnitInterval {
                        key: EPSILON.into(),
                        value: raw.into(),
                    })
                })?;
                check_epsilon(value, genotype_count).map(|_| ())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> RunParameters {
        let mut resolutions = LocusResolutionMap::new();
        resolutions.set("A", Resolution::SmallG);
        resolutions.set("B", Resolution::TwoField);
        resolutions.set("C", Resolution::Ignored);
        resolutions.set("DRB1", Resolution::FourField);

        RunParameters::from_defaults(
            PathBuf::from("/data/input.txt"),
            PathBuf::from("/data/results"),
            "Run1".into(),
            resolutions,
            &ParameterDefaults::BUILT_IN,
        )
    }

    #[test]
    fn derived_paths_follow_run_id() {
        let mut params = example();
        assert_eq!(
            PathBuf::from("/data/results/Run1_htf.dat"),
            params.paths().frequencies
        );

        params.run_id = String::new();
        params.output_dir = PathBuf::from("/other");
        let paths = params.paths();
        assert_eq!(PathBuf::from("/other/epsilon.dat"), paths.epsilon);
        assert_eq!(PathBuf::from("/other/log.dat"), paths.log);
        assert_eq!(
            PathBuf::from("/other/parametersGLSC"),
            params.parameter_copy(InputDialect::Glsc)
        );
    }

    #[test]
    fn parameter_file_layout() {
        insta::assert_snapshot!(example().to_file_string(), @r###"
        #file name
        FILENAME_INPUT=/data/input.txt
        FILENAME_HAPLOTYPES=/data/results/Run1_haplotypes.dat
        FILENAME_GENOTYPES=/data/results/Run1_genotypes.dat
        FILENAME_HAPLOTYPEFREQUENCIES=/data/results/Run1_htf.dat
        FILENAME_EPSILON_LOGL=/data/results/Run1_epsilon.dat
        #reports
        LOCI_AND_RESOLUTIONS=A:g,B:4d,DRB1:8d
        MINIMAL_FREQUENCY_GENOTYPES=1e-5
        DO_AMBIGUITYFILTER=false
        EXPAND_LINES_AMBIGUITYFILTER=false
        WRITE_GENOTYPES=true
        #EM-algorithm
        INITIALIZATION_HAPLOTYPEFREQUENCIES=perturbation
        EPSILON=1e-6
        CUT_HAPLOTYPEFREQUENCIES=1e-6
        RENORMALIZE_HAPLOTYPEFREQUENCIES=false
        SEED=0
        "###);
    }

    #[test]
    fn built_in_defaults_literal() {
        insta::assert_snapshot!(ParameterDefaults::BUILT_IN.to_file_string(), @r###"
        MINIMAL_FREQUENCY_GENOTYPES=1e-5
        DO_AMBIGUITYFILTER=false
        EXPAND_LINES_AMBIGUITYFILTER=false
        INITIALIZATION_HAPLOTYPEFREQUENCIES=perturbation
        EPSILON=1e-6
        CUT_HAPLOTYPEFREQUENCIES=1e-6
        RENORMALIZE_HAPLOTYPEFREQUENCIES=false
        SEED=0
        WRITE_GENOTYPES=true
        "###);
    }

    #[test]
    fn entries_round_trip() {
        let params = example();
        let entries = parse_key_values(&params.to_file_string());
        let loaded = RunParameters::from_entries(Path::new("mem"), &entries).unwrap();
        assert_eq!(params, loaded);
        assert_eq!(Resolution::Ignored, loaded.resolutions.get("C"));
    }

    #[test]
    fn missing_keys_are_listed() {
        let entries = parse_key_values("#file name\nFILENAME_INPUT=x\nSEED=3\n");
        let report = RunParameters::from_entries(Path::new("p"), &entries).unwrap_err();
        match report.downcast_ref::<Error>() {
            Some(Error::InvalidParameterFile { missing, .. }) => {
                assert_eq!(13, missing.len());
                assert_eq!(FILENAME_HAPLOTYPES, missing[0]);
            }
            _ => panic!("unexpected error {report}"),
        }
    }

    #[test]
    fn equals_sign_splits_once() {
        let entries = parse_key_values("# comment=1\nKEY=a=b\n\n  OTHER = 2 \nnoise\n");
        assert_eq!(2, entries.len());
        assert_eq!("a=b", entries["KEY"]);
        assert_eq!("2", entries["OTHER"]);
    }

    #[test]
    fn legacy_resolution_codes() {
        for (field, code) in [
            (Resolution::OneField, "2d"),
            (Resolution::TwoField, "4d"),
            (Resolution::ThreeField, "6d"),
            (Resolution::FourField, "8d"),
        ] {
            assert_eq!(Some(code), field.file_code());
            assert_eq!(field, Resolution::from_file_code(code).unwrap());
        }
        assert!(Resolution::from_file_code("1f").is_err());
        assert_eq!(None, Resolution::Ignored.file_code());
    }

    #[test]
    fn epsilon_is_bounded_by_genotype_count() {
        assert!(Field::Epsilon.validate("0.02", Some(40)).is_err());
        assert!(Field::Epsilon.validate("0.01", Some(40)).is_ok());
        assert!(Field::Epsilon.validate("0.0125", Some(40)).is_ok());
        assert!(Field::Epsilon.validate("0.02", None).is_ok());
        assert!(Field::Epsilon.validate("abc", None).is_err());
    }

    #[test]
    fn run_id_rejects_forbidden_characters() {
        assert!(validate_run_id("Run1").is_ok());
        assert!(validate_run_id("").is_ok());
        for bad in [
            "Run 1", "Run_1", "a\\b", "a/b", "a*", "a?", "a:b", "a\"", "a<", "a>", "a|b", "5%",
        ] {
            assert!(validate_run_id(bad).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn numeric_fields_are_range_checked() {
        assert!(Field::MinimalFrequencyGenotypes.validate("1e-5", None).is_ok());
        assert!(Field::MinimalFrequencyGenotypes.validate("1", None).is_err());
        assert!(Field::CutHaplotypeFrequencies.validate("0", None).is_err());
        assert!(Field::Seed.validate("1000000000", None).is_ok());
        assert!(Field::Seed.validate("1000000001", None).is_err());
        assert!(Field::Seed.validate("-1", None).is_err());
    }

    #[test]
    fn defaults_fall_back_per_key() {
        let entries = parse_key_values("EPSILON=1e-4\nSEED=many\n");
        let (defaults, fallbacks) = ParameterDefaults::from_entries(&entries);
        assert_eq!(1e-4, defaults.epsilon);
        assert_eq!(0, defaults.seed);
        assert!(fallbacks.contains(&SEED));
        assert!(fallbacks.contains(&MINIMAL_FREQUENCY_GENOTYPES));
        assert!(!fallbacks.contains(&EPSILON));
    }
}
