use std::path::PathBuf;

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::error::Error;
use crate::parameters::{Initialization, ParameterDefaults};
use crate::results::{parse_cumulative, AxisScale, DisplayPolicy};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct SessionArgs {
    /// Directory holding the installation record and the default parameters
    #[cfg_attr(feature = "clap", arg(long, default_value_os_t = PathBuf::from("./"), value_hint = clap::ValueHint::DirPath))]
    pub config_dir: PathBuf,

    /// Hapl-o-Mat installation directory, recorded for later sessions
    #[cfg_attr(feature = "clap", arg(short = 'i', long, value_hint = clap::ValueHint::DirPath))]
    pub installation: Option<PathBuf>,

    /// Python interpreter running the data update
    #[cfg_attr(feature = "clap", arg(long))]
    pub python: Option<String>,
}

impl Default for SessionArgs {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("./"),
            installation: None,
            python: None,
        }
    }
}

/// Which part of the frequency table is shown. Without a flag the first 100 entries are.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct DisplayArgs {
    /// Show the N most frequent haplotypes
    #[cfg_attr(feature = "clap", arg(long, conflicts_with_all = ["all", "above_epsilon", "cumulative"]))]
    pub top: Option<usize>,

    /// Show every haplotype
    #[cfg_attr(feature = "clap", arg(long, conflicts_with_all = ["above_epsilon", "cumulative"]))]
    pub all: bool,

    /// Show haplotypes with a frequency of at least the recommended epsilon
    #[cfg_attr(feature = "clap", arg(long, conflicts_with = "cumulative"))]
    pub above_epsilon: bool,

    /// Show haplotypes until their cumulated frequency exceeds the threshold, e.g. 0.995
    #[cfg_attr(feature = "clap", arg(long))]
    pub cumulative: Option<f64>,
}

impl DisplayArgs {
    pub fn policy(&self) -> Result<DisplayPolicy> {
        Ok(match (self.top, self.all, self.above_epsilon, self.cumulative) {
            (Some(n), false, false, None) => DisplayPolicy::Top(n),
            (None, true, false, None) => DisplayPolicy::All,
            (None, false, true, None) => DisplayPolicy::AboveRecommendedEpsilon,
            (None, false, false, Some(t)) => {
                DisplayPolicy::CumulativeCutoff(parse_cumulative(&t.to_string())?)
            }
            (None, false, false, None) => DisplayPolicy::default(),
            _ => {
                return Err(eyre!(Error::InvalidValue {
                    key: "display".into(),
                    value: "more than one display option".into(),
                }))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct GraphArgs {
    /// Graph width in px
    #[cfg_attr(feature = "clap", arg(long, default_value_t = 1200.0))]
    pub width: f32,

    /// Graph height in px
    #[cfg_attr(feature = "clap", arg(long, default_value_t = 800.0))]
    pub height: f32,

    // Font size
    #[cfg_attr(feature = "clap", arg(long, default_value_t = 18.0))]
    pub font_size: f32,

    // Marker radius
    #[cfg_attr(feature = "clap", arg(long, default_value_t = 3.0))]
    pub radius: f32,

    // Font and axis color
    #[cfg_attr(feature = "clap", arg(long, default_value_t = String::from("black")))]
    pub color: String,

    // Marker color
    #[cfg_attr(feature = "clap", arg(long, default_value_t = String::from("#1f77b4")))]
    pub marker_color: String,

    // Background color
    #[cfg_attr(feature = "clap", arg(long, default_value_t = String::from("white")))]
    pub background_color: String,

    /// Logarithmic x axis
    #[cfg_attr(feature = "clap", arg(long))]
    pub log_x: bool,

    /// Logarithmic y axis
    #[cfg_attr(feature = "clap", arg(long))]
    pub log_y: bool,
}

impl GraphArgs {
    pub fn scales(&self) -> (AxisScale, AxisScale) {
        (AxisScale::from_log(self.log_x), AxisScale::from_log(self.log_y))
    }
}

impl Default for GraphArgs {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            font_size: 18.0,
            radius: 3.0,
            color: String::from("black"),
            marker_color: String::from("#1f77b4"),
            background_color: String::from("white"),
            log_x: false,
            log_y: false,
        }
    }
}

/// Estimation settings. Unset values come from the default parameter file.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct EstimationArgs {
    /// Minimal frequency of genotypes kept by the ambiguity filter
    #[cfg_attr(feature = "clap", arg(long))]
    pub minimal_frequency_genotypes: Option<f64>,

    /// Filter ambiguous genotypes
    #[cfg_attr(feature = "clap", arg(long))]
    pub do_ambiguity_filter: Option<bool>,

    /// Expand lines of the ambiguity filter
    #[cfg_attr(feature = "clap", arg(long))]
    pub expand_lines_ambiguity_filter: Option<bool>,

    /// Write the processed genotypes
    #[cfg_attr(feature = "clap", arg(long))]
    pub write_genotypes: Option<bool>,

    #[cfg_attr(feature = "clap", arg(long, value_enum))]
    pub initialization: Option<Initialization>,

    /// Stopping criterion of the EM algorithm
    #[cfg_attr(feature = "clap", arg(short = 'e', long))]
    pub epsilon: Option<f64>,

    /// Haplotype frequencies below this value are cut
    #[cfg_attr(feature = "clap", arg(long))]
    pub cut_haplotype_frequencies: Option<f64>,

    /// Renormalize the frequencies after cutting
    #[cfg_attr(feature = "clap", arg(long))]
    pub renormalize: Option<bool>,

    #[cfg_attr(feature = "clap", arg(long))]
    pub seed: Option<u32>,
}

impl EstimationArgs {
    /// Overlay the given values on `defaults`.
    pub fn apply(&self, defaults: &ParameterDefaults) -> ParameterDefaults {
        ParameterDefaults {
            minimal_frequency_genotypes: self
                .minimal_frequency_genotypes
                .unwrap_or(defaults.minimal_frequency_genotypes),
            do_ambiguity_filter: self
                .do_ambiguity_filter
                .unwrap_or(defaults.do_ambiguity_filter),
            expand_lines_ambiguity_filter: self
                .expand_lines_ambiguity_filter
                .unwrap_or(defaults.expand_lines_ambiguity_filter),
            initialization: self.initialization.unwrap_or(defaults.initialization),
            epsilon: self.epsilon.unwrap_or(defaults.epsilon),
            cut_haplotype_frequencies: self
                .cut_haplotype_frequencies
                .unwrap_or(defaults.cut_haplotype_frequencies),
            renormalize: self.renormalize.unwrap_or(defaults.renormalize),
            seed: self.seed.unwrap_or(defaults.seed),
            write_genotypes: self.write_genotypes.unwrap_or(defaults.write_genotypes),
        }
    }
}
