use std::fs::File;
use std::path::Path;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use itertools::Itertools;
use serde::Serialize;

use crate::error::Error;
use crate::io::{get_tsv_reader, read_to_string};
use crate::notice::UserNotice;
use crate::parameters::RunPaths;
use crate::utils::{format_scientific, recommended_epsilon};

pub const LEFTOVER_GENOTYPES: &str = "Leftover genotypes";
pub const SUM_CUT_FREQUENCIES: &str = "Sum cutted haplotype frequencies";

pub const DEFAULT_TOP: usize = 100;
pub const DEFAULT_CUMULATIVE: f64 = 0.995;

/// One line of the haplotype frequency file.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct HaplotypeFrequency {
    pub label: String,
    pub frequency: f64,
    /// The line as written by the estimator
    pub raw: String,
}

/// Read `label<TAB>frequency` lines in file order. Malformed lines are skipped.
pub fn read_frequencies(path: &Path) -> Result<Vec<HaplotypeFrequency>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(eyre!(Error::MissingResultFile {
                path: path.to_path_buf()
            }))
        }
        Err(err) => {
            return Err(err).wrap_err(Error::Io {
                path: path.to_path_buf(),
            })
        }
    };

    let mut rdr = get_tsv_reader(file, false);
    let mut frequencies = vec![];

    for (idx, record) in rdr.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                tracing::debug!("Skipping line {} of {path:?}: {err}", idx + 1);
                continue;
            }
        };

        let parsed = match (record.get(0), record.get(1)) {
            (Some(label), Some(freq)) => freq
                .trim()
                .parse::<f64>()
                .ok()
                .map(|frequency| (label.trim().to_string(), frequency)),
            _ => None,
        };

        match parsed {
            Some((label, frequency)) => frequencies.push(HaplotypeFrequency {
                label,
                frequency,
                raw: record.iter().join("\t").trim().to_string(),
            }),
            None => tracing::debug!("Skipping malformed line {} of {path:?}", idx + 1),
        }
    }

    Ok(frequencies)
}

/// Prefix sums over file order.
pub fn cumulative_sums(frequencies: &[HaplotypeFrequency]) -> Vec<f64> {
    frequencies
        .iter()
        .scan(0.0, |sum, h| {
            *sum += h.frequency;
            Some(*sum)
        })
        .collect()
}

/// First index whose cumulative sum exceeds `threshold`.
pub fn cumulative_cutoff_index(cumulative: &[f64], threshold: f64) -> Option<usize> {
    cumulative.iter().position(|sum| *sum > threshold)
}

/// Read the epsilon trace, one value per line (extra tab-separated columns are ignored).
///
/// A missing file is an empty trace. The estimator appends to the file while it runs:
/// a last line without its newline is still being written and is dropped, and reading
/// stops at the first line that does not parse.
pub fn read_trace(path: &Path) -> Vec<f64> {
    let Ok(text) = std::fs::read_to_string(path) else {
        return vec![];
    };

    let complete = match text.rfind('\n') {
        Some(end) => &text[..end],
        None => "",
    };

    complete
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split('\t').next().unwrap_or_default().trim().parse::<f64>())
        .map_while(|value| value.ok())
        .collect()
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct LogStatistics {
    pub genotype_count: usize,
    /// Raw text of the retained mass as written in the log
    pub cut_mass: String,
}

/// Value after `": "` on the first line containing `marker`.
fn marker_value<'a>(log: &'a str, marker: &str) -> Option<&'a str> {
    log.lines()
        .find(|line| line.contains(marker))
        .and_then(|line| line.trim().split_once(": "))
        .map(|(_, value)| value.trim())
}

pub fn parse_log(log: &str, path: &Path) -> Result<LogStatistics> {
    let missing = |marker: &str| {
        eyre!(Error::MissingLogMarker {
            path: path.to_path_buf(),
            marker: marker.into(),
        })
    };

    let genotype_count = marker_value(log, LEFTOVER_GENOTYPES)
        .ok_or_else(|| missing(LEFTOVER_GENOTYPES))?
        .parse::<usize>()
        .map_err(|_| missing(LEFTOVER_GENOTYPES))?;

    // Not written when no genotypes are left
    let cut_mass = match marker_value(log, SUM_CUT_FREQUENCIES) {
        Some(value) => value.to_string(),
        None if genotype_count == 0 => String::new(),
        None => return Err(missing(SUM_CUT_FREQUENCIES)),
    };

    Ok(LogStatistics {
        genotype_count,
        cut_mass,
    })
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Statistics {
    pub haplotype_count: usize,
    pub genotype_count: usize,
    pub recommended_epsilon: f64,
    pub recommended_epsilon_text: String,
    pub above_recommended_epsilon: usize,
    pub cut_mass: String,
}

/// Outputs of a succeeded run.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ResultSet {
    pub frequencies: Vec<HaplotypeFrequency>,
    pub cumulative: Vec<f64>,
    pub genotype_count: usize,
    pub cut_mass: String,
    pub trace: Vec<f64>,
    pub recommended_epsilon: f64,
    /// Haplotypes with frequency at least the recommended epsilon
    pub above_recommended_epsilon: usize,
}

impl ResultSet {
    pub fn new(
        frequencies: Vec<HaplotypeFrequency>,
        stats: LogStatistics,
        trace: Vec<f64>,
    ) -> Option<Self> {
        let recommended_epsilon = recommended_epsilon(stats.genotype_count)?;
        let cumulative = cumulative_sums(&frequencies);
        let above_recommended_epsilon = frequencies
            .iter()
            .filter(|h| h.frequency >= recommended_epsilon)
            .count();

        Some(Self {
            frequencies,
            cumulative,
            genotype_count: stats.genotype_count,
            cut_mass: stats.cut_mass,
            trace,
            recommended_epsilon,
            above_recommended_epsilon,
        })
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn statistics(&self) -> Statistics {
        Statistics {
            haplotype_count: self.len(),
            genotype_count: self.genotype_count,
            recommended_epsilon: self.recommended_epsilon,
            recommended_epsilon_text: format_scientific(self.recommended_epsilon, 3),
            above_recommended_epsilon: self.above_recommended_epsilon,
            cut_mass: self.cut_mass.clone(),
        }
    }

    /// Number of leading entries shown under `policy`.
    pub fn display_count(&self, policy: DisplayPolicy) -> usize {
        let count = match policy {
            DisplayPolicy::Top(n) => n,
            DisplayPolicy::All => self.len(),
            DisplayPolicy::AboveRecommendedEpsilon => self.above_recommended_epsilon,
            DisplayPolicy::CumulativeCutoff(threshold) => {
                match cumulative_cutoff_index(&self.cumulative, threshold) {
                    Some(idx) => idx + 1,
                    None => self.len(),
                }
            }
        };
        count.min(self.len())
    }

    pub fn displayed(&self, policy: DisplayPolicy) -> &[HaplotypeFrequency] {
        &self.frequencies[..self.display_count(policy)]
    }

    /// Displayed lines as written by the estimator.
    pub fn table(&self, policy: DisplayPolicy) -> String {
        self.displayed(policy).iter().map(|h| &h.raw).join("\n")
    }

    /// Frequency against 1-based rank of the displayed entries.
    pub fn frequency_points(&self, policy: DisplayPolicy, x: AxisScale, y: AxisScale) -> Vec<[f64; 2]> {
        let values: Vec<f64> = self.displayed(policy).iter().map(|h| h.frequency).collect();
        rank_points(&values, x, y)
    }

    /// Epsilon against 1-based iteration over the full trace.
    pub fn trace_points(&self, x: AxisScale, y: AxisScale) -> Vec<[f64; 2]> {
        rank_points(&self.trace, x, y)
    }
}

/// Which leading entries of the frequency table are shown.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub enum DisplayPolicy {
    Top(usize),
    All,
    AboveRecommendedEpsilon,
    /// Up to and including the first entry whose cumulative sum exceeds the threshold
    CumulativeCutoff(f64),
}

impl Default for DisplayPolicy {
    fn default() -> Self {
        Self::Top(DEFAULT_TOP)
    }
}

/// Parse the TOP entry field.
pub fn parse_top(raw: &str) -> Result<usize> {
    raw.trim().parse::<usize>().map_err(|_| {
        eyre!(Error::InvalidValue {
            key: "TOP".into(),
            value: raw.into(),
        })
    })
}

/// Parse the cumulative frequency field, a float strictly between 0 and 1.
pub fn parse_cumulative(raw: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(t) if t > 0.0 && t < 1.0 => Ok(t),
        _ => Err(eyre!(Error::OutOfUnitInterval {
            key: "cumulated frequency".into(),
            value: raw.into(),
        })),
    }
}

#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AxisScale {
    #[default]
    Linear,
    Log10,
}

impl AxisScale {
    pub fn from_log(log: bool) -> Self {
        match log {
            true => Self::Log10,
            false => Self::Linear,
        }
    }

    /// `None` for values a log axis cannot show.
    pub fn apply(&self, value: f64) -> Option<f64> {
        match self {
            Self::Linear => Some(value),
            Self::Log10 if value > 0.0 => Some(value.log10()),
            Self::Log10 => None,
        }
    }
}

pub fn rank_points(values: &[f64], x: AxisScale, y: AxisScale) -> Vec<[f64; 2]> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| Some([x.apply((i + 1) as f64)?, y.apply(*v)?]))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Ingestion {
    /// The log reports no evaluated genotypes, nothing is presented
    NoGenotypes(LogStatistics),
    Ready(ResultSet),
}

impl Ingestion {
    pub fn notice(&self) -> Option<UserNotice> {
        match self {
            Self::NoGenotypes(_) => Some(UserNotice::warning(
                "No genotypes evaluated",
                "The run log reports no leftover genotypes. No results are shown.",
            )),
            Self::Ready(_) => None,
        }
    }

    pub fn result_set(&self) -> Option<&ResultSet> {
        match self {
            Self::Ready(results) => Some(results),
            Self::NoGenotypes(_) => None,
        }
    }
}

/// Build the results of a succeeded run from its log and output files.
pub fn ingest(paths: &RunPaths) -> Result<Ingestion> {
    let log = read_to_string(&paths.log).map_err(|_| {
        eyre!(Error::MissingResultFile {
            path: paths.log.clone()
        })
    })?;
    let stats = parse_log(&log, &paths.log)?;

    if stats.genotype_count == 0 {
        tracing::warn!("No genotypes evaluated");
        return Ok(Ingestion::NoGenotypes(stats));
    }

    let frequencies = read_frequencies(&paths.frequencies)?;
    let trace = read_trace(&paths.epsilon);

    tracing::info!(
        "Read {} haplotype frequencies and {} trace values",
        frequencies.len(),
        trace.len()
    );

    match ResultSet::new(frequencies, stats.clone(), trace) {
        Some(results) => Ok(Ingestion::Ready(results)),
        None => Ok(Ingestion::NoGenotypes(stats)),
    }
}

/// Output paths of a finished run recovered from its parameter file.
pub fn paths_from_parameters(parameter_file: &Path) -> Result<RunPaths> {
    Ok(crate::parameters::load(parameter_file)?.paths())
}
