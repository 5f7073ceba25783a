use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::io::read_to_string;
use crate::notice::UserNotice;
use crate::parameters::LocusResolutionMap;
use crate::utils::{join_with_and, recommended_epsilon};

/// Input formats understood by the estimator.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum InputDialect {
    /// Multiple allele codes, one column per locus
    #[cfg_attr(feature = "clap", value(name = "MAC"))]
    Mac,
    /// Allele lists (GL strings), alleles written as `A*01:01`
    #[cfg_attr(feature = "clap", value(name = "GLSC"))]
    Glsc,
}

impl InputDialect {
    /// The single positional argument passed to the estimator.
    pub fn as_arg(&self) -> &'static str {
        match self {
            Self::Mac => "MAC",
            Self::Glsc => "GLSC",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Mac => "multiple-allele-code",
            Self::Glsc => "allele-list",
        }
    }

    /// Parameter file the estimator reads for this dialect.
    pub fn parameter_file(&self, installation: &Path) -> PathBuf {
        installation.join(format!("parameters{}", self.as_arg()))
    }

    pub fn detect(contents: &str) -> Self {
        match contents.contains('*') {
            true => Self::Glsc,
            false => Self::Mac,
        }
    }
}

impl fmt::Display for InputDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct InputSummary {
    pub path: PathBuf,
    pub dialect: InputDialect,
    /// Deduplicated and sorted
    pub loci: Vec<String>,
    pub genotype_count: usize,
}

impl InputSummary {
    pub fn recommended_epsilon(&self) -> Option<f64> {
        recommended_epsilon(self.genotype_count)
    }
}

/// Detect the dialect, loci and genotype count of an input file.
pub fn probe_input(path: &Path) -> Result<InputSummary> {
    let contents = read_to_string(path)?;
    let summary = summarize_input(path, &contents)?;

    tracing::info!(
        "Input {path:?}: {} format, {} genotypes, loci {}",
        summary.dialect.describe(),
        summary.genotype_count,
        summary.loci.join(", ")
    );

    Ok(summary)
}

fn summarize_input(path: &Path, contents: &str) -> Result<InputSummary> {
    let dialect = InputDialect::detect(contents);
    let mut lines = contents.lines();

    let header = lines.next().ok_or_else(|| {
        eyre!(Error::NoGenotypes {
            path: path.to_path_buf()
        })
    })?;

    let loci: BTreeSet<String> = header
        .trim_end_matches(['\r', '\n'])
        .split('\t')
        .skip(1)
        .map(|column| match dialect {
            InputDialect::Mac => column,
            InputDialect::Glsc => column.split_once('*').map_or(column, |(locus, _)| locus),
        })
        .map(str::trim)
        .filter(|locus| !locus.is_empty())
        .map(str::to_string)
        .collect();

    let genotype_count = lines.filter(|line| !line.trim().is_empty()).count();

    Ok(InputSummary {
        path: path.to_path_buf(),
        dialect,
        loci: loci.into_iter().collect(),
        genotype_count,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedLoci {
    /// Input loci known to the reference data, each with its carried over choice or ignored
    pub map: LocusResolutionMap,
    /// Loci of the input that the reference data does not know
    pub missing: Vec<String>,
}

impl ResolvedLoci {
    pub fn missing_notice(&self) -> Option<UserNotice> {
        missing_loci_notice(&self.missing)
    }
}

/// Cross-reference input loci against the loci of the installed reference data.
pub fn resolve_loci<S: AsRef<str>>(
    loci: &[String],
    known: &[S],
    previous: &LocusResolutionMap,
) -> ResolvedLoci {
    let (resolvable, missing): (Vec<&String>, Vec<&String>) = loci
        .iter()
        .partition(|locus| known.iter().any(|k| k.as_ref() == locus.as_str()));

    if !missing.is_empty() {
        tracing::warn!(
            "No reference data for {}, these loci are ignored",
            join_with_and(&missing)
        );
    }

    ResolvedLoci {
        map: previous.carry_over(resolvable),
        missing: missing.into_iter().cloned().collect(),
    }
}

pub fn missing_loci_notice(missing: &[String]) -> Option<UserNotice> {
    match missing.is_empty() {
        true => None,
        false => Some(UserNotice::warning(
            "Input file: Invalid locus/loci.",
            format!(
                "For Loci\n{}\nno allele information is available in the current IPD-IMGT/HLA data. \
                 These loci will be ignored in the haplotype frequency estimation.",
                join_with_and(missing)
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use crate::parameters::Resolution;

    use super::*;

    #[test]
    fn glsc_loci_are_prefixes() {
        let contents = "ID\tA*01:01+A*02:01\tA*03:01\tB*07:02+B*08:01\n1\tx\ty\tz\n";
        let summary = summarize_input(Path::new("in"), contents).unwrap();
        assert_eq!(InputDialect::Glsc, summary.dialect);
        assert_eq!(vec!["A", "B"], summary.loci);
        assert_eq!(1, summary.genotype_count);
    }

    #[test]
    fn mac_header_only_has_no_genotypes() {
        let summary = summarize_input(Path::new("in"), "GTID\tA\tB\n").unwrap();
        assert_eq!(InputDialect::Mac, summary.dialect);
        assert_eq!(0, summary.genotype_count);
        assert_eq!(None, summary.recommended_epsilon());
    }

    #[test]
    fn earlier_choices_are_carried_over() {
        let mut previous = LocusResolutionMap::new();
        previous.set("A", Resolution::BigG);
        previous.set("Z", Resolution::P);

        let loci = vec!["A".to_string(), "B".to_string(), "X".to_string()];
        let resolved = resolve_loci(&loci, &["A", "B", "C"], &previous);

        assert_eq!(Resolution::BigG, resolved.map.get("A"));
        assert_eq!(Resolution::Ignored, resolved.map.get("B"));
        assert_eq!(vec!["A", "B"], resolved.map.loci().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(vec!["X"], resolved.missing);

        let notice = resolved.missing_notice().unwrap();
        assert!(notice.body.starts_with("For Loci\nX\n"));
    }
}
