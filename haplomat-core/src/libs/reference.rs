use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Duration, Local};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::Serialize;

use crate::error::Error;
use crate::io::{read_lines, read_to_string, write_file};
use crate::notice::UserNotice;

/// Reference data older than this is flagged for an update (about three months).
pub const STALE_AFTER_MINUTES: i64 = 130_000;

/// Files the update tool downloads. Already present files are not downloaded again.
pub const DOWNLOAD_FILES: [&str; 4] = [
    "hla_nom_p.txt",
    "hla_nom_g.txt",
    "alpha.v3.zip",
    "hla_ambigs.xml.zip",
];

pub const LOCI_PER_ROW: usize = 10;

/// Layout of a Hapl-o-Mat installation directory.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Installation {
    pub root: PathBuf,
}

impl Installation {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn reference_file(&self) -> PathBuf {
        self.root.join("data").join("AllAllelesExpanded.txt")
    }

    pub fn prepare_data_dir(&self) -> PathBuf {
        self.root.join("prepareData")
    }

    pub fn url_config(&self) -> PathBuf {
        self.prepare_data_dir().join("url_config.txt")
    }

    pub fn estimator(&self) -> PathBuf {
        match cfg!(windows) {
            true => self.root.join("Hapl-o-Mat.exe"),
            false => self.root.join("haplomat"),
        }
    }

    /// Locate the reference data update tool. A native `BuildData.exe` is preferred on
    /// Windows, otherwise `BuildData.py` is run with `python`.
    pub fn update_tool(&self, python: &str) -> Option<UpdateTool> {
        let dir = self.prepare_data_dir();

        let exe = dir.join("BuildData.exe");
        if cfg!(windows) && exe.is_file() {
            return Some(UpdateTool {
                program: exe,
                args: vec![],
                working_dir: dir,
            });
        }

        let script = dir.join("BuildData.py");
        match script.is_file() {
            true => Some(UpdateTool {
                program: PathBuf::from(python),
                args: vec!["BuildData.py".into()],
                working_dir: dir,
            }),
            false => None,
        }
    }

    /// Download files already present in `prepareData`.
    pub fn existing_downloads(&self) -> Vec<&'static str> {
        let dir = self.prepare_data_dir();
        DOWNLOAD_FILES
            .into_iter()
            .filter(|name| dir.join(name).is_file())
            .collect()
    }

    pub fn existing_downloads_notice(&self) -> Option<UserNotice> {
        let existing = self.existing_downloads();
        match existing.is_empty() {
            true => None,
            false => Some(UserNotice::warning(
                "File handling",
                format!(
                    "Some of the download files needed for data processing are already present in the \
                     target directory and will not be refreshed ({}).\n\
                     If you want to download current data files please abort the download process and \
                     remove the files from the Hapl-o-Mat directory 'prepareData'.\n\
                     If you have inserted the files manually, please ignore this message.",
                    existing.join(", ")
                ),
            )),
        }
    }
}

pub fn default_python() -> &'static str {
    match cfg!(windows) {
        true => "python",
        false => "python3",
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateTool {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
    Current,
    /// Older than [`STALE_AFTER_MINUTES`]
    Stale,
}

/// Status shown next to the reference data and installation.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusIndicator {
    Ok,
    Error,
    Caution,
    Unavailable,
}

/// Snapshot of the installed reference dataset.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ReferenceData {
    pub path: PathBuf,
    /// Deduplicated and sorted
    pub loci: Vec<String>,
    pub last_updated: DateTime<Local>,
}

impl ReferenceData {
    /// Read the reference data of `installation`. A missing file means no data is installed.
    pub fn load(installation: &Installation) -> Result<Option<Self>> {
        let path = installation.reference_file();
        if !path.is_file() {
            tracing::info!("No reference data at {path:?}");
            return Ok(None);
        }

        let modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .unwrap_or_else(|_| SystemTime::now());

        let loci = read_lines(&path)?
            .map_while(std::result::Result::ok)
            .filter_map(|line| {
                let locus = line.split('*').next().unwrap_or_default().trim().to_string();
                (!locus.is_empty()).then_some(locus)
            })
            .sorted()
            .dedup()
            .collect::<Vec<String>>();

        tracing::info!("Reference data knows {} loci", loci.len());

        Ok(Some(Self {
            path,
            loci,
            last_updated: DateTime::<Local>::from(modified),
        }))
    }

    pub fn freshness_at(&self, now: DateTime<Local>) -> Freshness {
        match now - self.last_updated > Duration::minutes(STALE_AFTER_MINUTES) {
            true => Freshness::Stale,
            false => Freshness::Current,
        }
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness_at(Local::now())
    }

    pub fn indicator(&self) -> StatusIndicator {
        match self.freshness() {
            Freshness::Current => StatusIndicator::Ok,
            Freshness::Stale => StatusIndicator::Caution,
        }
    }

    pub fn status_text(&self) -> String {
        let date = self.last_updated.format("%b %d, %Y");
        match self.freshness() {
            Freshness::Current => format!("Last data update:\n{date}"),
            Freshness::Stale => format!("Last data update:\n{date}\nPlease consider an update."),
        }
    }

    /// Known loci for display, [`LOCI_PER_ROW`] per row.
    pub fn loci_rows(&self) -> Vec<String> {
        self.loci
            .chunks(LOCI_PER_ROW)
            .map(|row| row.join(", "))
            .collect()
    }
}

/// Download sources of the update tool, `file=url` per line.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct DataSources(IndexMap<String, String>);

impl DataSources {
    /// Read the sources. Entries for files the update tool does not download are dropped
    /// and returned separately.
    pub fn read(installation: &Installation) -> Result<(Self, Vec<String>)> {
        let text = read_to_string(&installation.url_config())?;
        Ok(Self::parse(&text))
    }

    fn parse(text: &str) -> (Self, Vec<String>) {
        let mut sources = IndexMap::new();
        let mut unknown = vec![];

        for line in text.lines() {
            let line = line.trim_end_matches(['\r', '\n']);
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let (name, url) = line.split_once('=').unwrap_or((line, ""));
            match DOWNLOAD_FILES.contains(&name) {
                true => {
                    sources.insert(name.to_string(), url.to_string());
                }
                false => {
                    tracing::warn!("Unknown parameter in url_config.txt: {name}");
                    unknown.push(name.to_string());
                }
            }
        }

        (Self(sources), unknown)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn set(&mut self, name: &str, url: &str) -> Result<()> {
        match DOWNLOAD_FILES.contains(&name) {
            true => {
                self.0.insert(name.to_string(), url.trim().to_string());
                Ok(())
            }
            false => Err(eyre!(Error::UnknownSource { name: name.into() })),
        }
    }

    /// Every download file in its fixed order, empty when no url is set.
    pub fn to_file_string(&self) -> String {
        DOWNLOAD_FILES
            .iter()
            .map(|name| format!("{name}={}\n", self.get(name).unwrap_or_default()))
            .collect()
    }

    pub fn write(&self, installation: &Installation) -> Result<()> {
        let path = installation.url_config();
        write_file(&path, &self.to_file_string())?;
        tracing::info!("Saved download sources to {path:?}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(age_minutes: i64, now: DateTime<Local>) -> ReferenceData {
        ReferenceData {
            path: PathBuf::from("AllAllelesExpanded.txt"),
            loci: (1..=23).map(|i| format!("L{i:02}")).collect(),
            last_updated: now - Duration::minutes(age_minutes),
        }
    }

    #[test]
    fn staleness_threshold() {
        let now = Local::now();
        assert_eq!(Freshness::Current, reference(130_000, now).freshness_at(now));
        assert_eq!(Freshness::Stale, reference(130_001, now).freshness_at(now));
    }

    #[test]
    fn ten_loci_per_row() {
        let rows = reference(0, Local::now()).loci_rows();
        assert_eq!(3, rows.len());
        assert!(rows[0].starts_with("L01, L02"));
        assert!(rows[0].ends_with("L10"));
        assert_eq!("L21, L22, L23", rows[2]);
    }

    #[test]
    fn sources_keep_known_files() {
        let (mut sources, unknown) = DataSources::parse(
            "# sources\nhla_nom_p.txt=https://a/p.txt\nother.txt=x\nalpha.v3.zip=https://a/alpha=1\n",
        );
        assert_eq!(vec!["other.txt"], unknown);
        assert_eq!(Some("https://a/alpha=1"), sources.get("alpha.v3.zip"));

        assert!(sources.set("hla_nom_g.txt", "https://a/g.txt").is_ok());
        assert!(sources.set("other.txt", "x").is_err());

        assert_eq!(
            "hla_nom_p.txt=https://a/p.txt\nhla_nom_g.txt=https://a/g.txt\nalpha.v3.zip=https://a/alpha=1\nhla_ambigs.xml.zip=\n",
            sources.to_file_string()
        );
    }
}
