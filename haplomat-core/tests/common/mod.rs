#![allow(dead_code)]
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use haplomat_core::parameters::{LocusResolutionMap, ParameterDefaults, Resolution, RunParameters};

pub const MAC_INPUT: &str = "tests/data/mac_input.txt";
pub const GLSC_INPUT: &str = "tests/data/glsc_input.txt";
pub const INSTALLATION: &str = "tests/data/installation";
pub const FINISHED_RUN: &str = "tests/data/run";
pub const OUTDIR: &str = "tests/results";

/// Fresh scratch directory under `tests/results`.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::path::absolute(Path::new(OUTDIR).join(name)).unwrap();
    if dir.exists() {
        std::fs::remove_dir_all(&dir).unwrap();
    }
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Copy of the fixture installation that tests may add tools to.
pub fn scratch_installation(name: &str) -> PathBuf {
    let root = scratch_dir(name).join("installation");
    std::fs::create_dir_all(root.join("data")).unwrap();
    std::fs::create_dir_all(root.join("prepareData")).unwrap();
    for file in ["data/AllAllelesExpanded.txt", "prepareData/url_config.txt"] {
        std::fs::copy(Path::new(INSTALLATION).join(file), root.join(file)).unwrap();
    }
    root
}

pub fn abc_resolutions() -> LocusResolutionMap {
    [
        ("A".to_string(), Resolution::SmallG),
        ("B".to_string(), Resolution::SmallG),
        ("C".to_string(), Resolution::TwoField),
    ]
    .into_iter()
    .collect()
}

pub fn mac_parameters(output_dir: &Path, run_id: &str) -> RunParameters {
    RunParameters::from_defaults(
        std::path::absolute(MAC_INPUT).unwrap(),
        output_dir.to_path_buf(),
        run_id.into(),
        abc_resolutions(),
        &ParameterDefaults::BUILT_IN,
    )
}

/// Call `step` until it returns a value, failing the test after `timeout`.
pub fn wait_for<T>(timeout: Duration, mut step: impl FnMut() -> Option<T>) -> T {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = step() {
            return value;
        }
        assert!(Instant::now() < deadline, "timed out after {timeout:?}");
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, format!("#!/bin/sh\n{body}")).unwrap();
    let mut permissions = std::fs::metadata(path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(path, permissions).unwrap();
}
