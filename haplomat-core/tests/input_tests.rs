mod common;
use common::{GLSC_INPUT, INSTALLATION, MAC_INPUT};

#[cfg(test)]
mod input {
    use super::*;

    use std::path::Path;

    use haplomat_core::error::Error;
    use haplomat_core::loci::{probe_input, resolve_loci, InputDialect};
    use haplomat_core::parameters::{LocusResolutionMap, Resolution};
    use haplomat_core::reference::{
        DataSources, Installation, ReferenceData, StatusIndicator, DOWNLOAD_FILES,
    };
    use haplomat_core::utils::format_scientific;

    #[test]
    fn probe_mac_input() {
        let summary = probe_input(Path::new(MAC_INPUT)).unwrap();
        assert_eq!(InputDialect::Mac, summary.dialect);
        assert_eq!(vec!["A", "B", "C"], summary.loci);
        assert_eq!(40, summary.genotype_count);
        assert_eq!(Some(0.0125), summary.recommended_epsilon());
        assert_eq!(
            "1.250e-02",
            format_scientific(summary.recommended_epsilon().unwrap(), 3)
        );
    }

    #[test]
    fn probe_glsc_input() {
        let summary = probe_input(Path::new(GLSC_INPUT)).unwrap();
        assert_eq!(InputDialect::Glsc, summary.dialect);
        assert_eq!(vec!["A", "B", "DPB1"], summary.loci);
        assert_eq!(5, summary.genotype_count);
    }

    #[test]
    fn missing_input_file() {
        let report = probe_input(Path::new("tests/data/no_such_input.txt")).unwrap_err();
        assert!(matches!(
            report.downcast_ref::<Error>(),
            Some(Error::FileNotFound { .. })
        ));
    }

    #[test]
    fn reference_loci() {
        let installation = Installation::new(INSTALLATION);
        let reference = ReferenceData::load(&installation).unwrap().unwrap();
        assert_eq!(vec!["A", "B", "C", "DQB1", "DRB1"], reference.loci);
        assert_eq!(StatusIndicator::Ok, reference.indicator());
        assert_eq!(vec!["A, B, C, DQB1, DRB1"], reference.loci_rows());

        let empty = Installation::new("tests/data");
        assert!(ReferenceData::load(&empty).unwrap().is_none());
    }

    #[test]
    fn loci_missing_from_reference_are_reported() {
        let installation = Installation::new(INSTALLATION);
        let reference = ReferenceData::load(&installation).unwrap().unwrap();
        let summary = probe_input(Path::new(GLSC_INPUT)).unwrap();

        let mut previous = LocusResolutionMap::new();
        previous.set("A", Resolution::P);
        let resolved = resolve_loci(&summary.loci, reference.loci.as_slice(), &previous);

        assert_eq!(vec!["DPB1"], resolved.missing);
        assert_eq!(Resolution::P, resolved.map.get("A"));
        assert_eq!(Resolution::Ignored, resolved.map.get("B"));
        assert_eq!(Resolution::Ignored, resolved.map.get("DPB1"));
        assert!(resolved.missing_notice().unwrap().body.contains("DPB1"));

        let summary = probe_input(Path::new(MAC_INPUT)).unwrap();
        let resolved = resolve_loci(&summary.loci, reference.loci.as_slice(), &previous);
        assert!(resolved.missing.is_empty());
        assert!(resolved.missing_notice().is_none());
    }

    #[test]
    fn download_sources() {
        let installation = Installation::new(INSTALLATION);
        let (sources, unknown) = DataSources::read(&installation).unwrap();
        assert!(unknown.is_empty());
        assert_eq!(
            DOWNLOAD_FILES.to_vec(),
            sources.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>()
        );
        assert!(sources.get("hla_nom_g.txt").unwrap().ends_with("hla_nom_g.txt"));
        assert!(installation.existing_downloads().is_empty());
    }
}
