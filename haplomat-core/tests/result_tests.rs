mod common;
use common::{mac_parameters, scratch_dir, FINISHED_RUN};

#[cfg(test)]
mod results {
    use super::*;

    use std::path::Path;

    use haplomat_core::args::GraphArgs;
    use haplomat_core::error::Error;
    use haplomat_core::results::{ingest, read_trace, AxisScale, DisplayPolicy, Ingestion};
    use haplomat_core::subcommands::show_results::draw_plots;

    fn finished_run() -> Ingestion {
        let dir = std::path::absolute(FINISHED_RUN).unwrap();
        ingest(&mac_parameters(&dir, "Run1").paths()).unwrap()
    }

    #[test]
    fn statistics_of_a_finished_run() {
        let ingestion = finished_run();
        assert!(ingestion.notice().is_none());

        let results = ingestion.result_set().unwrap();
        let stats = results.statistics();
        assert_eq!(7, stats.haplotype_count);
        assert_eq!(40, stats.genotype_count);
        assert_eq!("1.250e-02", stats.recommended_epsilon_text);
        assert_eq!(5, stats.above_recommended_epsilon);
        assert_eq!("0.0002", stats.cut_mass);

        // The truncated last trace line is skipped
        assert_eq!(vec![0.41, 0.031, 0.0024], results.trace);
    }

    #[test]
    fn display_policies() {
        let ingestion = finished_run();
        let results = ingestion.result_set().unwrap();

        assert_eq!(7, results.display_count(DisplayPolicy::default()));
        assert_eq!(3, results.display_count(DisplayPolicy::Top(3)));
        assert_eq!(
            results.table(DisplayPolicy::All),
            results.table(DisplayPolicy::Top(1000))
        );
        assert_eq!(5, results.display_count(DisplayPolicy::AboveRecommendedEpsilon));

        // 0.3, 0.55, 0.8, 0.97: the crossing entry is shown
        assert_eq!(4, results.display_count(DisplayPolicy::CumulativeCutoff(0.9)));
        assert_eq!(7, results.display_count(DisplayPolicy::CumulativeCutoff(0.9999)));

        insta::assert_snapshot!(results.table(DisplayPolicy::Top(2)), @r###"
        A*01:01g~B*08:01g~C*07:01g	0.3
        A*02:01g~B*07:02g~C*07:02g	0.25
        "###);
    }

    #[test]
    fn plot_points() {
        let ingestion = finished_run();
        let results = ingestion.result_set().unwrap();

        let points =
            results.frequency_points(DisplayPolicy::Top(2), AxisScale::Linear, AxisScale::Linear);
        assert_eq!(vec![[1.0, 0.3], [2.0, 0.25]], points);

        let points = results.trace_points(AxisScale::Linear, AxisScale::Log10);
        assert_eq!(3, points.len());
        assert_eq!(3.0, points[2][0]);
    }

    #[test]
    fn svg_plots_are_written() {
        let dir = scratch_dir("svg_plots_are_written");
        let ingestion = finished_run();
        let results = ingestion.result_set().unwrap();

        let graph_args = GraphArgs {
            log_y: true,
            ..Default::default()
        };
        draw_plots(results, DisplayPolicy::All, &dir, "Run1_", graph_args).unwrap();

        let frequencies = std::fs::read_to_string(dir.join("Run1_frequencies.svg")).unwrap();
        assert_eq!(7, frequencies.matches("<circle").count());
        let epsilon = std::fs::read_to_string(dir.join("Run1_epsilon.svg")).unwrap();
        assert!(epsilon.contains("log10(epsilon)"));
    }

    #[test]
    fn no_genotypes_are_not_presented() {
        let dir = scratch_dir("no_genotypes_are_not_presented");
        let paths = mac_parameters(&dir, "Empty").paths();
        std::fs::write(&paths.log, "Hapl-o-Mat started.\nLeftover genotypes: 0\nFinished!\n")
            .unwrap();

        let ingestion = ingest(&paths).unwrap();
        assert!(matches!(ingestion, Ingestion::NoGenotypes(_)));
        assert!(ingestion.result_set().is_none());
        assert!(ingestion.notice().is_some());
    }

    #[test]
    fn missing_frequency_file() {
        let dir = scratch_dir("missing_frequency_file");
        let paths = mac_parameters(&dir, "Run3").paths();
        std::fs::write(
            &paths.log,
            "Leftover genotypes: 12\nSum cutted haplotype frequencies: 0\n",
        )
        .unwrap();

        let report = ingest(&paths).unwrap_err();
        assert!(matches!(
            report.downcast_ref::<Error>(),
            Some(Error::MissingResultFile { .. })
        ));
    }

    #[test]
    fn trace_reads_are_tolerant() {
        assert!(read_trace(Path::new("tests/data/no_epsilon.dat")).is_empty());

        let dir = scratch_dir("trace_reads_are_tolerant");
        let path = dir.join("epsilon.dat");
        std::fs::write(&path, "0.5\n0.25\n1.5e-").unwrap();
        assert_eq!(vec![0.5, 0.25], read_trace(&path));

        // A value cut short can still parse
        std::fs::write(&path, "0.5\t-10.2\n0.00").unwrap();
        assert_eq!(vec![0.5], read_trace(&path));

        std::fs::write(&path, "0.5\n0.2x5\n0.125\n").unwrap();
        assert_eq!(vec![0.5], read_trace(&path));

        std::fs::write(&path, "0.5\n\n0.25\n").unwrap();
        assert_eq!(vec![0.5, 0.25], read_trace(&path));

        std::fs::write(&path, "0.5").unwrap();
        assert!(read_trace(&path).is_empty());
    }
}
