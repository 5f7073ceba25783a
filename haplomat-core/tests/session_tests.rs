mod common;
use common::{mac_parameters, scratch_installation, wait_for, MAC_INPUT};

#[cfg(test)]
mod session {
    use super::*;

    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use haplomat_core::error::Error;
    use haplomat_core::loci::InputDialect;
    use haplomat_core::parameters::{self, LocusResolutionMap};
    use haplomat_core::reference::StatusIndicator;
    use haplomat_core::session::{Session, DEFAULT_PARAMETERS, INSTALLATION_RECORD};

    /// Installation, configuration directory and output directory of one test.
    fn layout(name: &str) -> (PathBuf, PathBuf, PathBuf) {
        let root = scratch_installation(name);
        let base = root.parent().unwrap().to_path_buf();
        (root, base.join("config"), base.join("out"))
    }

    fn error_of(report: &color_eyre::Report) -> &Error {
        report.downcast_ref::<Error>().unwrap()
    }

    #[test]
    fn stages_are_gated() {
        let (_, config, out) = layout("stages_are_gated");
        let mut session = Session::open(&config);
        assert!(session.installation().is_none());

        let report = session
            .inspect_input(Path::new(MAC_INPUT), &LocusResolutionMap::new())
            .unwrap_err();
        assert!(matches!(error_of(&report), Error::NoInstallation));

        let report = session
            .commit_parameters(mac_parameters(&out, "Run1"), InputDialect::Mac, Some(40))
            .unwrap_err();
        assert!(matches!(error_of(&report), Error::NoInstallation));

        let report = session.start_run().unwrap_err();
        assert!(matches!(error_of(&report), Error::ParametersNotCommitted));
        assert!(!session.is_busy());
    }

    #[test]
    fn installation_is_recorded() {
        let (root, config, _) = layout("installation_is_recorded");
        let mut session = Session::open(&config);
        session.select_installation(&root).unwrap();

        assert_eq!(
            format!("{}\n", root.display()),
            std::fs::read_to_string(config.join(INSTALLATION_RECORD)).unwrap()
        );

        let session = Session::open(&config);
        assert_eq!(root, session.installation().unwrap().root);
        assert_eq!(
            vec!["A", "B", "C", "DQB1", "DRB1"],
            session.known_loci().to_vec()
        );
        assert!(!session.update_tool_available());
        assert_eq!(StatusIndicator::Error, session.reference_indicator());
        assert!(session
            .reference_status()
            .contains("Update package not available."));

        let mut session = session;
        let report = session
            .select_installation(&root.join("missing"))
            .unwrap_err();
        assert!(matches!(error_of(&report), Error::FileNotFound { .. }));
    }

    #[test]
    fn commit_writes_three_files() {
        let (root, config, out) = layout("commit_writes_three_files");
        let mut session = Session::open(&config);
        session.select_installation(&root).unwrap();

        let loaded = session.load_defaults();
        assert!(loaded.missing_file);
        assert_eq!(1, session.take_notices().len());

        let params = mac_parameters(&out, "Run1");
        let committed = session
            .commit_parameters(params.clone(), InputDialect::Mac, Some(40))
            .unwrap();
        assert!(committed.describe().ends_with("RunID: Run1"));

        let written = [
            root.join("parametersMAC"),
            out.join("Run1_parametersMAC"),
            config.join(DEFAULT_PARAMETERS),
        ]
        .map(|path| std::fs::read_to_string(path).unwrap());
        assert_eq!(written[0], written[1]);
        assert_eq!(written[0], written[2]);

        let mut reopened = Session::open(&config);
        let loaded = reopened.load_defaults();
        assert!(!loaded.missing_file);
        assert_eq!(Some(params), loaded.last_saved);
        assert!(reopened.take_notices().is_empty());
    }

    #[test]
    fn invalid_parameters_are_not_committed() {
        let (root, config, out) = layout("invalid_parameters_are_not_committed");
        let mut session = Session::open(&config);
        session.select_installation(&root).unwrap();

        let mut params = mac_parameters(&out, "Run1");
        params.epsilon = 0.02;
        let report = session
            .commit_parameters(params, InputDialect::Mac, Some(40))
            .unwrap_err();
        assert!(matches!(error_of(&report), Error::EpsilonAboveBound { .. }));
        assert!(session.committed().is_none());
        assert!(!root.join("parametersMAC").exists());
    }

    #[test]
    fn parameter_file_is_probed_on_commit() {
        let (root, config, out) = layout("parameter_file_is_probed_on_commit");
        let mut session = Session::open(&config);
        session.select_installation(&root).unwrap();

        let path = out.join("Run4_parametersMAC");
        parameters::save(&mac_parameters(&out, "Run4"), &[&path]).unwrap();

        let committed = session.commit_parameter_file(&path).unwrap();
        assert_eq!(InputDialect::Mac, committed.dialect);
        assert_eq!(Some(40), committed.genotype_count);
    }

    /// Everything that spawns processes runs in this one test, so that no other thread
    /// forks while a script is being written.
    #[cfg(unix)]
    #[test]
    fn external_tools() {
        use common::write_script;
        use haplomat_core::data_update::UpdateOutcome;
        use haplomat_core::estimation::RunStatus;
        use haplomat_core::notice::{RUN_GUIDANCE, UPDATE_GUIDANCE};
        use haplomat_core::results::Ingestion;

        let (root, config, out) = layout("external_tools");
        let timeout = Duration::from_secs(20);

        let mut session = Session::open(&config).with_poll_interval(Duration::from_millis(50));
        session.select_installation(&root).unwrap();
        session
            .commit_parameters(mac_parameters(&out, "Run1"), InputDialect::Mac, Some(40))
            .unwrap();

        let run_to_end = |session: &mut Session| {
            wait_for(timeout, || session.poll_run().unwrap().completion)
        };

        // Succeeded
        write_script(
            &root.join("haplomat"),
            r#"params="parameters$1"
htf=$(sed -n 's/^FILENAME_HAPLOTYPEFREQUENCIES=//p' "$params")
eps=$(sed -n 's/^FILENAME_EPSILON_LOGL=//p' "$params")
echo "Leftover genotypes: 40"
printf '0.5\t-10.2\n0.001\t-9.8\n' > "$eps"
printf 'A*01:01g~B*08:01g~C*07:01g\t0.6\nA*02:01g~B*07:02g~C*07:02g\t0.4\n' > "$htf"
echo "Sum cutted haplotype frequencies: 0"
"#,
        );
        session.start_run().unwrap();
        assert!(session.is_busy());
        let completion = run_to_end(&mut session);

        assert_eq!(RunStatus::Succeeded, completion.record.status);
        assert_eq!(Some(0), completion.record.exit_code);
        assert_eq!(Some(RunStatus::Succeeded), session.run_status());
        assert!(session.run_log().starts_with("Hapl-o-Mat started.\n"));
        assert!(session.run_log().contains("Leftover genotypes: 40\n"));
        assert!(session.run_log().contains("\nFinished!\n"));
        assert_eq!(
            session.run_log(),
            std::fs::read_to_string(out.join("Run1_log.dat")).unwrap()
        );
        assert_eq!(vec![0.5, 0.001], session.trace().to_vec());
        match session.results() {
            Some(Ingestion::Ready(results)) => assert_eq!(2, results.len()),
            other => panic!("unexpected results {other:?}"),
        }
        assert!(session.take_notices().is_empty());

        // The run log cannot be written
        let log = out.join("Run1_log.dat");
        std::fs::remove_file(&log).unwrap();
        std::fs::create_dir(&log).unwrap();
        write_script(&root.join("haplomat"), "echo working\n");
        session.start_run().unwrap();
        let completion = run_to_end(&mut session);
        assert_eq!(RunStatus::Succeeded, completion.record.status);
        assert!(completion.log_error.is_some());
        let notices = session.take_notices();
        assert_eq!("Unexpected state", notices[0].title);
        assert!(notices[0].body.contains("Run1_log.dat"));
        std::fs::remove_dir(&log).unwrap();

        // Failed
        write_script(
            &root.join("haplomat"),
            "echo working\necho 'Unknown locus XYZ' >&2\nexit 3\n",
        );
        session.start_run().unwrap();
        assert!(session.results().is_none());
        let completion = run_to_end(&mut session);
        assert_eq!(RunStatus::Failed, completion.record.status);
        assert_eq!(Some(3), completion.record.exit_code);
        assert_eq!(Some("Unknown locus XYZ"), completion.record.last_error.as_deref());
        assert!(session.run_log().starts_with("Hapl-o-Mat started.\n"));
        assert!(session.run_log().contains("\nError!\n"));
        let notices = session.take_notices();
        assert_eq!(1, notices.len());
        assert_eq!("Error: Hapl-o-Mat run not successful.", notices[0].title);
        assert_eq!(
            format!("Unknown locus XYZ\n{RUN_GUIDANCE}"),
            notices[0].body
        );
        assert!(session.results().is_none());
        assert!(session.trace().is_empty());

        // Cancelled
        write_script(&root.join("haplomat"), "echo started\nexec sleep 30\n");
        session.start_run().unwrap();
        wait_for(timeout, || {
            session.poll_run().unwrap();
            session.run_log().contains("started").then_some(())
        });

        // Nothing is committed or restarted under the running estimator
        let estimator_file = std::fs::read_to_string(root.join("parametersMAC")).unwrap();
        let report = session
            .commit_parameters(mac_parameters(&out, "Run2"), InputDialect::Mac, Some(40))
            .unwrap_err();
        assert!(matches!(error_of(&report), Error::AlreadyRunning));
        let report = session
            .commit_parameter_file(&out.join("Run1_parametersMAC"))
            .unwrap_err();
        assert!(matches!(error_of(&report), Error::AlreadyRunning));
        let report = session.start_run().unwrap_err();
        assert!(matches!(error_of(&report), Error::AlreadyRunning));
        assert_eq!(
            estimator_file,
            std::fs::read_to_string(root.join("parametersMAC")).unwrap()
        );
        assert!(session.run_log().contains("started"));
        assert_eq!("Run1", session.committed().unwrap().params.run_id);

        session.cancel_run().unwrap();
        let completion = run_to_end(&mut session);
        assert_eq!(RunStatus::Cancelled, completion.record.status);
        assert!(session.run_log().contains("\nCancelled!\n"));
        assert!(!session.is_busy());
        assert!(session.take_notices().is_empty());

        // A start that fails keeps the previous log
        std::fs::remove_file(root.join("haplomat")).unwrap();
        let report = session.start_run().unwrap_err();
        assert!(matches!(error_of(&report), Error::ExternalToolMissing { .. }));
        assert!(session.run_log().contains("\nCancelled!\n"));

        // Data update, the script is read by the interpreter
        let mut session = Session::open(&config).with_python("sh");
        assert!(!session.update_tool_available());
        let script = root.join("prepareData").join("BuildData.py");

        std::fs::write(
            &script,
            "echo Downloading\necho 'HTTP Error 404: Not Found' >&2\nexec sleep 5\n",
        )
        .unwrap();
        session.refresh_reference();
        assert!(session.update_tool_available());

        session.start_data_update().unwrap();
        let outcome = wait_for(timeout, || session.poll_data_update().unwrap().outcome);
        assert_eq!(
            UpdateOutcome::Failed {
                last_line: "HTTP Error 404: Not Found".into()
            },
            outcome
        );
        assert!(!session.is_busy());
        assert_eq!(StatusIndicator::Caution, session.reference_indicator());
        assert!(session.reference_status().contains("Data download aborted."));
        let notices = session.take_notices();
        assert_eq!("Error: Update not successful.", notices[0].title);
        assert_eq!(
            format!("HTTP Error 404: Not Found\n{UPDATE_GUIDANCE}"),
            notices[0].body
        );

        // Cancelled by the user
        std::fs::write(&script, "echo Downloading\nexec sleep 30\n").unwrap();
        session.start_data_update().unwrap();
        wait_for(timeout, || {
            session.poll_data_update().unwrap();
            session.update_log().contains("Downloading").then_some(())
        });
        assert!(session.is_busy());
        session.cancel_data_update().unwrap();
        let outcome = wait_for(timeout, || session.poll_data_update().unwrap().outcome);
        assert_eq!(UpdateOutcome::Cancelled, outcome);
        assert!(!session.is_busy());
        assert_eq!(StatusIndicator::Caution, session.reference_indicator());
        assert!(session.reference_status().contains("Data download aborted."));
        assert!(session.update_log().contains("Data download cancelled."));
        assert!(session.take_notices().is_empty());

        std::fs::write(
            &script,
            "echo Downloading\ntouch ../data/AllAllelesExpanded.txt\n",
        )
        .unwrap();
        session.start_data_update().unwrap();
        let outcome = wait_for(timeout, || session.poll_data_update().unwrap().outcome);
        assert_eq!(UpdateOutcome::Updated, outcome);
        assert_eq!(StatusIndicator::Ok, session.reference_indicator());
        assert!(session.update_log().contains("All data files updated."));
        assert!(session.take_notices().is_empty());
    }
}
