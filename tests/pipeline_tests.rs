use std::fs;
use std::path::Path;

use approx::assert_relative_eq;

use pace_extrap::app::pipeline::{
    ExtrapolateRequest, FitSource, ScenarioOutcome, StoppingRequest, analyse_scenario, discover_scenarios,
    run_extrapolation, run_stopping,
};
use pace_extrap::data::{DecayPlateau, ScenarioSpec, decay_plateau_series, generate_scenario};
use pace_extrap::domain::{
    ErrorMeasure, ErrorSeries, ExtrapolationConfig, JumpParameters, StoppingConfig, StoppingDecision,
};
use pace_extrap::fit::{FitGate, fit_exponential};
use pace_extrap::io::{
    BRUTE_FORCE_FILE, StateFit, error_measures_file, groundtruth_apd_file, load_benchmark_rows,
    write_error_measures, write_jump_parameters, write_state_traces, write_stopping_report, write_true_apd,
};
use pace_extrap::report::{BenchmarkConfig, format_benchmark_summary, summarise_benchmark};

const TOL: &str = "1e-10";
const GT_TOL: &str = "1e-12";

fn apd_series(len: usize) -> Vec<f64> {
    (0..len).map(|n| 300.0 + 10.0 * (-(n as f64) / 200.0).exp()).collect()
}

fn write_scenario(root: &Path, name: &str, shape: &DecayPlateau, with_apd_file: bool) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    let values = decay_plateau_series(shape).unwrap();
    let apd = apd_series(values.len());
    let measures = [ErrorSeries {
        measure: ErrorMeasure::Mrms,
        values,
    }];
    write_error_measures(&dir.join(error_measures_file(TOL)), &measures, &apd).unwrap();
    if with_apd_file {
        write_true_apd(&dir.join(groundtruth_apd_file(GT_TOL)), &[310.0, 300.0]).unwrap();
    }
}

fn request(root: &Path, parallel: bool) -> StoppingRequest {
    StoppingRequest {
        data_dir: root.to_path_buf(),
        model_filter: None,
        tolerance: TOL.to_string(),
        groundtruth_tolerance: GT_TOL.to_string(),
        measure: ErrorMeasure::Mrms,
        config: StoppingConfig::default(),
        parallel,
    }
}

fn populate(root: &Path) {
    write_scenario(root, "toy_1000ms_0_percent", &DecayPlateau::default(), true);
    write_scenario(root, "toy_2000ms_0_percent", &DecayPlateau::default(), false);
    let monotone = DecayPlateau {
        plateau_pace: 2500,
        ..DecayPlateau::default()
    };
    write_scenario(root, "toy_500ms_0_percent_from_1000ms_0_percent", &monotone, true);
    fs::create_dir_all(root.join("scratch")).unwrap();
    fs::write(root.join("notes.txt"), "not a scenario").unwrap();
}

#[test]
fn discovery_ignores_non_scenario_entries() {
    let tmp = tempfile::tempdir().unwrap();
    populate(tmp.path());

    let dirs = discover_scenarios(tmp.path(), None).unwrap();
    let names: Vec<String> = dirs.iter().map(|d| d.id.to_string()).collect();
    assert_eq!(
        names,
        [
            "toy_1000ms_0_percent",
            "toy_2000ms_0_percent",
            "toy_500ms_0_percent_from_1000ms_0_percent"
        ]
    );

    assert!(discover_scenarios(tmp.path(), Some("decker")).unwrap().is_empty());
    assert!(discover_scenarios(&tmp.path().join("missing"), None).is_err());
}

#[test]
fn stopping_report_has_reached_and_not_reached_rows() {
    let tmp = tempfile::tempdir().unwrap();
    populate(tmp.path());

    let run = run_stopping(&request(tmp.path(), false)).unwrap();
    assert_eq!(run.outcomes.len(), 3);
    assert_eq!(run.skipped(), 1);
    assert!(matches!(&run.outcomes[1], ScenarioOutcome::Skipped { scenario, .. } if scenario.period == 2000.0));

    // Same answer as running the estimator on the in-memory series.
    let series = decay_plateau_series(&DecayPlateau::default()).unwrap();
    let apd = apd_series(series.len());
    let expected = pace_extrap::stopping::estimate_stopping_pace(&series, 300.0, &apd, &StoppingConfig::default())
        .unwrap();
    let point = *expected.point().unwrap();

    let mut buf = Vec::new();
    write_stopping_report(&mut buf, run.reports()).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("model\tperiod\tIKrBlock"));
    assert_eq!(
        lines[1],
        format!("toy\t1000\t0\t1000\t0\t{}\t{}", point.index, point.apd_error.unwrap())
    );
    assert_eq!(lines[2], "toy\t500\t0\t1000\t0\tNA\tNA");

    match &run.outcomes[2] {
        ScenarioOutcome::Estimated { report, .. } => assert_eq!(report.decision, StoppingDecision::NotReached),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn estimated_outcomes_point_at_their_scenario_directory() {
    let tmp = tempfile::tempdir().unwrap();
    populate(tmp.path());
    let request = request(tmp.path(), false);
    let run = run_stopping(&request).unwrap();
    assert_eq!(run.reports().count(), 2);

    for outcome in &run.outcomes {
        let ScenarioOutcome::Estimated { path, report } = outcome else {
            continue;
        };
        assert_eq!(path, &tmp.path().join(report.scenario.to_string()));

        // The viewer analysis reaches the same decision as the batch run.
        let analysis = analyse_scenario(path, &request).unwrap();
        assert_eq!(analysis.decision, report.decision);
        assert_eq!(analysis.terminal_pace, report.terminal_pace);
        assert_eq!(analysis.stats.logged.len(), 2500);
    }
}

#[test]
fn parallel_runs_keep_discovery_order() {
    let tmp = tempfile::tempdir().unwrap();
    populate(tmp.path());

    let sequential = run_stopping(&request(tmp.path(), false)).unwrap();
    let parallel = run_stopping(&request(tmp.path(), true)).unwrap();
    assert_eq!(sequential.outcomes, parallel.outcomes);
}

#[test]
fn invalid_config_fails_before_any_scenario() {
    let tmp = tempfile::tempdir().unwrap();
    populate(tmp.path());
    let mut req = request(tmp.path(), false);
    req.config.trend_window = 0;
    let err = run_stopping(&req).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

fn write_extrapolation_scenario(dir: &Path, jump: &JumpParameters) -> ScenarioSpec {
    let spec = ScenarioSpec {
        paces: 600,
        noise_sd: 0.0,
        ..ScenarioSpec::default()
    };
    let scenario = generate_scenario(&spec).unwrap();
    write_state_traces(&dir.join(BRUTE_FORCE_FILE), &scenario.names, &scenario.traces).unwrap();

    let states: Vec<StateFit> = scenario
        .names
        .iter()
        .zip(&scenario.traces)
        .enumerate()
        .map(|(state_index, (name, trace))| {
            let buffer = trace.window(jump.buffer_start(), jump.jump_pace).unwrap();
            let fit = fit_exponential(&buffer, &FitGate::default()).unwrap();
            StateFit {
                state_index,
                state_name: name.clone(),
                fit: fit.to_fit_parameters(),
            }
        })
        .collect();
    write_jump_parameters(&dir.join("JumpParameters0.dat"), jump, &states).unwrap();
    spec
}

#[test]
fn extrapolation_recovers_every_state_asymptote() {
    let tmp = tempfile::tempdir().unwrap();
    let jump = JumpParameters {
        jump_pace: 300,
        buffer_size: 100,
        extrapolation_coefficient: 1.0,
    };
    let spec = write_extrapolation_scenario(tmp.path(), &jump);

    let request = ExtrapolateRequest {
        scenario_dir: tmp.path().to_path_buf(),
        refit: false,
        gate: FitGate::default(),
        config: ExtrapolationConfig::default(),
        state: None,
    };
    let from_file = run_extrapolation(&request).unwrap();
    assert!(from_file.smart.is_none());
    assert_eq!(from_file.rows.len(), spec.states.len());

    let refit = run_extrapolation(&ExtrapolateRequest {
        refit: true,
        ..request.clone()
    })
    .unwrap();

    for ((row, refit_row), state) in from_file.rows.iter().zip(&refit.rows).zip(&spec.states) {
        assert_eq!(row.state, state.name);
        assert_eq!(row.source, FitSource::File);
        assert_eq!(refit_row.source, FitSource::Refit);

        let result = row.outcome.as_ref().unwrap();
        assert_relative_eq!(result.asymptote, state.asymptote, max_relative = 1e-9);
        assert!(result.warning.is_none());

        // Written parameters round-trip exactly, so a refit agrees with the file.
        let again = refit_row.outcome.as_ref().unwrap();
        assert_relative_eq!(again.asymptote, result.asymptote, max_relative = 1e-12);
    }

    let only_ki = run_extrapolation(&ExtrapolateRequest {
        state: Some("Ki".into()),
        ..request
    })
    .unwrap();
    assert_eq!(only_ki.rows.len(), 1);
    assert_eq!(only_ki.rows[0].state, "Ki");
}

#[test]
fn degenerate_fits_become_error_rows() {
    let tmp = tempfile::tempdir().unwrap();
    let jump = JumpParameters {
        jump_pace: 300,
        buffer_size: 100,
        extrapolation_coefficient: 1.0,
    };
    write_extrapolation_scenario(tmp.path(), &jump);
    fs::write(tmp.path().join("JumpParameters1.dat"), "400 100 1\n0 Nai 0 -3\n").unwrap();

    let run = run_extrapolation(&ExtrapolateRequest {
        scenario_dir: tmp.path().to_path_buf(),
        refit: false,
        gate: FitGate::default(),
        config: ExtrapolationConfig::default(),
        state: None,
    })
    .unwrap();
    assert_eq!(run.rows.len(), 4);
    let last = run.rows.last().unwrap();
    assert_eq!(last.jump.jump_pace, 400);
    assert!(last.outcome.as_ref().unwrap_err().contains("degenerate"));
}

#[test]
fn missing_jump_files_are_insufficient_data() {
    let tmp = tempfile::tempdir().unwrap();
    let spec = ScenarioSpec {
        paces: 50,
        ..ScenarioSpec::default()
    };
    let scenario = generate_scenario(&spec).unwrap();
    write_state_traces(&tmp.path().join(BRUTE_FORCE_FILE), &scenario.names, &scenario.traces).unwrap();

    let err = run_extrapolation(&ExtrapolateRequest {
        scenario_dir: tmp.path().to_path_buf(),
        refit: false,
        gate: FitGate::default(),
        config: ExtrapolationConfig::default(),
        state: None,
    })
    .unwrap_err();
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn benchmark_table_summary() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("toy_results.dat");
    let header = "model_name extrapolation_constant buffer_size period IKrBlock score jumps_used APD90 last_mrms reference_mrms ic_period ic_block";
    let rows = [
        "toy 0 100 1000 0 1000 0 300 1e-9 2e-9 1000 0",
        "toy 0 100 500 0 2000 0 250 1e-9 2e-9 1000 0",
        "toy 1 50 1000 0 600 4 300 3e-9 2e-9 1000 0",
        "toy 1 50 500 0 1500 6 251 5e-9 2e-9 1000 0",
        "toy 0.5 50 1000 0 900 2 300 1e-9 2e-9 1000 0",
        "toy 0.5 50 500 0 1900 2 250 1e-9 2e-9 1000 0",
        "other 0 100 1000 0 5000 0 300 1e-9 2e-9 1000 0",
    ];
    fs::write(&path, format!("{header}\n{}\n", rows.join("\n"))).unwrap();

    let rows = load_benchmark_rows(&path).unwrap();
    let summary = summarise_benchmark("toy", &rows, &BenchmarkConfig::default()).unwrap();

    assert_eq!(summary.reference_total, 3000.0);
    assert_eq!(summary.settings.len(), 3);
    let best = &summary.settings[0];
    assert_eq!((best.extrapolation_constant, best.buffer_size), (1.0, 50));
    assert_eq!(best.paces_saved, 900.0);
    assert_relative_eq!(best.percentage_saved, 30.0);
    assert_relative_eq!(best.quantiles[0], 0.25);
    assert_relative_eq!(best.quantiles[4], 0.4);
    assert_eq!(best.jumps_used, 10.0);

    let bifurcation = summary.bifurcation.as_ref().unwrap();
    assert_eq!(bifurcation.min_row.period, 500.0);
    assert_relative_eq!(bifurcation.range, 1.0);
    assert_eq!(summary.max_last_mrms, 5e-9);

    let txt = format_benchmark_summary(&summary, 2);
    assert!(txt.contains("Reference paces: 3000"));
    assert!(txt.contains("Bifurcation: period=500"));
}
