//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs the log subscriber
//! - runs the stopping / extrapolation / benchmark pipelines
//! - prints reports/plots
//! - writes reports and optional exports

use std::fs::File;
use std::path::Path;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{BenchmarkArgs, Cli, Command, DataArgs, ExtrapolateArgs, StoppingArgs, SynthArgs};
use crate::data::{ScenarioSpec, generate_scenario};
use crate::domain::{ExtrapolationConfig, FitParameters, JumpParameters, StoppingConfig};
use crate::error::AppError;
use crate::extrapolate::extrapolate_reference;
use crate::fit::{FitGate, fit_exponential};
use crate::io::{
    BRUTE_FORCE_FILE, StateFit, error_measures_file, groundtruth_apd_file, load_benchmark_rows, results_file,
    write_error_measures, write_jump_parameters, write_json_export, write_state_traces, write_stopping_report_file,
    write_true_apd,
};
use crate::report::{BenchmarkConfig, summarise_benchmark};

pub mod pipeline;

use pipeline::{ExtrapolateRequest, ScenarioOutcome, StoppingRequest};

/// Entry point for the `pex` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // The TUI owns the terminal; keep the log quiet unless asked otherwise.
    let quiet = matches!(cli.command, Command::View(_));
    init_logging(cli.verbose, cli.log.as_deref(), quiet)?;

    match cli.command {
        Command::Stopping(args) => handle_stopping(args),
        Command::Extrapolate(args) => handle_extrapolate(args),
        Command::Benchmark(args) => handle_benchmark(args),
        Command::Synth(args) => handle_synth(args),
        Command::View(args) => crate::tui::run(args),
    }
}

/// `--log` wins, then `RUST_LOG`, then the `-v` count.
fn init_logging(verbose: u8, directive: Option<&str>, quiet: bool) -> Result<(), AppError> {
    let filter = match directive {
        Some(d) => EnvFilter::try_new(d).map_err(|e| AppError::new(2, format!("Invalid log filter '{d}': {e}")))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(match (verbose, quiet) {
                (0, true) => "off",
                (0, false) => "warn",
                (1, _) => "info",
                (2, _) => "debug",
                _ => "trace",
            })
        }),
    };
    // A subscriber may already be installed (e.g. by a test harness).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}

/// Thresholds from `--config` (or the defaults) with CLI overrides applied.
pub fn stopping_config_from_args(args: &DataArgs) -> Result<StoppingConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => read_stopping_config(path)?,
        None => StoppingConfig::default(),
    };
    if let Some(alignment) = args.alignment {
        config.alignment = alignment;
    }
    config.validate()?;
    Ok(config)
}

fn read_stopping_config(path: &Path) -> Result<StoppingConfig, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open config '{}': {e}", path.display())))?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::new(2, format!("Failed to parse config '{}': {e}", path.display())))
}

pub fn stopping_request_from_args(args: &DataArgs, parallel: bool) -> Result<StoppingRequest, AppError> {
    Ok(StoppingRequest {
        data_dir: args.data_dir.clone(),
        model_filter: args.model.clone(),
        tolerance: args.tolerance.clone(),
        groundtruth_tolerance: args.groundtruth_tolerance.clone(),
        measure: args.measure,
        config: stopping_config_from_args(args)?,
        parallel,
    })
}

fn handle_stopping(args: StoppingArgs) -> Result<(), AppError> {
    let request = stopping_request_from_args(&args.data, args.parallel)?;
    let run = pipeline::run_stopping(&request)?;

    write_stopping_report_file(&args.output, run.reports())?;
    info!(path = %args.output.display(), rows = run.reports().count(), "wrote stopping report");

    println!("{}", crate::report::format_stopping_summary(&run));

    if args.plot {
        for outcome in &run.outcomes {
            let ScenarioOutcome::Estimated { path, report } = outcome else {
                continue;
            };
            let analysis = pipeline::analyse_scenario(path, &request)?;
            let stop = analysis.decision.point().map(|p| p.index);
            println!("{}", report.scenario);
            println!(
                "{}",
                crate::plot::render_error_plot(&analysis.stats, request.config.log_floor, stop, args.width, args.height)
            );
        }
    }

    if let Some(path) = &args.export_json {
        write_json_export(path, "stopping", &run)?;
    }
    Ok(())
}

fn handle_extrapolate(args: ExtrapolateArgs) -> Result<(), AppError> {
    let request = ExtrapolateRequest {
        scenario_dir: args.scenario.clone(),
        refit: args.refit,
        gate: FitGate::default(),
        config: ExtrapolationConfig {
            check_tolerance: args.check_tolerance,
            sign_rule: args.sign_rule,
            ..ExtrapolationConfig::default()
        },
        state: args.state.clone(),
    };
    let run = pipeline::run_extrapolation(&request)?;

    println!("{}", crate::report::format_extrapolation_table(&run));

    if args.plot {
        for row in &run.rows {
            let (Ok(result), Some(reference)) = (&row.outcome, run.reference.get(&row.state)) else {
                continue;
            };
            let smart = run.smart.as_ref().and_then(|s| s.get(&row.state));
            println!("{} (jump at pace {})", row.state, row.jump.jump_pace);
            println!(
                "{}",
                crate::plot::render_extrapolation_plot(
                    reference,
                    &result.predicted,
                    smart,
                    row.jump.jump_pace,
                    result.asymptote,
                    args.width,
                    args.height,
                )
            );
        }
    }

    if let Some(path) = &args.export_json {
        write_json_export(path, "extrapolation", &run.rows)?;
    }
    Ok(())
}

fn handle_benchmark(args: BenchmarkArgs) -> Result<(), AppError> {
    let path = args.results.clone().unwrap_or_else(|| results_file(&args.model).into());
    let rows = load_benchmark_rows(&path)?;
    let config = BenchmarkConfig {
        reference_buffer_size: args.reference_buffer_size,
        bifurcation_threshold: args.bifurcation_threshold,
        ..BenchmarkConfig::default()
    };
    let summary = summarise_benchmark(&args.model, &rows, &config)?;

    println!("{}", crate::report::format_benchmark_summary(&summary, args.top));

    if let Some(path) = &args.export_json {
        write_json_export(path, "benchmark", &summary)?;
    }
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    if args.buffer_size < 1 || args.jump_pace < args.buffer_size || args.jump_pace as usize >= args.paces {
        return Err(AppError::new(
            2,
            format!(
                "Jump at pace {} with buffer {} does not fit in {} paces.",
                args.jump_pace, args.buffer_size, args.paces
            ),
        ));
    }
    let spec = ScenarioSpec {
        paces: args.paces,
        noise_sd: args.noise,
        seed: args.seed,
        ..ScenarioSpec::default()
    };
    let scenario = generate_scenario(&spec)?;

    let dir = args.out_dir.join(&args.name);
    std::fs::create_dir_all(&dir)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", dir.display())))?;

    write_state_traces(&dir.join(BRUTE_FORCE_FILE), &scenario.names, &scenario.traces)?;
    write_error_measures(&dir.join(error_measures_file(&args.tolerance)), &scenario.measures, &scenario.apd)?;
    write_true_apd(&dir.join(groundtruth_apd_file(&args.groundtruth_tolerance)), &[scenario.true_apd])?;

    let jump = JumpParameters {
        jump_pace: args.jump_pace,
        buffer_size: args.buffer_size,
        extrapolation_coefficient: 1.0,
    };
    let gate = FitGate::default();
    let states: Vec<StateFit> = scenario
        .names
        .iter()
        .zip(&scenario.traces)
        .enumerate()
        .map(|(state_index, (name, trace))| {
            let fit = trace
                .window(jump.buffer_start(), jump.jump_pace)
                .and_then(|buffer| fit_exponential(&buffer, &gate).ok())
                .map(|f| f.to_fit_parameters());
            let fit = match fit {
                Some(fit) => FitParameters {
                    asymptote: extrapolate_reference(&fit, &jump, trace, &ExtrapolationConfig::default())
                        .ok()
                        .map(|r| r.asymptote),
                    ..fit
                },
                None => FitParameters {
                    tau: f64::NAN,
                    alpha: f64::NAN,
                    asymptote: None,
                },
            };
            StateFit {
                state_index,
                state_name: name.clone(),
                fit,
            }
        })
        .collect();
    write_jump_parameters(&dir.join("JumpParameters0.dat"), &jump, &states)?;

    info!(dir = %dir.display(), paces = args.paces, "wrote synthetic scenario");
    println!("Wrote synthetic scenario to {}", dir.display());
    Ok(())
}
