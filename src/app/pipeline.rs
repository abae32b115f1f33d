//! Shared batch logic used by both the CLI and the TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflows:
//! - discover scenarios -> load error measures -> estimate stopping pace
//! - load traces + jump parameters -> (re)fit -> extrapolate per state
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{
    ErrorMeasure, ExtrapolationConfig, ExtrapolationResult, FitParameters, JumpParameters, ScenarioId,
    ScenarioReport, StoppingConfig, StoppingDecision,
};
use crate::error::AppError;
use crate::extrapolate::extrapolate_reference;
use crate::fit::{FitGate, fit_exponential};
use crate::io::{
    BRUTE_FORCE_FILE, ErrorMeasures, SMART_FILE, StateTraces, error_measures_file, find_jump_files,
    groundtruth_apd_file, load_error_measures, load_jump_parameters, load_state_traces, load_true_apd,
};
use crate::stopping::{TrendStatistics, analyse_series, decide, estimate_stopping_pace};

/// A scenario directory under the data root.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioDir {
    pub id: ScenarioId,
    pub path: PathBuf,
}

/// Scenario directories under `data_dir`, sorted by name.
///
/// Directories whose names do not follow the scenario pattern are ignored;
/// `model_filter` keeps only names containing it.
pub fn discover_scenarios(data_dir: &Path, model_filter: Option<&str>) -> Result<Vec<ScenarioDir>, AppError> {
    let entries = std::fs::read_dir(data_dir)
        .map_err(|e| AppError::new(2, format!("Failed to read data dir '{}': {e}", data_dir.display())))?;

    let mut dirs = Vec::new();
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if model_filter.is_some_and(|m| !name.contains(m)) {
            continue;
        }
        match ScenarioId::parse_dir_name(name) {
            Some(id) => dirs.push(ScenarioDir { id, path }),
            None => debug!(dir = name, "not a scenario directory"),
        }
    }
    dirs.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(dirs)
}

/// Inputs of a batch stopping run.
#[derive(Debug, Clone)]
pub struct StoppingRequest {
    pub data_dir: PathBuf,
    pub model_filter: Option<String>,
    pub tolerance: String,
    pub groundtruth_tolerance: String,
    pub measure: ErrorMeasure,
    pub config: StoppingConfig,
    pub parallel: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Estimated { path: PathBuf, report: ScenarioReport },
    Skipped { scenario: ScenarioId, reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StoppingRun {
    pub measure: ErrorMeasure,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl StoppingRun {
    pub fn reports(&self) -> impl Iterator<Item = &ScenarioReport> {
        self.outcomes.iter().filter_map(|o| match o {
            ScenarioOutcome::Estimated { report, .. } => Some(report),
            ScenarioOutcome::Skipped { .. } => None,
        })
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ScenarioOutcome::Skipped { .. }))
            .count()
    }
}

/// Loaded inputs of one scenario's stopping estimate.
#[derive(Debug, Clone)]
pub struct ScenarioData {
    pub measures: ErrorMeasures,
    pub true_apd: f64,
}

/// Load `error_measures_<tol>.dat` and the ground-truth APD of one scenario.
///
/// `Ok(None)` when either file is missing.
pub fn load_scenario_data(
    dir: &Path,
    tolerance: &str,
    groundtruth_tolerance: &str,
) -> Result<Option<ScenarioData>, AppError> {
    let measures_path = dir.join(error_measures_file(tolerance));
    let apd_path = dir.join(groundtruth_apd_file(groundtruth_tolerance));
    for path in [&measures_path, &apd_path] {
        if !path.exists() {
            warn!(file = %path.display(), "missing input, skipping scenario");
            return Ok(None);
        }
    }
    Ok(Some(ScenarioData {
        measures: load_error_measures(&measures_path)?,
        true_apd: load_true_apd(&apd_path)?,
    }))
}

pub fn run_scenario(dir: &ScenarioDir, request: &StoppingRequest) -> ScenarioOutcome {
    let skipped = |reason: String| ScenarioOutcome::Skipped {
        scenario: dir.id.clone(),
        reason,
    };

    let data = match load_scenario_data(&dir.path, &request.tolerance, &request.groundtruth_tolerance) {
        Ok(Some(data)) => data,
        Ok(None) => return skipped("missing input file".to_string()),
        Err(err) => {
            warn!(scenario = %dir.id, error = %err, "failed to load scenario");
            return skipped(err.to_string());
        }
    };
    let Some(series) = data.measures.series(request.measure) else {
        warn!(scenario = %dir.id, measure = %request.measure, "measure not recorded");
        return skipped(format!("no {} column", request.measure));
    };

    match estimate_stopping_pace(&series.values, data.true_apd, &data.measures.apd, &request.config) {
        Ok(decision) => {
            let terminal_pace = decision.point().and_then(|p| data.measures.pace_at(p.index));
            match terminal_pace {
                Some(pace) => info!(scenario = %dir.id, pace, "stopping pace found"),
                None => info!(scenario = %dir.id, "stopping criterion not reached"),
            }
            ScenarioOutcome::Estimated {
                path: dir.path.clone(),
                report: ScenarioReport {
                    scenario: dir.id.clone(),
                    measure: request.measure,
                    decision,
                    terminal_pace,
                },
            }
        }
        Err(err) => {
            warn!(scenario = %dir.id, error = %err, "stopping estimate failed");
            skipped(err.to_string())
        }
    }
}

/// Estimate the stopping pace of every scenario under the data dir.
///
/// Output order is the discovery order, also when `parallel` is set.
pub fn run_stopping(request: &StoppingRequest) -> Result<StoppingRun, AppError> {
    request.config.validate()?;
    let dirs = discover_scenarios(&request.data_dir, request.model_filter.as_deref())?;
    if dirs.is_empty() {
        warn!(dir = %request.data_dir.display(), "no scenario directories found");
    }

    let outcomes = if request.parallel {
        dirs.par_iter().map(|d| run_scenario(d, request)).collect()
    } else {
        dirs.iter().map(|d| run_scenario(d, request)).collect()
    };

    Ok(StoppingRun {
        measure: request.measure,
        outcomes,
    })
}

/// Rolling statistics and the decision of one scenario, for plotting.
#[derive(Debug, Clone)]
pub struct ScenarioAnalysis {
    pub stats: TrendStatistics,
    pub decision: StoppingDecision,
    pub terminal_pace: Option<i64>,
    pub available: Vec<ErrorMeasure>,
}

pub fn analyse_scenario(dir: &Path, request: &StoppingRequest) -> Result<ScenarioAnalysis, AppError> {
    let data = load_scenario_data(dir, &request.tolerance, &request.groundtruth_tolerance)?.ok_or_else(|| {
        AppError::new(2, format!("Missing error-measure or ground-truth APD file in '{}'.", dir.display()))
    })?;
    let series = data
        .measures
        .series(request.measure)
        .ok_or_else(|| AppError::new(3, format!("No {} column in '{}'.", request.measure, dir.display())))?;

    let stats = analyse_series(&series.values, &request.config)?;
    let decision = decide(&stats, &series.values, data.true_apd, &data.measures.apd, &request.config)?;
    Ok(ScenarioAnalysis {
        stats,
        terminal_pace: decision.point().and_then(|p| data.measures.pace_at(p.index)),
        decision,
        available: data.measures.available(),
    })
}

/// Inputs of a single-scenario extrapolation check.
#[derive(Debug, Clone)]
pub struct ExtrapolateRequest {
    pub scenario_dir: PathBuf,
    /// Re-estimate `(τ, α)` from the brute-force buffer instead of using the
    /// jump-parameter files' values.
    pub refit: bool,
    pub gate: FitGate,
    pub config: ExtrapolationConfig,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FitSource {
    File,
    Refit,
}

/// Extrapolation of one state variable at one jump.
#[derive(Debug, Clone, Serialize)]
pub struct StateExtrapolation {
    pub jump_file: PathBuf,
    pub state: String,
    pub jump: JumpParameters,
    pub source: FitSource,
    pub fit: Option<FitParameters>,
    pub reported_asymptote: Option<f64>,
    pub outcome: Result<ExtrapolationResult, String>,
}

#[derive(Debug, Clone)]
pub struct ExtrapolationRun {
    pub reference: StateTraces,
    pub smart: Option<StateTraces>,
    pub rows: Vec<StateExtrapolation>,
}

pub fn run_extrapolation(request: &ExtrapolateRequest) -> Result<ExtrapolationRun, AppError> {
    let dir = &request.scenario_dir;
    let reference = load_state_traces(&dir.join(BRUTE_FORCE_FILE))?;
    let smart_path = dir.join(SMART_FILE);
    let smart = if smart_path.exists() {
        Some(load_state_traces(&smart_path)?)
    } else {
        debug!(file = %smart_path.display(), "no smart trace");
        None
    };

    let jump_files = find_jump_files(dir)?;
    if jump_files.is_empty() {
        return Err(AppError::new(3, format!("No jump-parameter files in '{}'.", dir.display())));
    }

    let mut rows = Vec::new();
    for path in jump_files {
        let file = load_jump_parameters(&path)?;
        for state in &file.states {
            if request.state.as_deref().is_some_and(|s| s != state.state_name) {
                continue;
            }
            let Some(trace) = reference.get(&state.state_name) else {
                warn!(state = %state.state_name, file = %path.display(), "state not in brute-force trace");
                continue;
            };

            let fit = if request.refit {
                trace
                    .window(file.jump.buffer_start(), file.jump.jump_pace)
                    .ok_or_else(|| format!("buffer paces {}..={} not recorded", file.jump.buffer_start(), file.jump.jump_pace))
                    .and_then(|buffer| fit_exponential(&buffer, &request.gate).map_err(|r| r.to_string()))
                    .map(|f| FitParameters {
                        asymptote: state.fit.asymptote,
                        ..f.to_fit_parameters()
                    })
            } else {
                Ok(state.fit)
            };

            let outcome = fit.clone().and_then(|fit| {
                extrapolate_reference(&fit, &file.jump, trace, &request.config).map_err(|e| e.to_string())
            });
            if let Err(reason) = &outcome {
                warn!(state = %state.state_name, jump = file.jump.jump_pace, reason = %reason, "no extrapolation");
            }

            rows.push(StateExtrapolation {
                jump_file: path.clone(),
                state: state.state_name.clone(),
                jump: file.jump,
                source: if request.refit { FitSource::Refit } else { FitSource::File },
                fit: fit.ok(),
                reported_asymptote: state.fit.asymptote,
                outcome,
            });
        }
    }

    Ok(ExtrapolationRun { reference, smart, rows })
}
