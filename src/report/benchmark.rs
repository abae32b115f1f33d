//! Benchmark summary over `(extrapolation constant, buffer size)` settings.
//!
//! Every setting is compared against the reference rows (no extrapolation,
//! default buffer) of the same scenario:
//!
//! - total paces simulated and jumps used
//! - per-scenario proportion of paces saved, summarized by quantiles
//! - spread of the converged APD90 per `(period, block)`, which flags
//!   runs that settled on a different attractor

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::BenchmarkRow;
use crate::error::EstimatorError;
use crate::math::{mean, quantile};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub reference_constant: f64,
    pub reference_buffer_size: i64,
    /// APD90 range (ms) above which a bifurcation is reported.
    pub bifurcation_threshold: f64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            reference_constant: 0.0,
            reference_buffer_size: 100,
            bifurcation_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingSummary {
    pub extrapolation_constant: f64,
    pub buffer_size: i64,
    pub scenarios: usize,
    pub jumps_used: f64,
    pub total_score: f64,
    /// Reference total minus this setting's total.
    pub paces_saved: f64,
    pub percentage_saved: f64,
    /// Proportion of paces saved per scenario: min, lower quartile, median,
    /// upper quartile, max.
    pub quantiles: [f64; 5],
    pub mean_paces_saved: f64,
    pub normalised_saved: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApdRange {
    pub period: f64,
    pub ikr_block: f64,
    pub min: f64,
    pub max: f64,
    pub min_score: f64,
}

impl ApdRange {
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bifurcation {
    pub range: f64,
    pub min_row: BenchmarkRow,
    pub max_row: BenchmarkRow,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkSummary {
    pub model: String,
    pub reference_total: f64,
    /// Sorted by paces saved, best first.
    pub settings: Vec<SettingSummary>,
    pub apd_ranges: Vec<ApdRange>,
    pub bifurcation: Option<Bifurcation>,
    pub max_apd_range: f64,
    pub max_last_mrms: f64,
    pub max_reference_mrms: f64,
}

fn sorted_unique(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = values.collect();
    v.sort_by(|a, b| a.total_cmp(b));
    v.dedup();
    v
}

/// Summarize the rows of one model.
pub fn summarise_benchmark(
    model: &str,
    rows: &[BenchmarkRow],
    config: &BenchmarkConfig,
) -> Result<BenchmarkSummary, EstimatorError> {
    let rows: Vec<&BenchmarkRow> = rows.iter().filter(|r| r.model_name == model).collect();
    if rows.is_empty() {
        return Err(EstimatorError::InvalidInput(format!("no benchmark rows for model '{model}'")));
    }

    let is_reference = |r: &BenchmarkRow| {
        r.extrapolation_constant == config.reference_constant && r.buffer_size == config.reference_buffer_size
    };
    let reference: HashMap<[u64; 4], f64> = rows
        .iter()
        .filter(|r| is_reference(r))
        .map(|r| (r.scenario_key(), r.score))
        .collect();
    if reference.is_empty() {
        return Err(EstimatorError::InvalidInput(format!(
            "no reference rows (constant {}, buffer {}) for model '{model}'",
            config.reference_constant, config.reference_buffer_size
        )));
    }
    let reference_total: f64 = rows.iter().filter(|r| is_reference(r)).map(|r| r.score).sum();

    let constants = sorted_unique(rows.iter().map(|r| r.extrapolation_constant));
    let mut buffers: Vec<i64> = rows.iter().map(|r| r.buffer_size).collect();
    buffers.sort_unstable();
    buffers.dedup();

    let mut settings = Vec::new();
    for &constant in &constants {
        for &buffer_size in &buffers {
            let setting: Vec<&&BenchmarkRow> = rows
                .iter()
                .filter(|r| r.extrapolation_constant == constant && r.buffer_size == buffer_size)
                .collect();
            let total_score: f64 = setting.iter().map(|r| r.score).sum();
            if total_score == 0.0 {
                continue;
            }
            let jumps_used: f64 = setting.iter().map(|r| r.jumps_used).sum();

            let mut saved = Vec::new();
            let mut normalised = Vec::new();
            for r in &setting {
                if let Some(&base) = reference.get(&r.scenario_key()) {
                    saved.push(base - r.score);
                    normalised.push((base - r.score) / base);
                }
            }
            let q = |p: f64| quantile(&normalised, p).unwrap_or(f64::NAN);

            settings.push(SettingSummary {
                extrapolation_constant: constant,
                buffer_size,
                scenarios: setting.len(),
                jumps_used,
                total_score,
                paces_saved: reference_total - total_score,
                percentage_saved: 100.0 * (reference_total - total_score) / reference_total,
                quantiles: [q(0.0), q(0.25), q(0.5), q(0.75), q(1.0)],
                mean_paces_saved: mean(&saved).unwrap_or(f64::NAN),
                normalised_saved: normalised,
            });
        }
    }
    settings.sort_by(|a, b| b.paces_saved.total_cmp(&a.paces_saved));

    let mut apd_ranges = Vec::new();
    let mut bifurcation: Option<Bifurcation> = None;
    let mut max_apd_range = 0.0;
    for &ikr_block in &sorted_unique(rows.iter().map(|r| r.ikr_block)) {
        for &period in &sorted_unique(rows.iter().map(|r| r.period)) {
            let group: Vec<&&BenchmarkRow> = rows
                .iter()
                .filter(|r| r.period == period && r.ikr_block == ikr_block && r.apd90.is_finite())
                .collect();
            let Some(lo) = group.iter().copied().min_by(|a, b| a.apd90.total_cmp(&b.apd90)) else {
                continue;
            };
            let Some(hi) = group.iter().copied().max_by(|a, b| a.apd90.total_cmp(&b.apd90)) else {
                continue;
            };
            let range = ApdRange {
                period,
                ikr_block,
                min: lo.apd90,
                max: hi.apd90,
                min_score: group.iter().map(|r| r.score).fold(f64::INFINITY, f64::min),
            };
            if range.range() > max_apd_range {
                max_apd_range = range.range();
                bifurcation = Some(Bifurcation {
                    range: range.range(),
                    min_row: (**lo).clone(),
                    max_row: (**hi).clone(),
                });
            }
            apd_ranges.push(range);
        }
    }
    let bifurcation = bifurcation.filter(|b| b.range > config.bifurcation_threshold);

    let finite_max = |f: fn(&BenchmarkRow) -> f64| {
        rows.iter()
            .map(|r| f(r))
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max)
    };

    Ok(BenchmarkSummary {
        model: model.to_string(),
        reference_total,
        settings,
        apd_ranges,
        bifurcation,
        max_apd_range,
        max_last_mrms: finite_max(|r| r.last_mrms),
        max_reference_mrms: finite_max(|r| r.reference_mrms),
    })
}
