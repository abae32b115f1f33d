use serde::Serialize;
use tracing::debug;

use crate::domain::{StoppingConfig, StoppingDecision, StoppingPoint};
use crate::error::EstimatorError;
use crate::math::pmcc;

use super::rolling::{block_minima, rolling_auto_diff, rolling_mean, rolling_std, rolling_trend};

/// Every derived column of the stopping analysis, index-aligned with the input.
///
/// `block_minima` has one entry per complete block of `min_window` paces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendStatistics {
    pub logged: Vec<f64>,
    pub average: Vec<f64>,
    pub spread: Vec<f64>,
    pub trend: Vec<f64>,
    pub auto_diff: Vec<f64>,
    pub auto_diff_half: Vec<f64>,
    pub block_minima: Vec<f64>,
}

/// `log10` of the strictly positive finite entries, NaN elsewhere.
pub fn log_series(series: &[f64]) -> Vec<f64> {
    series
        .iter()
        .map(|&v| if v.is_finite() && v > 0.0 { v.log10() } else { f64::NAN })
        .collect()
}

pub fn analyse_series(series: &[f64], config: &StoppingConfig) -> Result<TrendStatistics, EstimatorError> {
    config.validate()?;
    let align = config.alignment;

    let logged = log_series(series);
    let average = rolling_mean(&logged, config.average_window, align);
    let spread = rolling_std(&logged, config.average_window, align);
    let trend = rolling_trend(&average, config.trend_window, align);
    let auto_diff = rolling_auto_diff(&average, config.auto_diff_window, align, config.auto_diff_clip);
    let auto_diff_half = rolling_auto_diff(&average, config.auto_diff_window / 2, align, config.auto_diff_clip);
    let block_minima = block_minima(&logged, config.min_window);

    Ok(TrendStatistics {
        logged,
        average,
        spread,
        trend,
        auto_diff,
        auto_diff_half,
        block_minima,
    })
}

/// First pace at which `series` has stopped decaying.
///
/// `apd_series` is either empty or index-aligned with `series`; the APD error
/// at the stopping pace is measured against `true_apd`.
pub fn estimate_stopping_pace(
    series: &[f64],
    true_apd: f64,
    apd_series: &[f64],
    config: &StoppingConfig,
) -> Result<StoppingDecision, EstimatorError> {
    check_apd_len(series.len(), apd_series)?;
    let stats = analyse_series(series, config)?;
    decide(&stats, series, true_apd, apd_series, config)
}

/// Stopping decision from statistics already computed by [`analyse_series`]
/// with the same `config`.
pub fn decide(
    stats: &TrendStatistics,
    series: &[f64],
    true_apd: f64,
    apd_series: &[f64],
    config: &StoppingConfig,
) -> Result<StoppingDecision, EstimatorError> {
    config.validate()?;
    check_apd_len(series.len(), apd_series)?;
    if stats.logged.len() != series.len() {
        return Err(EstimatorError::InvalidInput(format!(
            "statistics cover {} paces but the error series has {}",
            stats.logged.len(),
            series.len()
        )));
    }

    let Some(index) = first_flat_index(stats, config) else {
        debug!(len = series.len(), "stopping criterion not reached");
        return Ok(StoppingDecision::NotReached);
    };

    let apd_error = apd_series
        .get(index)
        .map(|apd| (apd - true_apd).abs())
        .filter(|e| e.is_finite());

    Ok(StoppingDecision::Reached(StoppingPoint {
        index,
        error: series[index],
        log_error: stats.logged[index],
        apd_error,
    }))
}

fn check_apd_len(len: usize, apd_series: &[f64]) -> Result<(), EstimatorError> {
    if !apd_series.is_empty() && apd_series.len() != len {
        return Err(EstimatorError::InvalidInput(format!(
            "APD series has {} entries but the error series has {len}",
            apd_series.len()
        )));
    }
    Ok(())
}

fn first_flat_index(stats: &TrendStatistics, config: &StoppingConfig) -> Option<usize> {
    let len = stats.logged.len();
    (config.min_window..len).find(|&i| {
        below_floor(stats, config, i)
            && trend_is_flat(stats, config, i)
            && no_drift(stats, config, i)
            && minima_settled(stats, config, i)
    })
}

fn below_floor(stats: &TrendStatistics, config: &StoppingConfig, i: usize) -> bool {
    let v = stats.logged[i];
    v.is_finite() && v < config.log_floor
}

fn trend_is_flat(stats: &TrendStatistics, config: &StoppingConfig, i: usize) -> bool {
    let t = stats.trend[i];
    if !(t.is_finite() && t > config.pmcc_threshold) {
        return false;
    }
    let end = (i + config.pmcc_lookahead).min(stats.trend.len() - 1);
    stats.trend[i + 1..=end]
        .iter()
        .filter(|t| t.is_finite())
        .all(|&t| t > config.pmcc_lower_bound)
}

fn no_drift(stats: &TrendStatistics, config: &StoppingConfig, i: usize) -> bool {
    let threshold = config.auto_diff_threshold;
    let (a, h) = (stats.auto_diff[i], stats.auto_diff_half[i]);
    a.is_finite() && a > threshold && h.is_finite() && h > threshold
}

/// The most recent completed block minima show no residual downward trend.
fn minima_settled(stats: &TrendStatistics, config: &StoppingConfig, i: usize) -> bool {
    let completed = (i + 1) / config.min_window;
    if completed < config.minima_lookback {
        return false;
    }
    let (x, y): (Vec<f64>, Vec<f64>) = (completed - config.minima_lookback..completed)
        .filter_map(|b| {
            let m = *stats.block_minima.get(b)?;
            m.is_finite().then_some((b as f64, m))
        })
        .unzip();
    match pmcc(&x, &y) {
        Some(r) => r >= config.minima_pmcc_bound,
        None => false,
    }
}
