//! Exponential extrapolation of a state variable beyond a fit buffer.
//!
//! Given:
//! - a buffer of observed values ending at the jump pace
//! - exponential fit parameters `(τ, α)` for that buffer
//! - the brute-force reference trace
//!
//! we predict:
//! - the remaining change `V_diff` and the asymptote
//! - the full predicted trajectory over the reference paces
//! - the `check_value` diagnostic comparing the observed change across the
//!   buffer with the change the fit implies

use tracing::warn;

use crate::domain::{
    ExtrapolationConfig, ExtrapolationResult, FitParameters, FitWarning, JumpParameters, SignRule,
    Trace,
};
use crate::error::EstimatorError;
use crate::math::fit_line;
use crate::models::{covered_fraction, remaining_change, total_amplitude, RelaxationCurve};

/// Extrapolate a buffer of observed values.
///
/// `buffer` holds the most recent observed values, oldest first, with the last
/// entry at `jump.jump_pace`. Only its drift direction is used; the anchor
/// and check values are read from `reference`.
pub fn extrapolate(
    buffer: &[f64],
    fit: &FitParameters,
    jump: &JumpParameters,
    reference: &Trace,
    config: &ExtrapolationConfig,
) -> Result<ExtrapolationResult, EstimatorError> {
    if buffer.len() < 2 {
        return Err(EstimatorError::InvalidInput(format!(
            "extrapolation buffer needs at least two values, got {}",
            buffer.len()
        )));
    }
    if jump.buffer_size <= 0 {
        return Err(EstimatorError::InvalidInput(format!(
            "buffer size must be positive, got {}",
            jump.buffer_size
        )));
    }
    let tau = fit.tau;
    if !tau.is_finite() || tau.abs() <= config.tau_epsilon || !fit.alpha.is_finite() {
        return Err(EstimatorError::DegenerateFit {
            tau,
            epsilon: config.tau_epsilon,
        });
    }

    let anchor_value = reference
        .value_at(jump.jump_pace)
        .ok_or(EstimatorError::PaceOutOfRange { pace: jump.jump_pace })?;
    let start_value = reference
        .value_at(jump.buffer_start())
        .ok_or(EstimatorError::PaceOutOfRange { pace: jump.buffer_start() })?;

    let magnitude = remaining_change(fit.alpha, tau, jump.buffer_size, jump.extrapolation_coefficient);
    let v_diff = buffer_direction(buffer, config.sign_rule) * magnitude;

    let curve = RelaxationCurve {
        anchor_pace: jump.jump_pace,
        anchor_value,
        v_diff,
        tau,
    };
    let asymptote = curve.asymptote();
    if !v_diff.is_finite() || !asymptote.is_finite() {
        return Err(EstimatorError::NonFiniteExtrapolation { v_diff });
    }

    let predicted_values: Vec<f64> = reference.paces().iter().map(|&p| curve.predict(p)).collect();

    let max_deviation_after_jump = reference
        .iter()
        .zip(&predicted_values)
        .filter(|((pace, _), _)| *pace >= jump.jump_pace)
        .map(|((_, actual), predicted)| (predicted - actual).abs())
        .fold(0.0, f64::max);
    let terminal_error = reference
        .last_value()
        .map(|last| (asymptote - last).abs())
        .unwrap_or(f64::NAN);

    let check_value = (start_value - anchor_value).abs() / total_amplitude(fit.alpha, tau);
    let predicted_value = covered_fraction(tau, jump.buffer_size);
    let relative_deviation = (check_value - predicted_value).abs() / predicted_value.abs().max(f64::EPSILON);

    let warning = if !(relative_deviation <= config.check_tolerance) {
        warn!(
            check_value,
            predicted_value,
            relative_deviation,
            jump_pace = jump.jump_pace,
            "buffer deviates from the fitted exponential"
        );
        Some(FitWarning {
            check_value,
            predicted_value,
            relative_deviation,
        })
    } else {
        None
    };

    Ok(ExtrapolationResult {
        predicted: Trace::from_samples(reference.paces().to_vec(), predicted_values)?,
        v_diff,
        asymptote,
        check_value,
        predicted_value,
        warning,
        max_deviation_after_jump,
        terminal_error,
    })
}

/// Slice the buffer out of `reference` and extrapolate it.
pub fn extrapolate_reference(
    fit: &FitParameters,
    jump: &JumpParameters,
    reference: &Trace,
    config: &ExtrapolationConfig,
) -> Result<ExtrapolationResult, EstimatorError> {
    let buffer = reference
        .window(jump.buffer_start(), jump.jump_pace)
        .ok_or(EstimatorError::PaceOutOfRange { pace: jump.buffer_start() })?;
    extrapolate(&buffer, fit, jump, reference, config)
}

/// `+1.0` when the buffer drifts upwards (or is level), `-1.0` when it drifts down.
pub fn buffer_direction(buffer: &[f64], rule: SignRule) -> f64 {
    let endpoints = || match (buffer.first(), buffer.last()) {
        (Some(first), Some(last)) if last - first < 0.0 => -1.0,
        _ => 1.0,
    };
    match rule {
        SignRule::Endpoints => endpoints(),
        SignRule::LeastSquares => {
            let x: Vec<f64> = (0..buffer.len()).map(|i| i as f64).collect();
            match fit_line(&x, buffer) {
                Some(line) if line.slope < 0.0 => -1.0,
                Some(_) => 1.0,
                None => endpoints(),
            }
        }
    }
}
