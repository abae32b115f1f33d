//! Seeded synthetic simulator output.
//!
//! Generators:
//! - single-exponential relaxation traces with optional Gaussian noise
//! - decay-then-plateau error series (log-linear decay onto a noisy floor)
//! - whole scenarios: several relaxing state variables sampled within each
//!   pace, with the pace-to-pace error measures computed from them

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::domain::{ErrorMeasure, ErrorSeries, Trace};
use crate::error::EstimatorError;
use crate::math::{mrms, mrms_trace, two_norm, two_norm_trace};

fn normal(sd: f64) -> Result<Normal<f64>, EstimatorError> {
    Normal::new(0.0, sd).map_err(|e| EstimatorError::InvalidConfig(format!("noise distribution: {e}")))
}

/// `V(n) = V∞ − (V∞ − V0)·exp(−n/τ)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelaxingState {
    pub name: String,
    pub initial: f64,
    pub asymptote: f64,
    pub tau: f64,
}

impl RelaxingState {
    pub fn value(&self, t: f64) -> f64 {
        self.asymptote - (self.asymptote - self.initial) * (-t / self.tau).exp()
    }
}

/// Exact (or noisy) relaxation trace over paces `0..paces`.
pub fn relaxation_trace(
    state: &RelaxingState,
    paces: usize,
    noise_sd: f64,
    seed: u64,
) -> Result<Trace, EstimatorError> {
    if !(state.tau.is_finite() && state.tau > 0.0) {
        return Err(EstimatorError::InvalidConfig(format!("tau must be positive, got {}", state.tau)));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = normal(noise_sd.max(0.0))?;
    let values = (0..paces)
        .map(|n| {
            let v = state.value(n as f64);
            if noise_sd > 0.0 { v + noise.sample(&mut rng) } else { v }
        })
        .collect();
    Ok(Trace::contiguous(0, values))
}

/// Shape of a decay-then-plateau error series, in `log10` units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayPlateau {
    pub paces: usize,
    /// Pace at which the decay reaches the floor.
    pub plateau_pace: usize,
    pub start_log10: f64,
    pub floor_log10: f64,
    /// Gaussian noise added to `log10(error)`.
    pub noise_sd: f64,
    /// Deterministic sinusoidal ripple added to `log10(error)`.
    pub ripple_amplitude: f64,
    pub ripple_period: f64,
    pub seed: u64,
}

impl Default for DecayPlateau {
    fn default() -> Self {
        Self {
            paces: 2500,
            plateau_pace: 1000,
            start_log10: -2.0,
            floor_log10: -8.0,
            noise_sd: 0.0,
            ripple_amplitude: 0.0,
            ripple_period: 7.0,
            seed: 42,
        }
    }
}

pub fn decay_plateau_series(shape: &DecayPlateau) -> Result<Vec<f64>, EstimatorError> {
    if shape.plateau_pace == 0 {
        return Err(EstimatorError::InvalidConfig("plateau_pace must be > 0".into()));
    }
    if shape.ripple_amplitude != 0.0 && !(shape.ripple_period > 0.0) {
        return Err(EstimatorError::InvalidConfig("ripple_period must be > 0".into()));
    }
    let mut rng = StdRng::seed_from_u64(shape.seed);
    let noise = normal(shape.noise_sd.max(0.0))?;
    let plateau = shape.plateau_pace as f64;

    Ok((0..shape.paces)
        .map(|n| {
            let progress = (n as f64).min(plateau) / plateau;
            let mut log = shape.start_log10 + (shape.floor_log10 - shape.start_log10) * progress;
            if shape.ripple_amplitude != 0.0 {
                log += shape.ripple_amplitude * (std::f64::consts::TAU * n as f64 / shape.ripple_period).sin();
            }
            if shape.noise_sd > 0.0 {
                log += noise.sample(&mut rng);
            }
            10f64.powf(log)
        })
        .collect())
}

/// A whole synthetic scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub states: Vec<RelaxingState>,
    pub paces: usize,
    /// Time samples recorded within each pace (for the trace measures).
    pub samples_per_pace: usize,
    /// Gaussian noise on every recorded state sample.
    pub noise_sd: f64,
    /// Converged APD90 (ms).
    pub true_apd: f64,
    /// APD90 offset per unit distance of the first state from its asymptote.
    pub apd_gain: f64,
    pub seed: u64,
}

impl Default for ScenarioSpec {
    fn default() -> Self {
        let state = |name: &str, initial, asymptote, tau| RelaxingState {
            name: name.to_string(),
            initial,
            asymptote,
            tau,
        };
        Self {
            states: vec![
                state("Nai", 7.0, 8.2, 180.0),
                state("Ki", 144.0, 142.5, 220.0),
                state("Cai", 1.0e-4, 1.1e-4, 60.0),
            ],
            paces: 2500,
            samples_per_pace: 5,
            noise_sd: 1e-9,
            true_apd: 280.0,
            apd_gain: 4.0,
            seed: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticScenario {
    pub names: Vec<String>,
    /// End-of-pace value of every state.
    pub traces: Vec<Trace>,
    pub measures: Vec<ErrorSeries>,
    pub apd: Vec<f64>,
    pub true_apd: f64,
}

pub fn generate_scenario(spec: &ScenarioSpec) -> Result<SyntheticScenario, EstimatorError> {
    if spec.states.is_empty() {
        return Err(EstimatorError::InvalidConfig("scenario needs at least one state".into()));
    }
    if let Some(s) = spec.states.iter().find(|s| !(s.tau.is_finite() && s.tau > 0.0)) {
        return Err(EstimatorError::InvalidConfig(format!("state '{}' needs a positive tau", s.name)));
    }
    let samples = spec.samples_per_pace.max(1);
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let noise = normal(spec.noise_sd.max(0.0))?;

    // within[n][k] is the state vector at time n + (k + 1)/samples.
    let within: Vec<Vec<Vec<f64>>> = (0..spec.paces)
        .map(|n| {
            (1..=samples)
                .map(|k| {
                    let t = n as f64 + k as f64 / samples as f64;
                    spec.states
                        .iter()
                        .map(|s| {
                            let v = s.value(t);
                            if spec.noise_sd > 0.0 { v + noise.sample(&mut rng) } else { v }
                        })
                        .collect()
                })
                .collect()
        })
        .collect();

    let end_of_pace = |n: usize| &within[n][samples - 1];
    let traces = (0..spec.states.len())
        .map(|j| Trace::contiguous(0, (0..spec.paces).map(|n| end_of_pace(n)[j]).collect()))
        .collect();

    let mut columns = vec![Vec::with_capacity(spec.paces); 4];
    for n in 0..spec.paces {
        let row = if n == 0 {
            [f64::NAN; 4]
        } else {
            [
                mrms(end_of_pace(n - 1), end_of_pace(n)).unwrap_or(f64::NAN),
                two_norm(end_of_pace(n - 1), end_of_pace(n)).unwrap_or(f64::NAN),
                mrms_trace(&within[n - 1], &within[n]).unwrap_or(f64::NAN),
                two_norm_trace(&within[n - 1], &within[n]).unwrap_or(f64::NAN),
            ]
        };
        for (col, v) in columns.iter_mut().zip(row) {
            col.push(v);
        }
    }
    let measures = ErrorMeasure::ALL
        .into_iter()
        .zip(columns)
        .map(|(measure, values)| ErrorSeries { measure, values })
        .collect();

    let first = &spec.states[0];
    let apd = (0..spec.paces)
        .map(|n| spec.true_apd + spec.apd_gain * (end_of_pace(n)[0] - first.asymptote))
        .collect();

    Ok(SyntheticScenario {
        names: spec.states.iter().map(|s| s.name.clone()).collect(),
        traces,
        measures,
        apd,
        true_apd: spec.true_apd,
    })
}
