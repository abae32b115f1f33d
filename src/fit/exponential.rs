//! Log-linear fit of a single exponential to a buffer of paces.
//!
//! Given observed values `v_0 .. v_N`, we regress
//!
//! ```text
//! ln|v_{i+1} − v_i| = α + β·i
//! ```
//!
//! and read off `τ = −1/β`. A buffer is only accepted when the log differences
//! are strongly anti-correlated with the index and the leading difference is
//! still large compared with the simulator's convergence tolerance.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::FitParameters;
use crate::math::{fit_line, pmcc};

/// Acceptance thresholds for a buffer fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitGate {
    /// Fits whose PMCC is above this are not decaying cleanly.
    pub pmcc_max: f64,
    /// `exp(α)` must exceed `amplitude_factor · tol_rel · |v_last|`.
    pub amplitude_factor: f64,
    pub tol_rel: f64,
}

impl Default for FitGate {
    fn default() -> Self {
        Self {
            pmcc_max: -0.75,
            amplitude_factor: 100.0,
            tol_rel: 1e-7,
        }
    }
}

/// Outcome of a buffer fit that was turned down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitRejection {
    TooFewPoints { usable: usize },
    NoDecay { pmcc: f64 },
    BelowTolerance { amplitude: f64, threshold: f64 },
    Growing { beta: f64 },
}

impl fmt::Display for FitRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewPoints { usable } => {
                write!(f, "only {usable} non-zero differences in the buffer")
            }
            Self::NoDecay { pmcc } => write!(f, "no clean decay (pmcc={pmcc:.3})"),
            Self::BelowTolerance { amplitude, threshold } => {
                write!(f, "amplitude {amplitude:.3e} below tolerance {threshold:.3e}")
            }
            Self::Growing { beta } => write!(f, "differences grow (beta={beta:.3e})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialFit {
    pub tau: f64,
    pub alpha: f64,
    pub beta: f64,
    pub pmcc: f64,
    /// Number of pace-to-pace steps in the buffer.
    pub buffer_size: i64,
}

impl ExponentialFit {
    pub fn to_fit_parameters(&self) -> FitParameters {
        FitParameters {
            tau: self.tau,
            alpha: self.alpha,
            asymptote: None,
        }
    }
}

/// Fit `(τ, α)` to `buffer` (oldest value first).
pub fn fit_exponential(buffer: &[f64], gate: &FitGate) -> Result<ExponentialFit, FitRejection> {
    let (x, y): (Vec<f64>, Vec<f64>) = buffer
        .windows(2)
        .enumerate()
        .filter_map(|(i, w)| {
            let d = (w[1] - w[0]).abs();
            (d > 0.0 && d.is_finite()).then(|| (i as f64, d.ln()))
        })
        .unzip();

    if x.len() < 3 {
        return Err(FitRejection::TooFewPoints { usable: x.len() });
    }

    let r = pmcc(&x, &y).unwrap_or(f64::NAN);
    if !(r <= gate.pmcc_max) {
        return Err(FitRejection::NoDecay { pmcc: r });
    }

    let line = fit_line(&x, &y).ok_or(FitRejection::NoDecay { pmcc: r })?;

    let last = buffer.last().copied().unwrap_or(0.0);
    let amplitude = line.intercept.exp();
    let threshold = gate.amplitude_factor * gate.tol_rel * last.abs();
    if amplitude < threshold {
        return Err(FitRejection::BelowTolerance { amplitude, threshold });
    }
    if line.slope >= 0.0 {
        return Err(FitRejection::Growing { beta: line.slope });
    }

    Ok(ExponentialFit {
        tau: -1.0 / line.slope,
        alpha: line.intercept,
        beta: line.slope,
        pmcc: r,
        buffer_size: buffer.len() as i64 - 1,
    })
}
