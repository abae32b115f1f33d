//! Evaluation of the relaxation curve `V(n) = V∞ − A·exp(−n/τ)`.
//!
//! Pace-to-pace differences of such a curve are geometric:
//!
//! ```text
//! |V(n+1) − V(n)| = exp(α − (n − n0)/τ)
//! ```
//!
//! so summing the tail of that series from the end of a buffer of `N` steps
//! gives the remaining change:
//!
//! ```text
//! ΔV = exp(α − N/τ) / (1 − exp(−1/τ))
//! ```
//!
//! Numerical notes:
//! - `1 − exp(−1/τ)` loses precision for large `τ`; it is computed as
//!   `−expm1(−1/τ)`.

/// `1 − exp(−1/τ)`, the ratio denominator of the geometric tail.
pub fn tail_denominator(tau: f64) -> f64 {
    -(-1.0 / tau).exp_m1()
}

/// Total relaxation still ahead at the start of the buffer: `exp(α)/(1 − exp(−1/τ))`.
pub fn total_amplitude(alpha: f64, tau: f64) -> f64 {
    (alpha.exp() / tail_denominator(tau)).abs()
}

/// Unsigned change predicted beyond the end of a buffer of `buffer_size` steps.
pub fn remaining_change(alpha: f64, tau: f64, buffer_size: i64, coefficient: f64) -> f64 {
    (coefficient * (alpha - buffer_size as f64 / tau).exp() / tail_denominator(tau)).abs()
}

/// Fraction of the total amplitude an exact exponential covers over `buffer_size` steps.
pub fn covered_fraction(tau: f64, buffer_size: i64) -> f64 {
    -(-(buffer_size as f64) / tau).exp_m1()
}

/// An anchored relaxation curve: passes through `anchor_value` at
/// `anchor_pace` and approaches `anchor_value + v_diff`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelaxationCurve {
    pub anchor_pace: i64,
    pub anchor_value: f64,
    pub v_diff: f64,
    pub tau: f64,
}

impl RelaxationCurve {
    pub fn predict(&self, pace: i64) -> f64 {
        let dn = (pace - self.anchor_pace) as f64;
        self.anchor_value + self.v_diff * -(-dn / self.tau).exp_m1()
    }

    pub fn asymptote(&self) -> f64 {
        self.anchor_value + self.v_diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_passes_through_anchor_and_approaches_asymptote() {
        let c = RelaxationCurve {
            anchor_pace: 100,
            anchor_value: 1.0,
            v_diff: 0.5,
            tau: 10.0,
        };
        assert!((c.predict(100) - 1.0).abs() < 1e-15);
        assert!((c.predict(10_000) - 1.5).abs() < 1e-12);
        assert!((c.predict(110) - (1.0 + 0.5 * (1.0 - (-1.0f64).exp()))).abs() < 1e-12);
    }

    #[test]
    fn tail_denominator_is_stable_for_large_tau() {
        let tau = 1e12;
        let d = tail_denominator(tau);
        assert!((d * tau - 1.0).abs() < 1e-6);
    }

    #[test]
    fn remaining_change_is_geometric_tail() {
        // exp(α − N/τ) summed over k = 0.. with ratio exp(−1/τ).
        let (alpha, tau, n) = (-2.0, 5.0, 7);
        let direct: f64 = (0..10_000)
            .map(|k| (alpha - (n + k) as f64 / tau).exp())
            .sum();
        assert!((remaining_change(alpha, tau, n, 1.0) - direct).abs() < 1e-12);
        assert!((remaining_change(alpha, tau, n, 0.5) - 0.5 * direct).abs() < 1e-12);
    }
}
