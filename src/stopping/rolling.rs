//! Rolling-window statistics over a (log-domain) error series.
//!
//! Every column has the same length as its input. Paces where a statistic is
//! undefined (window leaves the series, not enough finite samples) hold NaN,
//! and NaN inputs are skipped inside each window.

use crate::domain::WindowAlignment;
use crate::math::{mean, pmcc, sample_std};

/// Inclusive bounds of the window of width `width` reported at index `i`.
///
/// `None` when the window does not lie entirely inside `0..len`.
pub fn window_bounds(i: usize, width: usize, len: usize, alignment: WindowAlignment) -> Option<(usize, usize)> {
    if width == 0 {
        return None;
    }
    let start = match alignment {
        WindowAlignment::Centered => i.checked_sub(width / 2)?,
        WindowAlignment::Trailing => (i + 1).checked_sub(width)?,
    };
    let end = start + width - 1;
    (end < len).then_some((start, end))
}

fn finite_in(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

fn rolling<F>(values: &[f64], width: usize, alignment: WindowAlignment, stat: F) -> Vec<f64>
where
    F: Fn(&[f64], usize) -> Option<f64>,
{
    (0..values.len())
        .map(|i| {
            window_bounds(i, width, values.len(), alignment)
                .and_then(|(s, e)| stat(&values[s..=e], s))
                .unwrap_or(f64::NAN)
        })
        .collect()
}

/// Rolling mean of the finite samples in each window.
pub fn rolling_mean(values: &[f64], width: usize, alignment: WindowAlignment) -> Vec<f64> {
    rolling(values, width, alignment, |w, _| mean(&finite_in(w)))
}

/// Rolling sample standard deviation of the finite samples in each window.
pub fn rolling_std(values: &[f64], width: usize, alignment: WindowAlignment) -> Vec<f64> {
    rolling(values, width, alignment, |w, _| sample_std(&finite_in(w)))
}

/// Rolling Pearson correlation between pace index and value.
///
/// A flat window correlates as 0.
pub fn rolling_trend(values: &[f64], width: usize, alignment: WindowAlignment) -> Vec<f64> {
    rolling(values, width, alignment, |w, start| {
        let (x, y): (Vec<f64>, Vec<f64>) = w
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(k, &v)| ((start + k) as f64, v))
            .unzip();
        pmcc(&x, &y)
    })
}

/// First differences, `d[k] = v[k] − v[k−1]`; `d[0]` is NaN.
pub fn first_differences(values: &[f64]) -> Vec<f64> {
    let mut d = Vec::with_capacity(values.len());
    if !values.is_empty() {
        d.push(f64::NAN);
    }
    d.extend(values.windows(2).map(|w| {
        if w[0].is_finite() && w[1].is_finite() {
            w[1] - w[0]
        } else {
            f64::NAN
        }
    }));
    d
}

/// Rolling t-like statistic of the first differences: `mean(d) / (std(d)/√n)`.
///
/// Values with `|stat| > clip` are set to NaN. A window of identical
/// differences gives 0 when they are all zero and NaN otherwise.
pub fn rolling_auto_diff(values: &[f64], width: usize, alignment: WindowAlignment, clip: f64) -> Vec<f64> {
    let d = first_differences(values);
    rolling(&d, width, alignment, |w, _| {
        let v = finite_in(w);
        let m = mean(&v)?;
        let sd = sample_std(&v)?;
        let stat = if sd == 0.0 {
            if m == 0.0 { 0.0 } else { f64::NAN }
        } else {
            m / (sd / (v.len() as f64).sqrt())
        };
        (stat.is_finite() && stat.abs() <= clip).then_some(stat)
    })
}

/// Minimum of the finite samples in each complete block of `block` values.
///
/// A trailing partial block is dropped.
pub fn block_minima(values: &[f64], block: usize) -> Vec<f64> {
    if block == 0 {
        return Vec::new();
    }
    values
        .chunks_exact(block)
        .map(|chunk| {
            chunk
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .reduce(f64::min)
                .unwrap_or(f64::NAN)
        })
        .collect()
}
