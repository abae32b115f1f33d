//! Small descriptive statistics over `f64` slices.
//!
//! Every helper here skips nothing on its own: callers decide which samples
//! are admissible (finite, positive, ...) before handing them over.

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (`n - 1` denominator), `None` below two samples.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (n as f64 - 1.0)).sqrt())
}

/// Pearson product-moment correlation coefficient.
///
/// - fewer than 3 pairs, mismatched inputs, or constant `x` give `None`
/// - constant `y` (nothing left to correlate) gives `Some(0.0)`
pub fn pmcc(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n < 3 || n != y.len() {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mx;
        let dy = yi - my;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if sxx == 0.0 {
        return None;
    }
    if syy == 0.0 {
        return Some(0.0);
    }
    let r = sxy / (sxx * syy).sqrt();
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// PMCC of a sequence against its own index `0..n`.
pub fn pmcc_against_index(values: &[f64]) -> Option<f64> {
    let x: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    pmcc(&x, values)
}

/// Quantile with linear interpolation between order statistics.
///
/// `q` is clamped to `[0, 1]`; non-finite samples are ignored.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() as f64 - 1.0);
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}
