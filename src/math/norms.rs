//! Pace-to-pace error norms.
//!
//! `a` is the earlier pace (or the reference); MRMS normalises every
//! difference by `1 + |a_i|` so that large and small state variables weigh
//! comparably.

/// Mean-root-mean-square difference of two state vectors.
pub fn mrms(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = (x - y) / (1.0 + x.abs());
            d * d
        })
        .sum();
    Some((sum / a.len() as f64).sqrt())
}

/// Euclidean distance between two state vectors.
pub fn two_norm(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    let sum: f64 = a.iter().zip(b).map(|(&x, &y)| (x - y) * (x - y)).sum();
    Some(sum.sqrt())
}

/// MRMS over every sample of two whole-pace traces (rows = time samples).
pub fn mrms_trace(a: &[Vec<f64>], b: &[Vec<f64>]) -> Option<f64> {
    let (sum, count) = paired_samples(a, b)?
        .map(|(x, y)| {
            let d = (x - y) / (1.0 + x.abs());
            d * d
        })
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        return None;
    }
    Some((sum / count as f64).sqrt())
}

/// 2-norm over every sample of two whole-pace traces.
pub fn two_norm_trace(a: &[Vec<f64>], b: &[Vec<f64>]) -> Option<f64> {
    let sum: f64 = paired_samples(a, b)?.map(|(x, y)| (x - y) * (x - y)).sum();
    Some(sum.sqrt())
}

fn paired_samples<'a>(
    a: &'a [Vec<f64>],
    b: &'a [Vec<f64>],
) -> Option<impl Iterator<Item = (f64, f64)> + 'a> {
    if a.len() != b.len() || a.iter().zip(b).any(|(ra, rb)| ra.len() != rb.len()) {
        return None;
    }
    Some(
        a.iter()
            .zip(b)
            .flat_map(|(ra, rb)| ra.iter().copied().zip(rb.iter().copied())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mrms_normalises_by_reference_magnitude() {
        // (1-2)/(1+1) = -0.5 ; (0-0)/1 = 0 -> sqrt(0.25/2)
        let v = mrms(&[1.0, 0.0], &[2.0, 0.0]).unwrap();
        assert!((v - (0.125f64).sqrt()).abs() < 1e-12);
        assert!(mrms(&[1.0], &[1.0, 2.0]).is_none());
    }

    #[test]
    fn two_norm_is_euclidean() {
        assert_eq!(two_norm(&[0.0, 0.0], &[3.0, 4.0]), Some(5.0));
    }

    #[test]
    fn trace_norms_cover_every_sample() {
        let a = vec![vec![0.0, 0.0], vec![0.0, 0.0]];
        let b = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
        assert_eq!(two_norm_trace(&a, &b), Some(2.0));
        assert_eq!(mrms_trace(&a, &b), Some(1.0));
        assert!(mrms_trace(&a, &b[..1]).is_none());
    }
}
