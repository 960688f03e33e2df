//! Descriptive statistic kernels.
//!
//! Small, allocation-light functions over `&[f64]` slices of present
//! values. Every function returns `None` when its input is too short for
//! the statistic to be defined, and callers decide how to surface that
//! (the profiler reports NaN, the insight engine skips the check).

use std::cmp::Ordering;

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Sample variance (n − 1 denominator). `None` below two values.
pub fn variance(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    let m = mean(data)?;
    let ss: f64 = data.iter().map(|v| (v - m) * (v - m)).sum();
    Some(ss / (data.len() - 1) as f64)
}

/// Sample standard deviation (n − 1 denominator). `None` below two values.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    variance(data).map(f64::sqrt)
}

/// Minimum value. `None` for an empty slice.
pub fn min(data: &[f64]) -> Option<f64> {
    data.iter().copied().reduce(f64::min)
}

/// Maximum value. `None` for an empty slice.
pub fn max(data: &[f64]) -> Option<f64> {
    data.iter().copied().reduce(f64::max)
}

/// Returns a sorted copy of `data`.
pub fn sorted(data: &[f64]) -> Vec<f64> {
    let mut v = data.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    v
}

/// Quantile of already-sorted data using linear interpolation between
/// the closest ranks (`h = (n − 1)·q`).
///
/// ```
/// use u_bizlens::stats::quantile_sorted;
///
/// let v = [1.0, 2.0, 3.0, 4.0];
/// assert_eq!(quantile_sorted(&v, 0.5), Some(2.5));
/// assert_eq!(quantile_sorted(&v, 0.25), Some(1.75));
/// ```
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    let frac = h - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Quantile of unsorted data (sorts a copy).
pub fn quantile(data: &[f64], q: f64) -> Option<f64> {
    quantile_sorted(&sorted(data), q)
}

/// Median (50th percentile, interpolated).
pub fn median(data: &[f64]) -> Option<f64> {
    quantile(data, 0.5)
}

/// Pearson correlation over paired observations.
///
/// Only positions where both sides are `Some` take part (pairwise
/// complete observations). `None` when fewer than two complete pairs
/// remain or either side has zero variance.
pub fn pearson_pairwise(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for &(a, b) in &pairs {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}
