use std::f64::consts::PI;

use crate::stats::{quantile_sorted, sorted, std_dev};

/// Equal-width bins over the data range.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    /// `counts.len() + 1` bin edges.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    #[inline] pub fn bin_width(&self) -> f64 { self.edges[1] - self.edges[0] }

    pub fn max_count(&self) -> usize { self.counts.iter().copied().max().unwrap_or(0) }

    pub fn total(&self) -> usize { self.counts.iter().sum() }
}

/// Bin count: the larger of Sturges' and Freedman-Diaconis' rules, capped at 100.
pub fn auto_bins(values: &[f64]) -> usize {
    let n = values.len();
    if n < 2 { return 1 }

    let sturges = (n as f64).log2().ceil() as usize + 1;
    let s = sorted(values);
    let (min, max) = (s[0], s[n - 1]);
    let iqr = quantile_sorted(&s, 0.75).unwrap_or(0.0) - quantile_sorted(&s, 0.25).unwrap_or(0.0);
    let fd = if iqr > 0.0 && max > min {
        let width = 2.0 * iqr / (n as f64).cbrt();
        ((max - min) / width).ceil() as usize
    } else {
        0
    };
    sturges.max(fd).clamp(1, 100)
}

/// Histogram with `bins` equal-width bins; the last bin is closed on the right.
pub fn histogram(values: &[f64], bins: usize) -> Option<Histogram> {
    if values.is_empty() || bins == 0 { return None }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // A constant column gets a unit-wide range around its value.
    let (lo, hi) = if max > min { (min, max) } else { (min - 0.5, max + 0.5) };
    let width = (hi - lo) / bins as f64;

    let edges = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0; bins];
    for &v in values {
        let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    Some(Histogram { edges, counts })
}

/// Gaussian kernel density estimate at `points` evenly spaced positions spanning the data
/// range padded by three bandwidths. Bandwidth by Scott's rule. Returns (x, density) pairs.
pub fn gaussian_kde(values: &[f64], points: usize) -> Vec<(f64, f64)> {
    let n = values.len();
    let Some(sd) = std_dev(values).filter(|sd| *sd > 0.0) else { return Vec::new() };
    if points < 2 { return Vec::new() }

    let bandwidth = sd * (n as f64).powf(-0.2);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min) - 3.0 * bandwidth;
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max) + 3.0 * bandwidth;
    let step = (max - min) / (points - 1) as f64;
    let norm = 1.0 / (n as f64 * bandwidth * (2.0 * PI).sqrt());

    (0..points)
        .map(|i| {
            let x = min + step * i as f64;
            let density = values.iter()
                .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>() * norm;
            (x, density)
        })
        .collect()
}
