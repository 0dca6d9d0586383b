use crate::stats::{quantile_sorted, sorted};

/// Box-and-whisker summary with 1.5 x IQR whiskers.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Most extreme values within 1.5 x IQR of the box.
    pub whisker_low: f64,
    pub whisker_high: f64,
    pub outliers: Vec<f64>,
    pub count: usize,
}

impl BoxStats {
    pub fn of(values: &[f64]) -> Option<Self> {
        let s = sorted(values);
        let q1 = quantile_sorted(&s, 0.25)?;
        let median = quantile_sorted(&s, 0.5)?;
        let q3 = quantile_sorted(&s, 0.75)?;
        let iqr = q3 - q1;
        let (lo_fence, hi_fence) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);

        let inside = s.iter().copied().filter(|v| (lo_fence..=hi_fence).contains(v));
        let whisker_low = inside.clone().next().unwrap_or(q1);
        let whisker_high = inside.last().unwrap_or(q3);
        let outliers = s.iter().copied().filter(|v| !(lo_fence..=hi_fence).contains(v)).collect();

        Some(Self { q1, median, q3, whisker_low, whisker_high, outliers, count: s.len() })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::BoxStats;

    #[test]
    fn outliers_beyond_fences() {
        let b = BoxStats::of(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]).unwrap();
        assert_abs_diff_eq!(b.median, 3.5);
        assert_eq!(b.outliers, vec![100.0]);
        assert_eq!(b.whisker_high, 5.0);
        assert_eq!(b.whisker_low, 1.0);
        assert_eq!(b.count, 6);
        assert!(BoxStats::of(&[]).is_none());
    }
}
