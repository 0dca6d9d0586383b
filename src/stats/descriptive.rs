use serde::Serialize;

/// Present, finite values only.
pub fn finite(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().filter(|v| v.is_finite()).collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 { return None }
    let m = mean(values)?;
    let ss = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Quantile `q` in [0, 1] of sorted values, linearly interpolated between closest ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) { return None }
    let pos = q * (sorted.len() - 1) as f64;
    let (lo, hi) = (pos.floor() as usize, pos.ceil() as usize);
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// Quantile `q` in [0, 1] of unsorted values.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    quantile_sorted(&sorted(values), q)
}

pub(crate) fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Describe-style summary of a numeric column.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl Summary {
    /// Summarize the finite values; `None` when there are none.
    pub fn of(values: &[Option<f64>]) -> Option<Self> {
        let values = sorted(&finite(values));
        Some(Self {
            count: values.len(),
            mean: mean(&values)?,
            std: std_dev(&values),
            min: *values.first()?,
            q1: quantile_sorted(&values, 0.25)?,
            median: quantile_sorted(&values, 0.5)?,
            q3: quantile_sorted(&values, 0.75)?,
            max: *values.last()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::{finite, mean, quantile, std_dev, Summary};

    #[test]
    fn finite_drops_missing_and_nan() {
        assert_eq!(finite(&[Some(1.0), None, Some(f64::NAN), Some(2.0)]), vec![1.0, 2.0]);
    }

    #[test]
    fn sample_statistics() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_abs_diff_eq!(mean(&v).unwrap(), 5.0);
        assert_abs_diff_eq!(std_dev(&v).unwrap(), 2.138_089_935, epsilon = 1e-9);
        assert_eq!(std_dev(&[1.0]), None);
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn quantiles_interpolate_linearly() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert_abs_diff_eq!(quantile(&v, 0.5).unwrap(), 2.5);
        assert_abs_diff_eq!(quantile(&v, 0.25).unwrap(), 1.75);
        assert_abs_diff_eq!(quantile(&v, 1.0).unwrap(), 4.0);
        assert_eq!(quantile(&v, 1.5), None);
    }

    #[test]
    fn summary_of_column() {
        let s = Summary::of(&[Some(1.0), None, Some(3.0), Some(2.0)]).unwrap();
        assert_eq!(s.count, 3);
        assert_abs_diff_eq!(s.median, 2.0);
        assert_abs_diff_eq!(s.min, 1.0);
        assert_abs_diff_eq!(s.max, 3.0);
        assert!(Summary::of(&[None]).is_none());
    }
}
