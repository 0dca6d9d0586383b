/// Pearson correlation over pairwise-complete observations.
/// `None` with fewer than two pairs or a constant side.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs = x.iter().zip(y)
        .filter_map(|(a, b)| Some((a.filter(|v| v.is_finite())?, b.filter(|v| v.is_finite())?)))
        .collect::<Vec<_>>();
    let n = pairs.len();
    if n < 2 { return None }

    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n as f64;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n as f64;
    let (sxy, sxx, syy) = pairs.iter().fold((0.0, 0.0, 0.0), |(sxy, sxx, syy), &(a, b)| {
        let (dx, dy) = (a - mx, b - my);
        (sxy + dx * dy, sxx + dx * dx, syy + dy * dy)
    });
    if sxx <= 0.0 || syy <= 0.0 { return None }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Symmetric matrix of pairwise Pearson coefficients, with 1 on the diagonal
/// of any column that has variance.
pub fn correlation_matrix(columns: &[Vec<Option<f64>>]) -> Vec<Vec<Option<f64>>> {
    let k = columns.len();
    let mut matrix = vec![vec![None; k]; k];
    for i in 0..k {
        for j in i..k {
            let r = pearson(&columns[i], &columns[j]);
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }
    matrix
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::{correlation_matrix, pearson};

    fn col(v: &[f64]) -> Vec<Option<f64>> { v.iter().copied().map(Some).collect() }

    #[test]
    fn perfect_and_inverse_correlation() {
        let x = col(&[1.0, 2.0, 3.0, 4.0]);
        assert_abs_diff_eq!(pearson(&x, &col(&[2.0, 4.0, 6.0, 8.0])).unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pearson(&x, &col(&[4.0, 3.0, 2.0, 1.0])).unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn missing_pairs_are_skipped() {
        let x = vec![Some(1.0), Some(2.0), None, Some(4.0)];
        let y = vec![Some(1.0), Some(2.0), Some(100.0), Some(4.0)];
        assert_abs_diff_eq!(pearson(&x, &y).unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(pearson(&col(&[1.0, 1.0]), &col(&[1.0, 2.0])), None);
    }

    #[test]
    fn matrix_is_symmetric() {
        let m = correlation_matrix(&[col(&[1.0, 2.0, 3.0]), col(&[3.0, 1.0, 2.0]), col(&[5.0, 5.0, 5.0])]);
        assert_eq!(m[0][1], m[1][0]);
        assert_abs_diff_eq!(m[0][0].unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(m[2][2], None);
        assert_abs_diff_eq!(m[0][1].unwrap(), -0.5, epsilon = 1e-12);
    }
}
