use crate::error::SemoosError;
use ndarray::{Array2, ArrayView1};

/// Minkowski distance between two rows. `p = inf` gives the Chebyshev distance.
pub fn minkowski(a: ArrayView1<f64>, b: ArrayView1<f64>, p: f64) -> f64 {
    let diffs = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs());
    if p.is_infinite() {
        diffs.fold(0.0, f64::max)
    } else if p == 1.0 {
        diffs.sum()
    } else if p == 2.0 {
        diffs.map(|d| d * d).sum::<f64>().sqrt()
    } else {
        diffs.map(|d| d.powf(p)).sum::<f64>().powf(1.0 / p)
    }
}

/// Full pairwise distance matrix over the rows of `X`.
///
/// p=2 is the Euclidean distance, p=1 the Manhattan distance, 0<p<1 separates better
/// in high dimension.
pub fn distance_matrix(X: &Array2<f64>, p: f64) -> Result<Array2<f64>, SemoosError> {
    if p.is_nan() || p <= 0.0 {
        return Err(SemoosError::Config(format!(
            "Invalid p_minkowski={}. Must be > 0.",
            p
        )));
    }

    let n = X.nrows();
    let mut distances = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let d = minkowski(X.row(i), X.row(j), p);
            distances[[i, j]] = d;
            distances[[j, i]] = d;
        }
    }
    Ok(distances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_distance_matrix_euclidean_is_symmetric_with_zero_diagonal() {
        let x = array![[0.0, 0.0], [3.0, 4.0], [6.0, 8.0]];
        let d = distance_matrix(&x, 2.0).unwrap();
        assert_eq!(d[[0, 1]], 5.0);
        assert_eq!(d[[0, 2]], 10.0);
        for i in 0..3 {
            assert_eq!(d[[i, i]], 0.0);
            for j in 0..3 {
                assert_eq!(d[[i, j]], d[[j, i]]);
            }
        }
    }

    #[test]
    fn test_distance_matrix_manhattan_and_chebyshev() {
        let x = array![[0.0, 0.0], [3.0, 4.0]];
        assert_eq!(distance_matrix(&x, 1.0).unwrap()[[0, 1]], 7.0);
        assert_eq!(distance_matrix(&x, f64::INFINITY).unwrap()[[0, 1]], 4.0);
    }

    #[test]
    fn test_distance_matrix_fractional_p() {
        let x = array![[0.0, 0.0], [1.0, 1.0]];
        let d = distance_matrix(&x, 0.5).unwrap();
        assert!((d[[0, 1]] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_matrix_rejects_invalid_p() {
        let x = array![[0.0], [1.0]];
        assert!(matches!(distance_matrix(&x, 0.0), Err(SemoosError::Config(_))));
        assert!(matches!(distance_matrix(&x, f64::NAN), Err(SemoosError::Config(_))));
    }
}
