//! Pairwise distances from aggregated site counts.
//!
//! Cells without compared sites and saturated proportions are reported as
//! [`DistanceError`]s. They are never coerced to zero, NaN or infinity.

use crate::libs::error::DistanceError;
use crate::libs::matrix::SquareMatrix;

/// Saturation point of the Jukes-Cantor correction.
pub const JC_SATURATION: f64 = 0.75;

/// Proportion of differing sites, `diff / non_missing`.
///
/// The diagonal is 0 and not inspected.
///
/// ```
/// use wintree::libs::distance::p_distance;
/// use wintree::libs::matrix::SquareMatrix;
/// let nm = SquareMatrix::from_rows(vec![vec![100i64, 100], vec![100, 100]]).unwrap();
/// let diff = SquareMatrix::from_rows(vec![vec![0i64, 10], vec![10, 0]]).unwrap();
/// let p = p_distance(&nm, &diff).unwrap();
/// assert_eq!(p.get(0, 1), 0.1);
/// ```
pub fn p_distance(
    non_missing: &SquareMatrix<i64>,
    diff: &SquareMatrix<i64>,
) -> Result<SquareMatrix<f64>, DistanceError> {
    if non_missing.size() != diff.size() {
        return Err(DistanceError::SizeMismatch(non_missing.size(), diff.size()));
    }

    let n = non_missing.size();
    let mut p = SquareMatrix::new(n);
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let sites = non_missing.get(i, j);
            if sites <= 0 {
                return Err(DistanceError::NoSites { row: i, col: j });
            }
            p.set(i, j, diff.get(i, j) as f64 / sites as f64);
        }
    }

    Ok(p)
}

/// Jukes-Cantor correction of a single proportion.
///
/// ```
/// use wintree::libs::distance::jc_correct;
/// assert!((jc_correct(0.1).unwrap() - 0.1073256).abs() < 1e-7);
/// assert_eq!(jc_correct(0.0).unwrap(), 0.0);
/// assert!(jc_correct(0.75).is_none());
/// ```
pub fn jc_correct(p: f64) -> Option<f64> {
    if !p.is_finite() || !(0.0..JC_SATURATION).contains(&p) {
        return None;
    }
    // -0.0 for p == 0
    Some((-0.75 * (1.0 - 4.0 * p / 3.0).ln()).abs())
}

/// `d = -3/4 · ln(1 - 4/3 · p)` for every off-diagonal cell.
pub fn jukes_cantor(p: &SquareMatrix<f64>) -> Result<SquareMatrix<f64>, DistanceError> {
    let n = p.size();
    let mut d = SquareMatrix::new(n);
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let value = p.get(i, j);
            if !value.is_finite() || value < 0.0 {
                return Err(DistanceError::InvalidProportion { row: i, col: j, p: value });
            }
            match jc_correct(value) {
                Some(dist) => d.set(i, j, dist),
                None => return Err(DistanceError::Saturated { row: i, col: j, p: value }),
            }
        }
    }

    Ok(d)
}
