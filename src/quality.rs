//! Matrix builders for the match-quality computation
//!
//! `TrueSkill::quality` evaluates a closed-form Gaussian integral; these
//! helpers build the two matrices that formula consumes.

use nalgebra::DMatrix;

use crate::rating::Rating;

/// Diagonal matrix of the individual rating variances
pub fn variance_matrix(flatten_ratings: &[Rating]) -> DMatrix<f64> {
    let n = flatten_ratings.len();
    DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            flatten_ratings[i].variance()
        } else {
            0.0
        }
    })
}

/// Rotated design matrix: one row per adjacent team pair, `+weight` under
/// the first team's player columns and `-weight` under the second's
pub fn rotated_a_matrix(rating_groups: &[Vec<Rating>], flatten_weights: &[f64]) -> DMatrix<f64> {
    let total: usize = rating_groups.iter().map(|g| g.len()).sum();
    let mut matrix = DMatrix::zeros(rating_groups.len() - 1, total);
    let mut offset = 0;
    for (row, pair) in rating_groups.windows(2).enumerate() {
        for x in offset..offset + pair[0].len() {
            matrix[(row, x)] = flatten_weights[x];
        }
        let next = offset + pair[0].len();
        for d in next..next + pair[1].len() {
            matrix[(row, d)] = -flatten_weights[d];
        }
        offset = next;
    }
    matrix
}
