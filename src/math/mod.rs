// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.


use crate::constants::MAD_TO_SIGMA;

/// The median of a slice. The input does not need to be sorted.
///
/// An empty input is a programmer error.
pub(crate) fn median(values: &[f64]) -> f64 {
    debug_assert!(!values.is_empty());
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// The median absolute deviation of a slice about a given centre.
pub(crate) fn median_absolute_deviation(values: &[f64], centre: f64) -> f64 {
    let deviations: Vec<f64> = values.iter().map(|&v| (v - centre).abs()).collect();
    median(&deviations)
}

/// A robust standard-deviation estimate: the MAD about the median, scaled to
/// the equivalent Gaussian sigma.
pub(crate) fn robust_sigma(values: &[f64]) -> f64 {
    let centre = median(values);
    MAD_TO_SIGMA * median_absolute_deviation(values, centre)
}

/// Fit a polynomial of the given order to (x, y) pairs by least squares.
///
/// The normal equations are assembled from power sums and solved by Gaussian
/// elimination; coefficients are returned lowest order first. Callers are
/// expected to centre and scale `x` beforehand to keep the system well
/// conditioned. Returns `None` if the system is singular (e.g. all `x`
/// identical) or if there are fewer points than coefficients.
pub(crate) fn polyfit(x: &[f64], y: &[f64], order: usize) -> Option<Vec<f64>> {
    debug_assert_eq!(x.len(), y.len());
    let num_coeffs = order + 1;
    if x.len() < num_coeffs {
        return None;
    }

    // The (i, j) element of A^T A is sum(x^(i+j)), and the i-th element of
    // A^T y is sum(x^i y); both need only the power sums.
    let mut power_sums = vec![0.0; 2 * num_coeffs - 1];
    let mut rhs = vec![0.0; num_coeffs];
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let mut x_pow = 1.0;
        for (k, sum) in power_sums.iter_mut().enumerate() {
            *sum += x_pow;
            if k < num_coeffs {
                rhs[k] += x_pow * yi;
            }
            x_pow *= xi;
        }
    }

    let mut matrix = vec![vec![0.0; num_coeffs]; num_coeffs];
    for (i, row) in matrix.iter_mut().enumerate() {
        for (j, elem) in row.iter_mut().enumerate() {
            *elem = power_sums[i + j];
        }
    }

    solve_linear_system(matrix, rhs)
}

/// Evaluate a polynomial with coefficients ordered lowest first (Horner's
/// method).
pub(crate) fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Solve a square linear system by Gaussian elimination with partial
/// pivoting. Returns `None` for a singular (or near-singular) matrix.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        let mut max_row = col;
        let mut max_val = a[col][col].abs();
        for row in col + 1..n {
            let val = a[row][col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }
        if max_val < 1e-12 {
            return None;
        }
        if max_row != col {
            a.swap(col, max_row);
            b.swap(col, max_row);
        }

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for col in row + 1..n {
            sum -= a[row][col] * solution[col];
        }
        solution[row] = sum / a[row][row];
    }
    Some(solution)
}
