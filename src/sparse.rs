//! Sparse matrix utilities.
//!
//! Helper functions for building the nalgebra-sparse matrices handed to the
//! solver.

use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CscMatrix};

/// Entries with magnitude below this are dropped when sparsifying.
const DROP_TOL: f64 = 1e-15;

/// Create a CSC matrix from triplets (row, col, value).
///
/// Duplicates are summed together; out-of-range entries are ignored.
pub fn csc_from_triplets(
    nrows: usize,
    ncols: usize,
    triplets: impl IntoIterator<Item = (usize, usize, f64)>,
) -> CscMatrix<f64> {
    let mut coo = CooMatrix::new(nrows, ncols);
    for (row, col, val) in triplets {
        if row < nrows && col < ncols {
            coo.push(row, col, val);
        }
    }
    CscMatrix::from(&coo)
}

/// Upper triangle (diagonal included) of a square dense matrix, scaled.
///
/// Clarabel reads only the upper triangle of the quadratic cost.
pub fn upper_triangle_to_csc(dense: &DMatrix<f64>, scale: f64) -> CscMatrix<f64> {
    let n = dense.nrows().min(dense.ncols());
    let triplets = (0..n).flat_map(|j| (0..=j).map(move |i| (i, j))).filter_map(|(i, j)| {
        let v = dense[(i, j)] * scale;
        (v.abs() > DROP_TOL).then_some((i, j, v))
    });
    csc_from_triplets(n, n, triplets)
}

/// Convert CSC to dense matrix.
#[cfg(test)]
pub fn csc_to_dense(sparse: &CscMatrix<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(sparse.nrows(), sparse.ncols());
    for (row, col, val) in sparse.triplet_iter() {
        dense[(row, col)] = *val;
    }
    dense
}
