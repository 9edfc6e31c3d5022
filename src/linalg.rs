//! ndarray/faer bridging and the sparse SPD factorization backing the
//! compact operator.

use faer::MatRef;
use faer::Side;
use faer::diag::DiagRef;
use faer::linalg::solvers::{Llt as DenseLlt, Solve};
use faer::sparse::linalg::solvers::Llt as SparseLlt;
use faer::sparse::{SparseColMat, Triplet};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use std::marker::PhantomData;
use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum LinalgError {
    #[error("Cholesky factorization failed; matrix is not positive definite")]
    Factorization,
    #[error("sparse matrix construction failed: {0}")]
    Construction(String),
}

/// Borrowed faer view over a dense ndarray matrix.
///
/// Falls back to an owned compact copy when the source layout carries
/// non-positive strides, which the faer kernels do not accept.
pub(crate) struct FaerArrayView<'a> {
    ptr: *const f64,
    rows: usize,
    cols: usize,
    row_stride: isize,
    col_stride: isize,
    owned: Option<Array2<f64>>,
    _marker: PhantomData<&'a f64>,
}

impl<'a> FaerArrayView<'a> {
    pub fn new<S: Data<Elem = f64>>(array: &'a ArrayBase<S, Ix2>) -> Self {
        let (rows, cols) = array.dim();
        let strides = array.strides();
        if strides[0] <= 0 || strides[1] <= 0 {
            let owned = array.to_owned();
            let owned_strides = owned.strides();
            return Self {
                ptr: owned.as_ptr(),
                rows,
                cols,
                row_stride: owned_strides[0],
                col_stride: owned_strides[1],
                owned: Some(owned),
                _marker: PhantomData,
            };
        }
        Self {
            ptr: array.as_ptr(),
            rows,
            cols,
            row_stride: strides[0],
            col_stride: strides[1],
            owned: None,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn as_ref(&self) -> MatRef<'_, f64> {
        let (ptr, rows, cols, row_stride, col_stride) = if let Some(owned) = &self.owned {
            let strides = owned.strides();
            (
                owned.as_ptr(),
                owned.nrows(),
                owned.ncols(),
                strides[0],
                strides[1],
            )
        } else {
            (
                self.ptr,
                self.rows,
                self.cols,
                self.row_stride,
                self.col_stride,
            )
        };
        // SAFETY: pointer, shape, and strides come either from a live ndarray
        // view with positive strides or from the owned compact copy stored in
        // this wrapper, so they stay valid for the returned view's lifetime.
        unsafe { MatRef::from_raw_parts(ptr, rows, cols, row_stride, col_stride) }
    }
}

fn diag_to_array(diag: DiagRef<'_, f64>) -> Array1<f64> {
    let col = diag.column_vector().as_mat();
    Array1::from_shape_fn(col.nrows(), |i| col[(i, 0)])
}

/// Convert a dense matrix to sparse CSC, dropping entries at or below `tol`
/// in magnitude.
pub(crate) fn dense_to_sparse(
    matrix: &Array2<f64>,
    tol: f64,
) -> Result<SparseColMat<usize, f64>, LinalgError> {
    let nrows = matrix.nrows();
    let ncols = matrix.ncols();
    let mut triplets = Vec::new();
    for row in 0..nrows {
        for col in 0..ncols {
            let value = matrix[[row, col]];
            if value.abs() > tol {
                triplets.push(Triplet::new(row, col, value));
            }
        }
    }
    SparseColMat::try_new_from_triplets(nrows, ncols, &triplets).map_err(|_| {
        LinalgError::Construction("failed to convert dense matrix to sparse CSC".to_string())
    })
}

/// Sparse Cholesky factor of a symmetric positive definite matrix, with the
/// log-determinant of the factored matrix kept for diagnostics. A fully
/// constrained system has an empty factor; its solve is the empty vector.
pub(crate) struct SparseSpdFactor {
    factor: Option<SparseLlt<usize, f64>>,
    dim: usize,
    log_det: f64,
}

impl SparseSpdFactor {
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn log_det(&self) -> f64 {
        self.log_det
    }

    /// Solve the factored system for a single right-hand side.
    pub fn solve_vec(&self, rhs: &Array1<f64>) -> Array1<f64> {
        let Some(factor) = &self.factor else {
            return Array1::zeros(0);
        };
        let rhs_mat = Array2::from_shape_fn((self.dim, 1), |(i, _)| rhs[i]);
        let rhs_view = FaerArrayView::new(&rhs_mat);
        let solved = factor.solve(rhs_view.as_ref());
        Array1::from_shape_fn(self.dim, |i| solved[(i, 0)])
    }
}

/// Factorize a symmetric positive definite matrix in sparse form. The dense
/// Cholesky pass supplies the log-determinant.
pub(crate) fn factorize_spd(matrix: &Array2<f64>) -> Result<SparseSpdFactor, LinalgError> {
    let dim = matrix.ncols();
    if dim == 0 {
        return Ok(SparseSpdFactor {
            factor: None,
            dim,
            log_det: 0.0,
        });
    }
    let sparse = dense_to_sparse(matrix, 0.0)?;
    let factor = sparse
        .as_ref()
        .sp_cholesky(Side::Upper)
        .map_err(|_| LinalgError::Factorization)?;
    let view = FaerArrayView::new(matrix);
    let dense =
        DenseLlt::new(view.as_ref(), Side::Lower).map_err(|_| LinalgError::Factorization)?;
    let log_det = 2.0 * diag_to_array(dense.L().diagonal()).mapv(f64::ln).sum();
    Ok(SparseSpdFactor {
        factor: Some(factor),
        dim,
        log_det,
    })
}
