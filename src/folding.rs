//! Boundary-condition folding.
//!
//! The open coefficient space has dimension `num_cells + 3`; each boundary
//! tag removes its rank's worth of degrees of freedom at its end. The
//! folding matrix `F` maps open to interior coefficients as the restriction
//! `F * v` and back as the prolongation `F^T * v`. Every vector in the range
//! of the prolongation satisfies the configured boundary conditions
//! identically, which is what lets the solve stage guarantee them
//! independent of the input samples.
//!
//! Layout: an identity block at column offset `rank_left`, Robin entries in
//! the leading/trailing corner columns, and for periodic axes wrap-around
//! unit entries (one at the last interior row on the left, two near the
//! first rows on the right) that identify coefficients one period apart.

use ndarray::{Array1, Array2};

use crate::types::{AxisError, AxisParameters, BoundaryCondition};

#[derive(Clone, Debug)]
pub struct BoundaryFolding {
    matrix: Array2<f64>,
    rank_left: usize,
    rank_right: usize,
}

impl BoundaryFolding {
    pub fn build(params: &AxisParameters) -> Result<Self, AxisError> {
        params.validate()?;
        let open_dim = params.open_dim();
        let rank_left = params.bc_left.rank_left();
        let rank_right = params.bc_right.rank_right();
        if rank_left + rank_right > open_dim {
            return Err(AxisError::Configuration(format!(
                "boundary ranks {rank_left}+{rank_right} exceed the open coefficient dimension {open_dim}; the axis has too few cells for these conditions"
            )));
        }
        let interior_dim = open_dim - rank_left - rank_right;
        if matches!(params.bc_left, BoundaryCondition::Periodic) && interior_dim < 2 {
            return Err(AxisError::Configuration(
                "periodic axis needs at least two cells".to_string(),
            ));
        }

        let mut matrix = Array2::<f64>::zeros((interior_dim, open_dim));
        for i in 0..interior_dim {
            matrix[[i, rank_left + i]] = 1.0;
        }

        if interior_dim > 0 {
            match params.bc_left {
                BoundaryCondition::Natural | BoundaryCondition::Clamped => {}
                BoundaryCondition::Robin1 { alpha, beta } => {
                    matrix[[0, 0]] = -beta / alpha;
                }
                BoundaryCondition::Robin2 { alpha, beta } => {
                    let r = beta / alpha;
                    matrix[[0, 0]] = r * r;
                    matrix[[0, 1]] = -r;
                }
                BoundaryCondition::Periodic => {
                    matrix[[interior_dim - 1, 0]] = 1.0;
                }
            }
            match params.bc_right {
                BoundaryCondition::Natural | BoundaryCondition::Clamped => {}
                BoundaryCondition::Robin1 { alpha, beta } => {
                    matrix[[interior_dim - 1, open_dim - 1]] = -beta / alpha;
                }
                BoundaryCondition::Robin2 { alpha, beta } => {
                    let r = beta / alpha;
                    matrix[[interior_dim - 1, open_dim - 2]] = -r;
                    matrix[[interior_dim - 1, open_dim - 1]] = r * r;
                }
                BoundaryCondition::Periodic => {
                    matrix[[0, open_dim - 2]] = 1.0;
                    matrix[[1, open_dim - 1]] = 1.0;
                }
            }
        }

        Ok(Self {
            matrix,
            rank_left,
            rank_right,
        })
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn interior_dim(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn open_dim(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn rank_left(&self) -> usize {
        self.rank_left
    }

    pub fn rank_right(&self) -> usize {
        self.rank_right
    }

    /// Restriction `F * v`: open coefficients down to the interior space.
    pub fn restrict(&self, open: &Array1<f64>) -> Array1<f64> {
        self.matrix.dot(open)
    }

    /// Prolongation `F^T * v`: interior coefficients up to the open space.
    pub fn prolong(&self, interior: &Array1<f64>) -> Array1<f64> {
        self.matrix.t().dot(interior)
    }
}
