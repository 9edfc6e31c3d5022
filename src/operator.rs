//! Compact operator assembly and factorization.
//!
//! The operator is the symmetric mass + regularization matrix of the basis
//! over the quadrature mish: for every pair of kernels whose supports share
//! a cell, the mass term accumulates products of kernel values and the
//! regularization term products of the third-derivative step rule, weighted
//! by `((l_q * dx) / (2*pi))^6`. The matrix is folded through the boundary
//! algebra, converted to sparse form, and Cholesky-factored exactly once per
//! axis configuration; the factor is then shared read-only across every
//! transform cycle (and across tiles, via [`OperatorCache`]).

use std::collections::HashMap;
use std::sync::Arc;

use ndarray::{Array1, Array2};

use crate::basis::{self, Derivative};
use crate::folding::BoundaryFolding;
use crate::linalg::{self, LinalgError, SparseSpdFactor};
use crate::quadrature::{CELL_WEIGHTS, cell_offsets};
use crate::types::{AxisError, AxisParameters, BoundaryCondition};

/// Number of kernels overlapping any one cell.
const SUPPORT: usize = 4;

pub struct CompactOperator {
    params: AxisParameters,
    folding: BoundaryFolding,
    open: Array2<f64>,
    factor: SparseSpdFactor,
}

impl CompactOperator {
    /// Assemble, fold, and factorize the operator for one axis
    /// configuration. Factorization failure means the boundary-condition and
    /// cell-count combination is inconsistent; the axis cannot be built.
    pub fn build(params: &AxisParameters) -> Result<Self, AxisError> {
        let folding = BoundaryFolding::build(params)?;
        let open = assemble_open(params);
        let folded = fold_congruence(&folding, &open);
        let factor = linalg::factorize_spd(&folded).map_err(|err| match err {
            LinalgError::Factorization => AxisError::SingularOperator {
                interior_dim: folding.interior_dim(),
                rank_left: folding.rank_left(),
                rank_right: folding.rank_right(),
            },
            LinalgError::Construction(msg) => AxisError::Configuration(msg),
        })?;
        log::debug!(
            "compact operator: {} cells, open {}x{}, interior {}, log|C| = {:.6e}",
            params.num_cells,
            open.nrows(),
            open.ncols(),
            folding.interior_dim(),
            factor.log_det(),
        );
        Ok(Self {
            params: *params,
            folding,
            open,
            factor,
        })
    }

    pub fn params(&self) -> &AxisParameters {
        &self.params
    }

    pub fn folding(&self) -> &BoundaryFolding {
        &self.folding
    }

    /// Unfolded mass + regularization matrix. Diagnostics and the
    /// background-solve path read it; the plain solve never does.
    pub fn open_matrix(&self) -> &Array2<f64> {
        &self.open
    }

    /// Log-determinant of the folded operator.
    pub fn log_det(&self) -> f64 {
        self.factor.log_det()
    }

    /// Solve stage over raw coefficients: fold, back-substitute through the
    /// Cholesky factor, prolong back to the open space. The result satisfies
    /// the configured boundary conditions by construction.
    pub fn solve(&self, raw: &Array1<f64>) -> Array1<f64> {
        let interior = self.factor.solve_vec(&self.folding.restrict(raw));
        self.folding.prolong(&interior)
    }

    /// Solve for the correction relative to a known background coefficient
    /// vector: the residual `raw - C_open * background` is folded and
    /// solved, and the background is added back onto the prolonged result.
    pub fn solve_with_background(
        &self,
        raw: &Array1<f64>,
        background: &Array1<f64>,
    ) -> Array1<f64> {
        let residual = raw - &self.open.dot(background);
        let interior = self.factor.solve_vec(&self.folding.restrict(&residual));
        self.folding.prolong(&interior) + background
    }
}

fn assemble_open(params: &AxisParameters) -> Array2<f64> {
    let open_dim = params.open_dim();
    let dx = params.dx();
    let eps_q = ((params.l_q * dx) / std::f64::consts::TAU).powi(6);
    let offsets = cell_offsets();
    let mut matrix = Array2::<f64>::zeros((open_dim, open_dim));
    let mut value = [0.0; SUPPORT];
    let mut third = [0.0; SUPPORT];
    for cell in 0..params.num_cells {
        let mid = params.xmin + (cell as f64 + 0.5) * dx;
        for (off, w) in offsets.iter().zip(CELL_WEIGHTS) {
            let x = mid + off * dx;
            let weight = dx * w;
            for (local, (v, t)) in value.iter_mut().zip(third.iter_mut()).enumerate() {
                let node = cell as i64 - 1 + local as i64;
                *v = basis::eval_unchecked(params, node, x, Derivative::Value);
                *t = basis::eval_unchecked(params, node, x, Derivative::Third);
            }
            for jl in 0..SUPPORT {
                for jr in 0..SUPPORT {
                    matrix[[cell + jl, cell + jr]] +=
                        weight * (value[jl] * value[jr] + eps_q * third[jl] * third[jr]);
                }
            }
        }
    }
    matrix
}

fn fold_congruence(folding: &BoundaryFolding, open: &Array2<f64>) -> Array2<f64> {
    let f = folding.matrix();
    f.dot(open).dot(&f.t())
}

/// Memoizes factored operators per distinct parameter value, so tiles with
/// identical axis configuration share one factorization instead of
/// repeating the expensive assembly and Cholesky work.
#[derive(Default)]
pub struct OperatorCache {
    built: HashMap<OperatorKey, Arc<CompactOperator>>,
}

impl OperatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(
        &mut self,
        params: &AxisParameters,
    ) -> Result<Arc<CompactOperator>, AxisError> {
        let key = OperatorKey::from_params(params);
        if let Some(operator) = self.built.get(&key) {
            return Ok(operator.clone());
        }
        let operator = Arc::new(CompactOperator::build(params)?);
        self.built.insert(key, operator.clone());
        Ok(operator)
    }

    pub fn len(&self) -> usize {
        self.built.len()
    }

    pub fn is_empty(&self) -> bool {
        self.built.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct OperatorKey {
    xmin: u64,
    xmax: u64,
    l_q: u64,
    num_cells: usize,
    bc_left: BcKey,
    bc_right: BcKey,
}

impl OperatorKey {
    fn from_params(params: &AxisParameters) -> Self {
        Self {
            xmin: params.xmin.to_bits(),
            xmax: params.xmax.to_bits(),
            l_q: params.l_q.to_bits(),
            num_cells: params.num_cells,
            bc_left: BcKey::from_condition(params.bc_left),
            bc_right: BcKey::from_condition(params.bc_right),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum BcKey {
    Natural,
    Robin1 { alpha: u64, beta: u64 },
    Robin2 { alpha: u64, beta: u64 },
    Clamped,
    Periodic,
}

impl BcKey {
    fn from_condition(bc: BoundaryCondition) -> Self {
        match bc {
            BoundaryCondition::Natural => BcKey::Natural,
            BoundaryCondition::Robin1 { alpha, beta } => BcKey::Robin1 {
                alpha: alpha.to_bits(),
                beta: beta.to_bits(),
            },
            BoundaryCondition::Robin2 { alpha, beta } => BcKey::Robin2 {
                alpha: alpha.to_bits(),
                beta: beta.to_bits(),
            },
            BoundaryCondition::Clamped => BcKey::Clamped,
            BoundaryCondition::Periodic => BcKey::Periodic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn params(num_cells: usize, l_q: f64) -> AxisParameters {
        AxisParameters {
            xmin: 0.0,
            xmax: num_cells as f64,
            num_cells,
            l_q,
            bc_left: BoundaryCondition::Natural,
            bc_right: BoundaryCondition::Natural,
        }
    }

    #[test]
    fn open_matrix_is_symmetric_and_banded() {
        let p = params(7, 1.3);
        let open = assemble_open(&p);
        let dim = open.nrows();
        for i in 0..dim {
            for j in 0..dim {
                assert_abs_diff_eq!(open[[i, j]], open[[j, i]], epsilon = 1e-14);
                if i.abs_diff(j) > 3 {
                    assert_eq!(open[[i, j]], 0.0, "entry ({i}, {j}) is outside the band");
                }
            }
        }
    }

    #[test]
    fn mass_row_sums_match_the_projected_constant() {
        // With a constant unit field, the forward integral of kernel j equals
        // the j-th row sum of the operator: the kernels sum to one pointwise
        // and the regularization steps cancel pointwise.
        let p = params(5, 2.0);
        let open = assemble_open(&p);
        let dx = p.dx();
        let offsets = cell_offsets();
        for j in 0..p.open_dim() {
            let mut projected = 0.0;
            for cell in 0..p.num_cells {
                let mid = p.xmin + (cell as f64 + 0.5) * dx;
                for (off, w) in offsets.iter().zip(CELL_WEIGHTS) {
                    let x = mid + off * dx;
                    projected += dx
                        * w
                        * basis::eval_unchecked(&p, j as i64 - 1, x, Derivative::Value);
                }
            }
            let row_sum: f64 = open.row(j).sum();
            assert_relative_eq!(row_sum, projected, epsilon = 1e-12);
        }
    }

    #[test]
    fn solve_reproduces_a_known_coefficient_vector() {
        let p = params(6, 1.0);
        let operator = CompactOperator::build(&p).expect("operator should build");
        let truth = Array1::from_shape_fn(p.open_dim(), |i| 0.3 + 0.1 * i as f64);
        let raw = operator.open_matrix().dot(&truth);
        let solved = operator.solve(&raw);
        for i in 0..truth.len() {
            assert_relative_eq!(solved[i], truth[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn background_solve_reduces_to_the_plain_solve() {
        let p = params(5, 0.7);
        let operator = CompactOperator::build(&p).expect("operator should build");
        let raw = Array1::from_shape_fn(p.open_dim(), |i| (i as f64 * 0.77).sin());
        let plain = operator.solve(&raw);
        let with_background = operator.solve_with_background(&raw, &plain);
        for i in 0..plain.len() {
            assert_relative_eq!(with_background[i], plain[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn cache_shares_one_factorization_per_configuration() {
        let mut cache = OperatorCache::new();
        let p = params(4, 1.0);
        let first = cache.get_or_build(&p).expect("operator should build");
        let second = cache.get_or_build(&p).expect("operator should build");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let other = cache
            .get_or_build(&params(4, 2.0))
            .expect("operator should build");
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(cache.len(), 2);
    }
}
