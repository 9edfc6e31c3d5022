//! Per-cell Gauss quadrature and the mish-point grid.
//!
//! Every cell carries the same 3-point Gauss-Legendre rule, expressed in
//! cell-normalized coordinates: offsets about the cell midpoint in units of
//! the cell width, with weights that sum to one over the unit cell. The
//! physical weight of point `q` in any cell is therefore `dx * WEIGHTS[q]`.
//!
//! The abscissae double as the canonical physical sampling grid (the "mish
//! points"): the same locations are used for operator assembly, for the
//! forward transform's integration, and as the default output grid.
//! A 3-point rule integrates polynomials through degree five exactly, which
//! keeps the per-cell-constant third-derivative products of the
//! regularization term exact as well.

use crate::types::AxisParameters;

/// Number of quadrature points per cell.
pub const POINTS_PER_CELL: usize = 3;

/// Quadrature weights over the unit cell; they sum to one.
pub const CELL_WEIGHTS: [f64; POINTS_PER_CELL] = [5.0 / 18.0, 8.0 / 18.0, 5.0 / 18.0];

/// Quadrature offsets about the cell midpoint, in cell widths.
#[inline]
pub fn cell_offsets() -> [f64; POINTS_PER_CELL] {
    let h = 0.5 * (3.0f64 / 5.0).sqrt();
    [-h, 0.0, h]
}

/// Ascending mish abscissae, three per cell.
pub fn mish_points(params: &AxisParameters) -> Vec<f64> {
    let dx = params.dx();
    let offsets = cell_offsets();
    let mut points = Vec::with_capacity(params.mish_len());
    for cell in 0..params.num_cells {
        let mid = params.xmin + (cell as f64 + 0.5) * dx;
        for off in offsets {
            points.push(mid + off * dx);
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundaryCondition;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn params(num_cells: usize, xmin: f64, xmax: f64) -> AxisParameters {
        AxisParameters {
            xmin,
            xmax,
            num_cells,
            l_q: 1.0,
            bc_left: BoundaryCondition::Natural,
            bc_right: BoundaryCondition::Natural,
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let total: f64 = CELL_WEIGHTS.iter().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-15);
    }

    #[test]
    fn points_are_ascending_and_inside_the_domain() {
        let p = params(7, -2.0, 1.5);
        let mish = mish_points(&p);
        assert_eq!(mish.len(), p.mish_len());
        for pair in mish.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert!(mish[0] > p.xmin && mish[mish.len() - 1] < p.xmax);
    }

    #[test]
    fn rule_integrates_quintics_exactly_over_a_cell() {
        let p = params(3, 0.0, 3.0);
        let offsets = cell_offsets();
        // Integrate x^k over the middle cell [1, 2] and compare to the
        // analytic value (2^(k+1) - 1) / (k + 1).
        for k in 0..=5u32 {
            let mut quad = 0.0;
            for (off, w) in offsets.iter().zip(CELL_WEIGHTS) {
                let x: f64 = 1.5 + off * p.dx();
                quad += p.dx() * w * x.powi(k as i32);
            }
            let exact = (2.0f64.powi(k as i32 + 1) - 1.0) / f64::from(k + 1);
            assert_relative_eq!(quad, exact, epsilon = 1e-13);
        }
    }

    #[test]
    fn mish_grid_is_symmetric_within_each_cell() {
        let p = params(4, 0.0, 4.0);
        let mish = mish_points(&p);
        for cell in 0..p.num_cells {
            let mid = p.xmin + (cell as f64 + 0.5) * p.dx();
            let triple = &mish[cell * POINTS_PER_CELL..(cell + 1) * POINTS_PER_CELL];
            assert_abs_diff_eq!(triple[1], mid, epsilon = 1e-15);
            assert_abs_diff_eq!(mid - triple[0], triple[2] - mid, epsilon = 1e-15);
        }
    }
}
