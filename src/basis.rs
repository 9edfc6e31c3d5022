//! Compact cubic kernel evaluation.
//!
//! The expansion basis is the uniform cubic B-spline centered on the axis
//! nodes `xmin + m*dx` for `m` in `[-1, num_cells+1]`, with compact support
//! of two cell widths on either side of the node. The third derivative is a
//! piecewise-constant step rule (`+3` on the inner cells, `-1` on the outer
//! cells, sign keyed on which side of the node the point falls); it exists
//! only to feed the regularization integral and must stay exactly this rule.

use crate::types::{AxisError, AxisParameters};

/// Derivative order selector for kernel evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Derivative {
    Value,
    First,
    Second,
    Third,
}

impl Derivative {
    /// Maps an integer order onto the selector. Orders above three have no
    /// meaning for a cubic kernel.
    pub fn from_order(order: usize) -> Option<Self> {
        match order {
            0 => Some(Derivative::Value),
            1 => Some(Derivative::First),
            2 => Some(Derivative::Second),
            3 => Some(Derivative::Third),
            _ => None,
        }
    }
}

/// Lowest node index carrying a basis function.
pub const NODE_MIN: i64 = -1;

/// Highest node index carrying a basis function.
#[inline]
pub fn node_max(params: &AxisParameters) -> i64 {
    params.num_cells as i64 + 1
}

/// Center of node `m` in physical coordinates.
#[inline]
pub fn node_center(params: &AxisParameters, node: i64) -> f64 {
    params.xmin + node as f64 * params.dx()
}

/// Evaluate the kernel of `node` at `x`. Fails when `x` lies outside the
/// axis domain; points beyond the kernel support evaluate to zero.
pub fn eval(
    params: &AxisParameters,
    node: i64,
    x: f64,
    deriv: Derivative,
) -> Result<f64, AxisError> {
    if x < params.xmin || x > params.xmax {
        return Err(AxisError::OutOfDomain {
            point: x,
            xmin: params.xmin,
            xmax: params.xmax,
        });
    }
    Ok(eval_unchecked(params, node, x, deriv))
}

/// Kernel evaluation without the domain test. Operator assembly and the
/// forward transform call this on mish points, which lie inside the domain
/// by construction.
#[inline]
pub fn eval_unchecked(params: &AxisParameters, node: i64, x: f64, deriv: Derivative) -> f64 {
    let dx = params.dx();
    let delta = (x - node_center(params, node)) * params.rdx();
    let z = delta.abs();
    if z >= 2.0 {
        return 0.0;
    }
    let sign = if delta < 0.0 { -1.0 } else { 1.0 };
    match deriv {
        Derivative::Value => {
            if z < 1.0 {
                2.0 / 3.0 - z * z + 0.5 * z * z * z
            } else {
                let t = 2.0 - z;
                t * t * t / 6.0
            }
        }
        Derivative::First => {
            let dz = if z < 1.0 {
                z * (1.5 * z - 2.0)
            } else {
                let t = 2.0 - z;
                -0.5 * t * t
            };
            sign * dz / dx
        }
        Derivative::Second => {
            let dzz = if z < 1.0 { 3.0 * z - 2.0 } else { 2.0 - z };
            dzz / (dx * dx)
        }
        Derivative::Third => {
            let step = if z < 1.0 { 3.0 } else { -1.0 };
            sign * step / (dx * dx * dx)
        }
    }
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
    fn support_is_compact() {
        let p = params(8, 0.0, 8.0);
        // Node 3 is centered at x = 3 with support (1, 5).
        for x in [1.0, 5.0, 0.25, 7.5] {
            let value = eval(&p, 3, x, Derivative::Value).expect("in-domain point");
            assert_eq!(value, 0.0, "kernel should vanish at x = {x}");
        }
        assert!(eval(&p, 3, 1.5, Derivative::Value).expect("in-domain point") > 0.0);
        assert!(eval(&p, 3, 4.75, Derivative::Value).expect("in-domain point") > 0.0);
    }

    #[test]
    fn node_values_match_the_cubic_spline() {
        let p = params(8, 0.0, 8.0);
        let center = eval(&p, 4, 4.0, Derivative::Value).expect("in-domain point");
        let neighbor = eval(&p, 4, 5.0, Derivative::Value).expect("in-domain point");
        assert_relative_eq!(center, 2.0 / 3.0, epsilon = 1e-15);
        assert_relative_eq!(neighbor, 1.0 / 6.0, epsilon = 1e-15);
    }

    #[test]
    fn partition_of_unity_inside_the_domain() {
        let p = params(5, -1.0, 3.0);
        for x in [-1.0, -0.73, 0.0, 0.4142, 1.8, 2.99, 3.0] {
            let mut sum = 0.0;
            for node in NODE_MIN..=node_max(&p) {
                sum += eval(&p, node, x, Derivative::Value).expect("in-domain point");
            }
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-13);
        }
    }

    #[test]
    fn value_and_low_derivatives_are_continuous_at_the_knot() {
        let p = params(4, 0.0, 4.0);
        let h = 1e-9;
        // Knot of node 2 at x = 3 (z = 1 from the right side of the node).
        for deriv in [Derivative::Value, Derivative::First, Derivative::Second] {
            let below = eval(&p, 2, 3.0 - h, deriv).expect("in-domain point");
            let above = eval(&p, 2, 3.0 + h, deriv).expect("in-domain point");
            assert_abs_diff_eq!(below, above, epsilon = 1e-6);
        }
    }

    #[test]
    fn first_derivative_is_odd_about_the_node() {
        let p = params(4, 0.0, 4.0);
        for offset in [0.3, 0.8, 1.4, 1.9] {
            let right = eval(&p, 2, 2.0 + offset, Derivative::First).expect("in-domain point");
            let left = eval(&p, 2, 2.0 - offset, Derivative::First).expect("in-domain point");
            assert_abs_diff_eq!(right, -left, epsilon = 1e-13);
        }
    }

    #[test]
    fn third_derivative_follows_the_step_rule() {
        let p = params(4, 0.0, 2.0);
        let dx3 = p.dx().powi(3);
        // Node 2 centered at x = 1.
        let inner_right = eval(&p, 2, 1.2, Derivative::Third).expect("in-domain point");
        let outer_right = eval(&p, 2, 1.8, Derivative::Third).expect("in-domain point");
        let inner_left = eval(&p, 2, 0.8, Derivative::Third).expect("in-domain point");
        let outer_left = eval(&p, 2, 0.2, Derivative::Third).expect("in-domain point");
        assert_relative_eq!(inner_right, 3.0 / dx3, epsilon = 1e-12);
        assert_relative_eq!(outer_right, -1.0 / dx3, epsilon = 1e-12);
        assert_relative_eq!(inner_left, -3.0 / dx3, epsilon = 1e-12);
        assert_relative_eq!(outer_left, 1.0 / dx3, epsilon = 1e-12);
    }

    #[test]
    fn out_of_domain_points_are_rejected() {
        let p = params(4, 0.0, 4.0);
        let err = eval(&p, 0, 4.5, Derivative::Value).unwrap_err();
        assert!(matches!(err, AxisError::OutOfDomain { .. }));
        let err = eval(&p, 0, -0.001, Derivative::First).unwrap_err();
        assert!(matches!(err, AxisError::OutOfDomain { .. }));
    }

    #[test]
    fn derivative_orders_map_onto_selectors() {
        assert_eq!(Derivative::from_order(0), Some(Derivative::Value));
        assert_eq!(Derivative::from_order(3), Some(Derivative::Third));
        assert_eq!(Derivative::from_order(4), None);
    }
}
