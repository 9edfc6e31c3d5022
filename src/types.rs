use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A comprehensive error type for axis construction and the transform
/// pipeline. None of these conditions are transient: `Configuration` and
/// `SingularOperator` mean the axis parameters must be fixed before retrying,
/// `OutOfDomain` and `DimensionMismatch` mean the call site must be fixed.
#[derive(Error, Debug)]
pub enum AxisError {
    #[error("invalid axis configuration: {0}")]
    Configuration(String),

    #[error(
        "folded compact operator ({interior_dim}x{interior_dim}, left rank {rank_left}, right rank {rank_right}) is not positive definite"
    )]
    SingularOperator {
        interior_dim: usize,
        rank_left: usize,
        rank_right: usize,
    },

    #[error("evaluation point {point} lies outside the axis domain [{xmin}, {xmax}]")]
    OutOfDomain { point: f64, xmin: f64, xmax: f64 },

    #[error("dimension mismatch: expected {expected} values for {what}, got {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Boundary condition for one end of an axis, expressed on the expansion
/// coefficients. Each tag removes a fixed number of degrees of freedom
/// (its rank) from the open coefficient space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum BoundaryCondition {
    /// Free end: no constraint on the edge coefficients. Rank 0.
    Natural,
    /// One linear relation between the two outermost coefficients,
    /// `alpha * a[edge] + beta * a[edge +/- 1] = 0`. Rank 1.
    Robin1 { alpha: f64, beta: f64 },
    /// The Robin relation applied to the two outermost coefficient pairs,
    /// chaining one coefficient further inward. Rank 2.
    Robin2 { alpha: f64, beta: f64 },
    /// The three edge coefficients are pinned to zero. Rank 3.
    Clamped,
    /// Wrap-around identification with the opposite end. Must be used on
    /// both ends; carries rank 1 on the left and rank 2 on the right.
    Periodic,
}

impl BoundaryCondition {
    /// Degrees of freedom removed when this condition sits on the left end.
    pub fn rank_left(self) -> usize {
        match self {
            BoundaryCondition::Natural => 0,
            BoundaryCondition::Robin1 { .. } => 1,
            BoundaryCondition::Robin2 { .. } => 2,
            BoundaryCondition::Clamped => 3,
            BoundaryCondition::Periodic => 1,
        }
    }

    /// Degrees of freedom removed when this condition sits on the right end.
    /// Periodicity is encoded once via wrap-around rows, so the right side
    /// carries the remaining rank 2.
    pub fn rank_right(self) -> usize {
        match self {
            BoundaryCondition::Periodic => 2,
            other => other.rank_left(),
        }
    }

    fn validate(self, side: &str) -> Result<(), AxisError> {
        match self {
            BoundaryCondition::Robin1 { alpha, beta }
            | BoundaryCondition::Robin2 { alpha, beta } => {
                if !alpha.is_finite() || !beta.is_finite() {
                    return Err(AxisError::Configuration(format!(
                        "{side} Robin coefficients must be finite, got alpha={alpha}, beta={beta}"
                    )));
                }
                if alpha == 0.0 {
                    return Err(AxisError::Configuration(format!(
                        "{side} Robin condition has alpha = 0; the edge relation cannot be folded"
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Immutable description of one axis: domain bounds, cell count,
/// regularization length scale, and the boundary conditions on either end.
///
/// Validation happens when the axis (or its operator) is built, not at
/// construction or deserialization time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisParameters {
    pub xmin: f64,
    pub xmax: f64,
    pub num_cells: usize,
    /// Regularization length scale entering the smoothing weight
    /// `((l_q * dx) / (2*pi))^6`.
    pub l_q: f64,
    pub bc_left: BoundaryCondition,
    pub bc_right: BoundaryCondition,
}

impl AxisParameters {
    /// Cell width.
    #[inline]
    pub fn dx(&self) -> f64 {
        (self.xmax - self.xmin) / self.num_cells as f64
    }

    /// Reciprocal cell width.
    #[inline]
    pub fn rdx(&self) -> f64 {
        self.num_cells as f64 / (self.xmax - self.xmin)
    }

    /// Dimension of the open (unconstrained) coefficient space.
    #[inline]
    pub fn open_dim(&self) -> usize {
        self.num_cells + 3
    }

    /// Number of quadrature mish points on this axis.
    #[inline]
    pub fn mish_len(&self) -> usize {
        self.num_cells * crate::quadrature::POINTS_PER_CELL
    }

    pub fn validate(&self) -> Result<(), AxisError> {
        if self.num_cells < 1 {
            return Err(AxisError::Configuration(
                "axis needs at least one cell".to_string(),
            ));
        }
        if !self.xmin.is_finite() || !self.xmax.is_finite() {
            return Err(AxisError::Configuration(format!(
                "domain bounds must be finite, got [{}, {}]",
                self.xmin, self.xmax
            )));
        }
        if self.xmax <= self.xmin {
            return Err(AxisError::Configuration(format!(
                "domain is empty or reversed: xmin={} must be below xmax={}",
                self.xmin, self.xmax
            )));
        }
        if !self.l_q.is_finite() || self.l_q < 0.0 {
            return Err(AxisError::Configuration(format!(
                "regularization length scale must be finite and non-negative, got {}",
                self.l_q
            )));
        }
        self.bc_left.validate("left")?;
        self.bc_right.validate("right")?;
        let left_periodic = matches!(self.bc_left, BoundaryCondition::Periodic);
        let right_periodic = matches!(self.bc_right, BoundaryCondition::Periodic);
        if left_periodic != right_periodic {
            return Err(AxisError::Configuration(
                "periodic boundary conditions must be applied to both ends".to_string(),
            ));
        }
        Ok(())
    }
}
