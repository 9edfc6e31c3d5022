//! Stateful axis instance and the three-stage transform pipeline.
//!
//! An [`Axis`] bundles one axis configuration with its factored operator,
//! the quadrature mish grid, the physical-sample buffer, and the raw/solved
//! coefficient buffers. Construction is the only expensive step; after that
//! the axis cycles through sample → forward → solve → evaluate any number of
//! times. Tiles with identical parameters share the operator through an
//! `Arc` while keeping their own buffers.

use std::sync::Arc;

use ndarray::{Array1, ArrayView1};

use crate::basis::{self, Derivative};
use crate::operator::CompactOperator;
use crate::quadrature::{self, CELL_WEIGHTS, POINTS_PER_CELL};
use crate::types::{AxisError, AxisParameters};

pub struct Axis {
    params: AxisParameters,
    operator: Arc<CompactOperator>,
    mish: Vec<f64>,
    samples: Vec<f64>,
    raw: Array1<f64>,
    solved: Array1<f64>,
}

impl Axis {
    /// Build a fresh axis, constructing and factoring its own operator.
    pub fn new(params: AxisParameters) -> Result<Self, AxisError> {
        let operator = Arc::new(CompactOperator::build(&params)?);
        Ok(Self::with_operator(operator))
    }

    /// Build an axis over an already-factored operator. Each axis still owns
    /// its sample and coefficient buffers, so concurrent tiles need one
    /// `Axis` apiece even when they share the factorization.
    pub fn with_operator(operator: Arc<CompactOperator>) -> Self {
        let params = *operator.params();
        let mish = quadrature::mish_points(&params);
        let open_dim = params.open_dim();
        Self {
            samples: vec![0.0; mish.len()],
            raw: Array1::zeros(open_dim),
            solved: Array1::zeros(open_dim),
            params,
            operator,
            mish,
        }
    }

    pub fn params(&self) -> &AxisParameters {
        &self.params
    }

    pub fn operator(&self) -> &Arc<CompactOperator> {
        &self.operator
    }

    /// Canonical physical sampling grid, three points per cell.
    pub fn mish_points(&self) -> &[f64] {
        &self.mish
    }

    /// Physical samples at the mish points.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Mutable access to the sample buffer, e.g. for a caller filling halo
    /// values in place. The buffer must be fully populated before the next
    /// forward transform.
    pub fn samples_mut(&mut self) -> &mut [f64] {
        &mut self.samples
    }

    /// Raw open-space coefficients from the last forward transform.
    pub fn raw_coefficients(&self) -> &Array1<f64> {
        &self.raw
    }

    /// Solved coefficients from the last solve transform.
    pub fn coefficients(&self) -> &Array1<f64> {
        &self.solved
    }

    /// Replace the physical samples at the mish points.
    pub fn set_samples(&mut self, values: &[f64]) -> Result<(), AxisError> {
        if values.len() != self.samples.len() {
            return Err(AxisError::DimensionMismatch {
                what: "mish samples",
                expected: self.samples.len(),
                found: values.len(),
            });
        }
        self.samples.copy_from_slice(values);
        Ok(())
    }

    /// Forward transform: integrate the current samples against each basis
    /// function, in place into the raw coefficient buffer.
    pub fn forward_transform(&mut self) {
        self.raw = project_samples(&self.params, &self.mish, &self.samples);
    }

    /// Non-mutating forward transform of an arbitrary sample vector on the
    /// mish grid.
    pub fn project_samples(&self, values: &[f64]) -> Result<Array1<f64>, AxisError> {
        if values.len() != self.mish.len() {
            return Err(AxisError::DimensionMismatch {
                what: "mish samples",
                expected: self.mish.len(),
                found: values.len(),
            });
        }
        Ok(project_samples(&self.params, &self.mish, values))
    }

    /// Solve transform: fold the raw coefficients through the boundary
    /// algebra and the factored operator, in place into the solved buffer.
    pub fn solve_transform(&mut self) {
        self.solved = self.operator.solve(&self.raw);
    }

    /// Solve transform relative to a background coefficient vector: the
    /// solved buffer receives the background plus the folded correction.
    pub fn solve_transform_with_background(
        &mut self,
        background: &[f64],
    ) -> Result<(), AxisError> {
        let background = self.as_open_vector(background, "background coefficients")?;
        self.solved = self.operator.solve_with_background(&self.raw, &background);
        Ok(())
    }

    /// Non-mutating solve of an arbitrary raw coefficient vector.
    pub fn solve_coefficients(&self, raw: &[f64]) -> Result<Array1<f64>, AxisError> {
        let raw = self.as_open_vector(raw, "raw coefficients")?;
        Ok(self.operator.solve(&raw))
    }

    /// Non-mutating background solve of an arbitrary raw coefficient vector.
    pub fn solve_coefficients_with_background(
        &self,
        raw: &[f64],
        background: &[f64],
    ) -> Result<Array1<f64>, AxisError> {
        let raw = self.as_open_vector(raw, "raw coefficients")?;
        let background = self.as_open_vector(background, "background coefficients")?;
        Ok(self.operator.solve_with_background(&raw, &background))
    }

    /// Inverse transform: evaluate the solved expansion (or one of its first
    /// two derivatives) at arbitrary points inside the domain.
    pub fn evaluate(&self, points: &[f64], derivative: usize) -> Result<Vec<f64>, AxisError> {
        evaluate_expansion(&self.params, self.solved.view(), points, derivative)
    }

    /// Inverse transform of a caller-supplied open coefficient vector.
    pub fn evaluate_coefficients(
        &self,
        coefficients: &[f64],
        points: &[f64],
        derivative: usize,
    ) -> Result<Vec<f64>, AxisError> {
        if coefficients.len() != self.params.open_dim() {
            return Err(AxisError::DimensionMismatch {
                what: "open coefficients",
                expected: self.params.open_dim(),
                found: coefficients.len(),
            });
        }
        evaluate_expansion(
            &self.params,
            ArrayView1::from(coefficients),
            points,
            derivative,
        )
    }

    /// Inverse transform on the cached mish grid.
    pub fn evaluate_mish(&self, derivative: usize) -> Result<Vec<f64>, AxisError> {
        evaluate_expansion(&self.params, self.solved.view(), &self.mish, derivative)
    }

    /// Inverse transform into a caller-owned buffer. The buffer is written
    /// only after every point has been validated, so a failed call leaves it
    /// untouched.
    pub fn evaluate_into(
        &self,
        points: &[f64],
        derivative: usize,
        out: &mut [f64],
    ) -> Result<(), AxisError> {
        if out.len() != points.len() {
            return Err(AxisError::DimensionMismatch {
                what: "evaluation output",
                expected: points.len(),
                found: out.len(),
            });
        }
        let values = evaluate_expansion(&self.params, self.solved.view(), points, derivative)?;
        out.copy_from_slice(&values);
        Ok(())
    }

    fn as_open_vector(
        &self,
        values: &[f64],
        what: &'static str,
    ) -> Result<Array1<f64>, AxisError> {
        if values.len() != self.params.open_dim() {
            return Err(AxisError::DimensionMismatch {
                what,
                expected: self.params.open_dim(),
                found: values.len(),
            });
        }
        Ok(ArrayView1::from(values).to_owned())
    }
}

/// Forward quadrature projection: `b[j] = sum over supporting mish points of
/// dx * w * B_j(x) * u(x)`. No boundary folding is applied here.
fn project_samples(params: &AxisParameters, mish: &[f64], samples: &[f64]) -> Array1<f64> {
    let dx = params.dx();
    let mut raw = Array1::<f64>::zeros(params.open_dim());
    for cell in 0..params.num_cells {
        for (q, &w) in CELL_WEIGHTS.iter().enumerate() {
            let point = cell * POINTS_PER_CELL + q;
            let x = mish[point];
            let weighted = dx * w * samples[point];
            for local in 0..4 {
                let node = cell as i64 - 1 + local as i64;
                raw[cell + local] +=
                    weighted * basis::eval_unchecked(params, node, x, Derivative::Value);
            }
        }
    }
    raw
}

/// Windowed evaluation of an open coefficient vector at arbitrary points.
/// The support window is computed directly from the point, with no search,
/// and clipped to the valid node range.
fn evaluate_expansion(
    params: &AxisParameters,
    coefficients: ArrayView1<'_, f64>,
    points: &[f64],
    derivative: usize,
) -> Result<Vec<f64>, AxisError> {
    let deriv = Derivative::from_order(derivative)
        .filter(|d| *d != Derivative::Third)
        .ok_or_else(|| {
            AxisError::Configuration(format!(
                "unsupported derivative order {derivative} for field evaluation; orders 0-2 are available"
            ))
        })?;
    for &x in points {
        if x < params.xmin || x > params.xmax {
            return Err(AxisError::OutOfDomain {
                point: x,
                xmin: params.xmin,
                xmax: params.xmax,
            });
        }
    }

    let node_top = basis::node_max(params);
    let rdx = params.rdx();
    let two_dx = 2.0 * params.dx();
    let mut values = Vec::with_capacity(points.len());
    for &x in points {
        let start = ((x - params.xmin - two_dx) * rdx).ceil() as i64;
        let lo = start.max(basis::NODE_MIN);
        let hi = (start + 3).min(node_top);
        let mut acc = 0.0;
        for node in lo..=hi {
            acc += basis::eval_unchecked(params, node, x, deriv)
                * coefficients[(node + 1) as usize];
        }
        values.push(acc);
    }
    Ok(values)
}
