pub mod axis;
pub mod basis;
pub mod folding;
mod linalg;
pub mod operator;
pub mod quadrature;
pub mod types;

pub use axis::Axis;
pub use basis::Derivative;
pub use folding::BoundaryFolding;
pub use operator::{CompactOperator, OperatorCache};
pub use quadrature::mish_points;
pub use types::{AxisError, AxisParameters, BoundaryCondition};
