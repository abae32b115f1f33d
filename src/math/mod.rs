//! Mathematical utilities: least squares, descriptive statistics, error norms.

pub mod norms;
pub mod ols;
pub mod stats;

pub use norms::*;
pub use ols::*;
pub use stats::*;
