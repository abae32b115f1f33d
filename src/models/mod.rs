//! Single-exponential relaxation model.
//!
//! The model is implemented as small, pure functions so that the extrapolator
//! and the fitter can share one definition of the curve.

pub mod relaxation;

pub use relaxation::*;
