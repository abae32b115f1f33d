//! Buffer fitting.
//!
//! - estimate `(τ, α)` for a buffer of paces the way the simulator does
//! - gate fits that are too short, too flat, or already converged

pub mod exponential;

pub use exponential::*;
