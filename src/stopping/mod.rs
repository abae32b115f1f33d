//! Stopping-criterion estimation for pace-to-pace error series.
//!
//! The error between successive paces decays roughly log-linearly and then
//! settles onto a noise floor set by the solver tolerance. We work on
//! `log10(error)` and look for the first pace where:
//!
//! - the error is below an absolute floor
//! - the rolling average no longer correlates with the pace index, now or
//!   over the following paces
//! - the rolling average shows no systematic drift between paces
//! - the block minima (noise floor estimate) have stopped falling

pub mod criterion;
pub mod rolling;

pub use criterion::*;
