//! Domain types used throughout the estimators.
//!
//! This module defines:
//!
//! - per-pace series (`Trace`, `ErrorSeries`, `ErrorMeasure`)
//! - extrapolation inputs/outputs (`FitParameters`, `JumpParameters`, `ExtrapolationResult`)
//! - stopping inputs/outputs (`StoppingConfig`, `StoppingDecision`)
//! - scenario identification (`ScenarioId`)

pub mod types;

pub use types::*;
