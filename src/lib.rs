//! `pace-extrap` library crate.
//!
//! The binary (`pex`) is a thin wrapper around this library so that:
//!
//! - the estimators are testable without spawning processes
//! - simulation drivers can call the extrapolator and the stopping estimate directly
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod extrapolate;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod stopping;
pub mod tui;
