//! Input/output helpers.
//!
//! - whitespace `.dat` tables (`table`)
//! - per-scenario simulator output (`simulation`)
//! - benchmark result tables (`benchmark`)
//! - TSV / JSON reports (`report`)

pub mod benchmark;
pub mod report;
pub mod simulation;
pub mod table;

pub use benchmark::*;
pub use report::*;
pub use simulation::*;
pub use table::*;
