//! Reporting utilities: benchmark summaries and formatted terminal output.

pub mod benchmark;
pub mod format;

pub use benchmark::*;
pub use format::*;
