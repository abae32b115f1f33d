//! Report writers.
//!
//! - `stopping_criteria.out`: tab-separated, one row per scenario, `NA` when
//!   the stopping criterion was not reached
//! - JSON exports of any summary, stamped with the generation time

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::Local;
use serde::Serialize;

use crate::domain::ScenarioReport;
use crate::error::AppError;

pub const STOPPING_REPORT_FILE: &str = "stopping_criteria.out";

const STOPPING_HEADER: [&str; 7] = [
    "model",
    "period",
    "IKrBlock",
    "initial_conditions_period",
    "initial_conditions_IKrBlock",
    "terminal_pace",
    "APD90_error_at_terminal_pace",
];

const NOT_AVAILABLE: &str = "NA";

/// Write the stopping report to any writer.
pub fn write_stopping_report<'a, W, I>(writer: W, rows: I) -> Result<(), AppError>
where
    W: Write,
    I: IntoIterator<Item = &'a ScenarioReport>,
{
    let err = |e: csv::Error| AppError::new(2, format!("Failed to write stopping report: {e}"));
    let mut out = csv::WriterBuilder::new().delimiter(b'\t').from_writer(writer);

    out.write_record(STOPPING_HEADER).map_err(err)?;
    for row in rows {
        let id = &row.scenario;
        let pace = row
            .decision
            .point()
            .and(row.terminal_pace)
            .map(|p| p.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let apd = row
            .decision
            .point()
            .and_then(|p| p.apd_error)
            .map(|e| e.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        out.write_record([
            id.model.clone(),
            id.period.to_string(),
            id.ikr_block.to_string(),
            id.ic_period.to_string(),
            id.ic_block.to_string(),
            pace,
            apd,
        ])
        .map_err(err)?;
    }
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to write stopping report: {e}")))?;
    Ok(())
}

pub fn write_stopping_report_file<'a, I>(path: &Path, rows: I) -> Result<(), AppError>
where
    I: IntoIterator<Item = &'a ScenarioReport>,
{
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create report '{}': {e}", path.display())))?;
    write_stopping_report(file, rows)
}

#[derive(Debug, Serialize)]
struct JsonExport<'a, T: Serialize> {
    tool: &'static str,
    version: &'static str,
    generated_at: String,
    kind: &'a str,
    data: &'a T,
}

/// Write `data` as pretty JSON wrapped with tool metadata.
pub fn write_json_export<T: Serialize>(path: &Path, kind: &str, data: &T) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create JSON export '{}': {e}", path.display())))?;
    let export = JsonExport {
        tool: "pex",
        version: env!("CARGO_PKG_VERSION"),
        generated_at: Local::now().to_rfc3339(),
        kind,
        data,
    };
    serde_json::to_writer_pretty(file, &export)
        .map_err(|e| AppError::new(2, format!("Failed to write JSON export: {e}")))?;
    Ok(())
}
