//! `<model>_results.dat` loader.

use std::path::Path;

use crate::domain::BenchmarkRow;
use crate::error::AppError;
use crate::io::table::Table;

pub fn results_file(model: &str) -> String {
    format!("{model}_results.dat")
}

pub fn load_benchmark_rows(path: &Path) -> Result<Vec<BenchmarkRow>, AppError> {
    rows_from_table(&Table::from_path(path)?)
}

pub fn rows_from_table(table: &Table) -> Result<Vec<BenchmarkRow>, AppError> {
    let model_name = table.column_str("model_name")?;
    let extrapolation_constant = table.column_f64("extrapolation_constant")?;
    let buffer_size = table.column_i64("buffer_size")?;
    let period = table.column_f64("period")?;
    let ikr_block = table.column_f64("IKrBlock")?;
    let score = table.column_f64("score")?;
    let jumps_used = table.column_f64("jumps_used")?;
    let apd90 = table.column_f64("APD90")?;
    let last_mrms = table.column_f64("last_mrms")?;
    let reference_mrms = table.column_f64("reference_mrms")?;
    let ic_period = table.column_f64("ic_period")?;
    let ic_block = table.column_f64("ic_block")?;

    Ok((0..table.len())
        .map(|i| BenchmarkRow {
            model_name: model_name[i].clone(),
            extrapolation_constant: extrapolation_constant[i],
            buffer_size: buffer_size[i],
            period: period[i],
            ikr_block: ikr_block[i],
            score: score[i],
            jumps_used: jumps_used[i],
            apd90: apd90[i],
            last_mrms: last_mrms[i],
            reference_mrms: reference_mrms[i],
            ic_period: ic_period[i],
            ic_block: ic_block[i],
        })
        .collect())
}
