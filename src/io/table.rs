//! Whitespace-delimited table reader.
//!
//! The simulator writes `.dat` files as space (and occasionally tab)
//! separated columns with a single header row. Runs of separators are
//! collapsed, `#` lines are comments, and `nan`/`inf` parse as floats.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::AppError;

/// Raw records of a whitespace file: `(line number, fields)`.
pub fn read_records<R: Read>(reader: R, source: &str) -> Result<Vec<(usize, Vec<String>)>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| AppError::new(2, format!("Failed to read '{source}': {e}")))?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        let fields: Vec<String> = record
            .iter()
            .flat_map(str::split_whitespace)
            .map(str::to_string)
            .collect();
        if !fields.is_empty() {
            records.push((line, fields));
        }
    }
    Ok(records)
}

/// A whitespace table held as text cells, parsed per column on demand.
#[derive(Debug, Clone)]
pub struct Table {
    source: String,
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<(usize, Vec<String>)>,
}

impl Table {
    pub fn parse<R: Read>(reader: R, source: &str) -> Result<Self, AppError> {
        let mut records = read_records(reader, source)?.into_iter();
        let (_, headers) = records
            .next()
            .ok_or_else(|| AppError::new(3, format!("'{source}' is empty.")))?;
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim_start_matches('\u{feff}').to_string(), i))
            .collect();
        Ok(Self {
            source: source.to_string(),
            headers,
            index,
            rows: records.collect(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::new(2, format!("Failed to open '{}': {e}", path.display())))?;
        Self::parse(file, &path.display().to_string())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn column_index(&self, name: &str) -> Result<usize, AppError> {
        self.index.get(name).copied().ok_or_else(|| {
            AppError::new(
                2,
                format!("Missing column '{name}' in '{}' (found: {}).", self.source, self.headers.join(", ")),
            )
        })
    }

    fn cell<'a>(&self, line: usize, row: &'a [String], idx: usize, name: &str) -> Result<&'a str, AppError> {
        row.get(idx).map(String::as_str).ok_or_else(|| {
            AppError::new(2, format!("'{}' line {line}: no value for column '{name}'.", self.source))
        })
    }

    /// Column parsed as `f64`.
    pub fn column_f64(&self, name: &str) -> Result<Vec<f64>, AppError> {
        let idx = self.column_index(name)?;
        self.rows
            .iter()
            .map(|(line, row)| {
                let cell = self.cell(*line, row, idx, name)?;
                parse_f64(cell).ok_or_else(|| {
                    AppError::new(
                        2,
                        format!("'{}' line {line}: '{cell}' in column '{name}' is not a number.", self.source),
                    )
                })
            })
            .collect()
    }

    /// Column parsed as integer paces (`12` and `12.0` both accepted).
    pub fn column_i64(&self, name: &str) -> Result<Vec<i64>, AppError> {
        let idx = self.column_index(name)?;
        self.rows
            .iter()
            .map(|(line, row)| {
                let cell = self.cell(*line, row, idx, name)?;
                parse_i64(cell).ok_or_else(|| {
                    AppError::new(
                        2,
                        format!("'{}' line {line}: '{cell}' in column '{name}' is not an integer.", self.source),
                    )
                })
            })
            .collect()
    }

    pub fn column_str(&self, name: &str) -> Result<Vec<String>, AppError> {
        let idx = self.column_index(name)?;
        self.rows
            .iter()
            .map(|(line, row)| self.cell(*line, row, idx, name).map(str::to_string))
            .collect()
    }
}

/// Parse a float, accepting the spellings C++ streams emit for NaN/inf.
pub fn parse_f64(s: &str) -> Option<f64> {
    match s.to_ascii_lowercase().as_str() {
        "nan" | "-nan" | "+nan" => Some(f64::NAN),
        "inf" | "+inf" | "infinity" => Some(f64::INFINITY),
        "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

pub fn parse_i64(s: &str) -> Option<i64> {
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let v: f64 = s.parse().ok()?;
    (v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15).then_some(v as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_repeated_separators_and_tabs() {
        let text = "pace   V\tCai\n0  -85.0   1e-4\n1\t-84.5 nan\n";
        let t = Table::parse(text.as_bytes(), "mem").unwrap();
        assert_eq!(t.headers(), &["pace", "V", "Cai"]);
        assert_eq!(t.column_i64("pace").unwrap(), vec![0, 1]);
        assert_eq!(t.column_f64("V").unwrap(), vec![-85.0, -84.5]);
        let cai = t.column_f64("Cai").unwrap();
        assert_eq!(cai[0], 1e-4);
        assert!(cai[1].is_nan());
    }

    #[test]
    fn missing_column_names_the_file() {
        let t = Table::parse("MRMS APD\n1 2\n".as_bytes(), "error_measures.dat").unwrap();
        let err = t.column_f64("2-Norm").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("2-Norm"));
        assert!(err.to_string().contains("error_measures.dat"));
    }

    #[test]
    fn bad_cells_and_short_rows_are_errors() {
        let t = Table::parse("a b\n1 x\n2\n".as_bytes(), "mem").unwrap();
        assert!(t.column_f64("b").is_err());
        assert_eq!(t.column_f64("a").unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let t = Table::parse("# produced by test\nx\n\n1\n2\n".as_bytes(), "mem").unwrap();
        assert_eq!(t.column_f64("x").unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn integer_cells_accept_float_spelling() {
        assert_eq!(parse_i64("12.0"), Some(12));
        assert_eq!(parse_i64("12.5"), None);
        assert_eq!(parse_f64("-NaN").map(f64::is_nan), Some(true));
        assert_eq!(parse_f64("-inf"), Some(f64::NEG_INFINITY));
    }
}
