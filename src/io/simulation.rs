//! Loaders for the simulator's per-scenario output files.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::domain::{ErrorMeasure, ErrorSeries, FitParameters, JumpParameters, Trace};
use crate::error::AppError;
use crate::io::table::{Table, parse_f64, parse_i64, read_records};

pub const SMART_FILE: &str = "smart.dat";
pub const BRUTE_FORCE_FILE: &str = "bruteforce.dat";

pub fn error_measures_file(tolerance: &str) -> String {
    format!("error_measures_{tolerance}.dat")
}

pub fn groundtruth_apd_file(tolerance: &str) -> String {
    format!("apds_using_groundtruth_{tolerance}.dat")
}

/// Every state variable of a `smart.dat` / `bruteforce.dat` file.
#[derive(Debug, Clone)]
pub struct StateTraces {
    pub names: Vec<String>,
    pub traces: Vec<Trace>,
}

impl StateTraces {
    pub fn get(&self, name: &str) -> Option<&Trace> {
        self.names.iter().position(|n| n == name).map(|i| &self.traces[i])
    }
}

/// Load a trajectory file. Paces come from the `pace` column; without one the
/// rows are numbered from 0.
pub fn load_state_traces(path: &Path) -> Result<StateTraces, AppError> {
    let table = Table::from_path(path)?;
    let paces = if table.has_column("pace") {
        table.column_i64("pace")?
    } else {
        (0..table.len() as i64).collect()
    };

    let mut names = Vec::new();
    let mut traces = Vec::new();
    for name in table.headers().iter().filter(|h| h.as_str() != "pace") {
        let values = table.column_f64(name)?;
        let trace = Trace::from_samples(paces.clone(), values)
            .map_err(|e| AppError::new(2, format!("'{}': {e}", path.display())))?;
        names.push(name.clone());
        traces.push(trace);
    }
    Ok(StateTraces { names, traces })
}

/// One state-variable row of a jump-parameters file.
#[derive(Debug, Clone, PartialEq)]
pub struct StateFit {
    pub state_index: usize,
    pub state_name: String,
    pub fit: FitParameters,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JumpFile {
    pub path: PathBuf,
    pub jump: JumpParameters,
    pub states: Vec<StateFit>,
}

/// Parse a jump-parameters file.
///
/// ```text
/// jumpPace bufferSize extrapolationCoefficient
/// stateIndex stateName tau alpha [Vinf]
/// ...
/// ```
pub fn parse_jump_parameters<R: std::io::Read>(reader: R, path: &Path) -> Result<JumpFile, AppError> {
    let source = path.display().to_string();
    let bad = |line: usize, what: &str| AppError::new(2, format!("'{source}' line {line}: {what}"));

    let mut records = read_records(reader, &source)?.into_iter();
    let (line, header) = records
        .next()
        .ok_or_else(|| AppError::new(3, format!("'{source}' is empty.")))?;
    if header.len() < 3 {
        return Err(bad(line, "expected `jumpPace bufferSize extrapolationCoefficient`"));
    }
    let jump = JumpParameters {
        jump_pace: parse_i64(&header[0]).ok_or_else(|| bad(line, "jump pace is not an integer"))?,
        buffer_size: parse_i64(&header[1]).ok_or_else(|| bad(line, "buffer size is not an integer"))?,
        extrapolation_coefficient: parse_f64(&header[2])
            .ok_or_else(|| bad(line, "extrapolation coefficient is not a number"))?,
    };

    let mut states = Vec::new();
    for (line, fields) in records {
        if fields.len() < 4 {
            return Err(bad(line, "expected `stateIndex stateName tau alpha [Vinf]`"));
        }
        let state_index = fields[0]
            .parse()
            .map_err(|_| bad(line, "state index is not an integer"))?;
        let tau = parse_f64(&fields[2]).ok_or_else(|| bad(line, "tau is not a number"))?;
        let alpha = parse_f64(&fields[3]).ok_or_else(|| bad(line, "alpha is not a number"))?;
        let asymptote = fields.get(4).and_then(|s| parse_f64(s)).filter(|v| v.is_finite());
        states.push(StateFit {
            state_index,
            state_name: fields[1].clone(),
            fit: FitParameters { tau, alpha, asymptote },
        });
    }

    Ok(JumpFile {
        path: path.to_path_buf(),
        jump,
        states,
    })
}

pub fn load_jump_parameters(path: &Path) -> Result<JumpFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open '{}': {e}", path.display())))?;
    parse_jump_parameters(file, path)
}

/// All `*JumpParameters*.dat` files in `dir`, sorted by name.
pub fn find_jump_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| AppError::new(2, format!("Failed to read '{}': {e}", dir.display())))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains("JumpParameters") && n.ends_with(".dat"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Contents of `error_measures_<tol>.dat`.
#[derive(Debug, Clone)]
pub struct ErrorMeasures {
    pub paces: Vec<i64>,
    columns: HashMap<ErrorMeasure, Vec<f64>>,
    /// APD90 per pace (empty when the file has no `APD` column).
    pub apd: Vec<f64>,
}

impl ErrorMeasures {
    pub fn series(&self, measure: ErrorMeasure) -> Option<ErrorSeries> {
        self.columns.get(&measure).map(|values| ErrorSeries {
            measure,
            values: values.clone(),
        })
    }

    pub fn available(&self) -> Vec<ErrorMeasure> {
        ErrorMeasure::ALL
            .into_iter()
            .filter(|m| self.columns.contains_key(m))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.paces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paces.is_empty()
    }

    /// Pace number of row `index`.
    pub fn pace_at(&self, index: usize) -> Option<i64> {
        self.paces.get(index).copied()
    }
}

pub fn load_error_measures(path: &Path) -> Result<ErrorMeasures, AppError> {
    let table = Table::from_path(path)?;
    let paces = if table.has_column("pace") {
        table.column_i64("pace")?
    } else {
        (0..table.len() as i64).collect()
    };

    let mut columns = HashMap::new();
    for measure in ErrorMeasure::ALL {
        if table.has_column(measure.column_name()) {
            columns.insert(measure, table.column_f64(measure.column_name())?);
        }
    }
    if columns.is_empty() {
        return Err(AppError::new(
            2,
            format!(
                "'{}' has none of the columns {}.",
                path.display(),
                ErrorMeasure::ALL.map(|m| m.column_name()).join(", ")
            ),
        ));
    }
    let apd = if table.has_column("APD") {
        table.column_f64("APD")?
    } else {
        Vec::new()
    };

    Ok(ErrorMeasures { paces, columns, apd })
}

/// The converged reference APD: last row of the single-column ground-truth file.
pub fn parse_true_apd<R: std::io::Read>(reader: R, source: &str) -> Result<f64, AppError> {
    let records = read_records(reader, source)?;
    // First record is the header.
    let (line, last) = records
        .iter()
        .skip(1)
        .last()
        .ok_or_else(|| AppError::new(3, format!("'{source}' has no APD rows.")))?;
    last.first()
        .and_then(|s| parse_f64(s))
        .filter(|v| v.is_finite())
        .ok_or_else(|| AppError::new(2, format!("'{source}' line {line}: APD is not a finite number.")))
}

pub fn load_true_apd(path: &Path) -> Result<f64, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open '{}': {e}", path.display())))?;
    parse_true_apd(file, &path.display().to_string())
}

fn space_writer(path: &Path) -> Result<csv::Writer<File>, AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))?;
    Ok(csv::WriterBuilder::new().delimiter(b' ').flexible(true).from_writer(file))
}

fn write_rows<I, R>(path: &Path, rows: I) -> Result<(), AppError>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let err = |e: csv::Error| AppError::new(2, format!("Failed to write '{}': {e}", path.display()));
    let mut out = space_writer(path)?;
    for row in rows {
        out.write_record(row).map_err(err)?;
    }
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to write '{}': {e}", path.display())))
}

/// Write traces sharing the paces of the first one as a `pace`-indexed table.
pub fn write_state_traces(path: &Path, names: &[String], traces: &[Trace]) -> Result<(), AppError> {
    let Some(first) = traces.first() else {
        return Err(AppError::new(3, "No traces to write."));
    };
    if names.len() != traces.len() || traces.iter().any(|t| t.paces() != first.paces()) {
        return Err(AppError::new(4, "State traces must share their paces."));
    }
    let header = std::iter::once("pace".to_string()).chain(names.iter().cloned()).collect::<Vec<_>>();
    let rows = first.paces().iter().enumerate().map(|(i, pace)| {
        std::iter::once(pace.to_string())
            .chain(traces.iter().map(|t| t.values()[i].to_string()))
            .collect::<Vec<_>>()
    });
    write_rows(path, std::iter::once(header).chain(rows))
}

pub fn write_error_measures(path: &Path, measures: &[ErrorSeries], apd: &[f64]) -> Result<(), AppError> {
    let len = measures.first().map(|m| m.values.len()).unwrap_or(apd.len());
    if measures.iter().any(|m| m.values.len() != len) || (!apd.is_empty() && apd.len() != len) {
        return Err(AppError::new(4, "Error measure columns must have equal lengths."));
    }
    let mut header: Vec<String> = measures.iter().map(|m| m.measure.column_name().to_string()).collect();
    if !apd.is_empty() {
        header.push("APD".to_string());
    }
    let rows = (0..len).map(|i| {
        measures
            .iter()
            .map(|m| m.values[i])
            .chain(apd.get(i).copied())
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
    });
    write_rows(path, std::iter::once(header).chain(rows))
}

/// Ground-truth APD file; the last value is the converged APD.
pub fn write_true_apd(path: &Path, apds: &[f64]) -> Result<(), AppError> {
    let rows = apds.iter().map(|v| vec![v.to_string()]);
    write_rows(path, std::iter::once(vec!["APD".to_string()]).chain(rows))
}

pub fn write_jump_parameters(path: &Path, jump: &JumpParameters, states: &[StateFit]) -> Result<(), AppError> {
    let header = vec![
        jump.jump_pace.to_string(),
        jump.buffer_size.to_string(),
        jump.extrapolation_coefficient.to_string(),
    ];
    let rows = states.iter().map(|s| {
        vec![
            s.state_index.to_string(),
            s.state_name.clone(),
            s.fit.tau.to_string(),
            s.fit.alpha.to_string(),
            s.fit.asymptote.map(|v| v.to_string()).unwrap_or_else(|| "nan".to_string()),
        ]
    });
    write_rows(path, std::iter::once(header).chain(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_file_header_and_states() {
        let text = "120 100 1\n0 V 12.5 -3.2 -85.1\n1 Cai 40.0 -9.0 nan\n2 Nai 1e3 -7.5\n";
        let f = parse_jump_parameters(text.as_bytes(), Path::new("JumpParameters0.dat")).unwrap();
        assert_eq!(f.jump.jump_pace, 120);
        assert_eq!(f.jump.buffer_size, 100);
        assert_eq!(f.jump.extrapolation_coefficient, 1.0);
        assert_eq!(f.states.len(), 3);
        assert_eq!(f.states[0].fit.asymptote, Some(-85.1));
        assert_eq!(f.states[1].fit.asymptote, None);
        assert_eq!(f.states[2].state_name, "Nai");
        assert_eq!(f.states[2].fit.tau, 1000.0);
    }

    #[test]
    fn malformed_jump_rows_are_errors() {
        let err = parse_jump_parameters("120 100\n".as_bytes(), Path::new("j.dat")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let err = parse_jump_parameters("120 100 1\n0 V 12.5\n".as_bytes(), Path::new("j.dat")).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn true_apd_is_last_row() {
        let text = "APD\n301.2\n300.9\n300.75\n";
        assert_eq!(parse_true_apd(text.as_bytes(), "mem").unwrap(), 300.75);
        assert!(parse_true_apd("APD\n".as_bytes(), "mem").is_err());
    }

    #[test]
    fn written_files_load_back() {
        let dir = tempfile::tempdir().unwrap();

        let traces = vec![
            Trace::contiguous(0, vec![1.0, 1.5, 1.75]),
            Trace::contiguous(0, vec![-80.0, -82.0, -83.0]),
        ];
        let names = vec!["Nai".to_string(), "V".to_string()];
        let path = dir.path().join(BRUTE_FORCE_FILE);
        write_state_traces(&path, &names, &traces).unwrap();
        let loaded = load_state_traces(&path).unwrap();
        assert_eq!(loaded.names, names);
        assert_eq!(loaded.get("V"), Some(&traces[1]));

        let measures = vec![ErrorSeries {
            measure: ErrorMeasure::Mrms,
            values: vec![f64::NAN, 1e-3, 1e-4],
        }];
        let path = dir.path().join(error_measures_file("1e-10"));
        write_error_measures(&path, &measures, &[300.0, 299.0, 298.5]).unwrap();
        let loaded = load_error_measures(&path).unwrap();
        assert_eq!(loaded.available(), vec![ErrorMeasure::Mrms]);
        assert_eq!(loaded.apd, vec![300.0, 299.0, 298.5]);
        assert_eq!(loaded.pace_at(2), Some(2));
        let mrms = loaded.series(ErrorMeasure::Mrms).unwrap().values;
        assert!(mrms[0].is_nan());
        assert_eq!(mrms[2], 1e-4);

        let jump = JumpParameters {
            jump_pace: 200,
            buffer_size: 100,
            extrapolation_coefficient: 0.5,
        };
        let states = vec![StateFit {
            state_index: 0,
            state_name: "Nai".into(),
            fit: FitParameters {
                tau: 150.0,
                alpha: -4.5,
                asymptote: None,
            },
        }];
        let path = dir.path().join("JumpParameters0.dat");
        write_jump_parameters(&path, &jump, &states).unwrap();
        let loaded = load_jump_parameters(&path).unwrap();
        assert_eq!(loaded.jump, jump);
        assert_eq!(loaded.states, states);
        assert_eq!(find_jump_files(dir.path()).unwrap(), vec![path]);
    }
}
