//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory by the estimators
//! - exported to JSON alongside reports
//! - deserialized from threshold files (`--config`)

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::EstimatorError;

/// One state variable (or scalar summary) sampled at the end of each pace.
///
/// Paces are strictly increasing but need not be contiguous: an extrapolated
/// ("smart") run skips the paces it jumped over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    paces: Vec<i64>,
    values: Vec<f64>,
}

impl Trace {
    /// Build a gap-free trace starting at `first_pace`.
    pub fn contiguous(first_pace: i64, values: Vec<f64>) -> Self {
        let paces = (0..values.len() as i64).map(|i| first_pace + i).collect();
        Self { paces, values }
    }

    /// Build a trace from explicit `(pace, value)` columns.
    pub fn from_samples(paces: Vec<i64>, values: Vec<f64>) -> Result<Self, EstimatorError> {
        if paces.len() != values.len() {
            return Err(EstimatorError::InvalidInput(format!(
                "pace column has {} entries but value column has {}",
                paces.len(),
                values.len()
            )));
        }
        if let Some(w) = paces.windows(2).find(|w| w[1] <= w[0]) {
            return Err(EstimatorError::InvalidInput(format!(
                "paces must be strictly increasing (found {} then {})",
                w[0], w[1]
            )));
        }
        Ok(Self { paces, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn paces(&self) -> &[i64] {
        &self.paces
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first_pace(&self) -> Option<i64> {
        self.paces.first().copied()
    }

    pub fn last_pace(&self) -> Option<i64> {
        self.paces.last().copied()
    }

    pub fn last_value(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Value recorded at `pace`, if the trace contains that pace.
    pub fn value_at(&self, pace: i64) -> Option<f64> {
        self.paces
            .binary_search(&pace)
            .ok()
            .map(|idx| self.values[idx])
    }

    /// Values for every pace in `start..=end`, or `None` if any pace is missing.
    pub fn window(&self, start: i64, end: i64) -> Option<Vec<f64>> {
        if end < start {
            return None;
        }
        let lo = self.paces.binary_search(&start).ok()?;
        let hi = self.paces.binary_search(&end).ok()?;
        if (hi - lo) as i64 != end - start {
            return None;
        }
        Some(self.values[lo..=hi].to_vec())
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.paces.iter().copied().zip(self.values.iter().copied())
    }
}

/// Parameters of a single-exponential relaxation fit.
///
/// `tau` is the reciprocal decay rate, `alpha` the log-amplitude intercept of
/// the pace-to-pace difference fit (at the buffer start), and `asymptote` the
/// steady state reported by the simulator, when it reported one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitParameters {
    pub tau: f64,
    pub alpha: f64,
    pub asymptote: Option<f64>,
}

/// Where and how far a jump was taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JumpParameters {
    /// Pace at the end of the fit buffer (the pace the jump starts from).
    pub jump_pace: i64,
    /// Number of pace-to-pace steps covered by the fit buffer.
    pub buffer_size: i64,
    /// Multiplier applied to the predicted remaining change.
    pub extrapolation_coefficient: f64,
}

impl JumpParameters {
    pub fn buffer_start(&self) -> i64 {
        self.jump_pace - self.buffer_size
    }
}

/// How the drift direction of the buffer is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SignRule {
    /// Compare the last and first buffer values.
    #[default]
    Endpoints,
    /// Use the slope of a least-squares line through the whole buffer.
    LeastSquares,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtrapolationConfig {
    /// Fits with `|tau| <= tau_epsilon` are rejected as degenerate.
    pub tau_epsilon: f64,
    /// Relative deviation of `check_value` from its theoretical value above
    /// which a fit-quality warning is raised.
    pub check_tolerance: f64,
    pub sign_rule: SignRule,
}

impl Default for ExtrapolationConfig {
    fn default() -> Self {
        Self {
            tau_epsilon: 1e-9,
            check_tolerance: 0.1,
            sign_rule: SignRule::Endpoints,
        }
    }
}

/// Raised when the observed buffer does not look like the fitted exponential.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitWarning {
    pub check_value: f64,
    pub predicted_value: f64,
    pub relative_deviation: f64,
}

/// Output of the extrapolator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtrapolationResult {
    /// Predicted trajectory over every pace of the reference trace.
    pub predicted: Trace,
    /// Signed remaining change predicted beyond the jump pace.
    pub v_diff: f64,
    pub asymptote: f64,
    pub check_value: f64,
    /// Theoretical value of `check_value` for an exact exponential.
    pub predicted_value: f64,
    pub warning: Option<FitWarning>,
    /// Largest `|predicted - reference|` at or after the jump pace.
    pub max_deviation_after_jump: f64,
    /// `|asymptote - reference.last|`.
    pub terminal_error: f64,
}

/// Named pace-to-pace error measures written by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum ErrorMeasure {
    #[serde(rename = "MRMS")]
    #[value(name = "MRMS", alias = "mrms")]
    Mrms,
    #[serde(rename = "2-Norm")]
    #[value(name = "2-Norm", alias = "2-norm")]
    TwoNorm,
    #[serde(rename = "Trace-MRMS")]
    #[value(name = "Trace-MRMS", alias = "trace-mrms")]
    TraceMrms,
    #[serde(rename = "Trace-2-Norm")]
    #[value(name = "Trace-2-Norm", alias = "trace-2-norm")]
    TraceTwoNorm,
}

impl ErrorMeasure {
    pub const ALL: [ErrorMeasure; 4] = [
        ErrorMeasure::Mrms,
        ErrorMeasure::TwoNorm,
        ErrorMeasure::TraceMrms,
        ErrorMeasure::TraceTwoNorm,
    ];

    /// Column header used in `error_measures_<tol>.dat`.
    pub fn column_name(self) -> &'static str {
        match self {
            ErrorMeasure::Mrms => "MRMS",
            ErrorMeasure::TwoNorm => "2-Norm",
            ErrorMeasure::TraceMrms => "Trace-MRMS",
            ErrorMeasure::TraceTwoNorm => "Trace-2-Norm",
        }
    }

    pub fn next(self) -> Self {
        match self {
            ErrorMeasure::Mrms => ErrorMeasure::TwoNorm,
            ErrorMeasure::TwoNorm => ErrorMeasure::TraceMrms,
            ErrorMeasure::TraceMrms => ErrorMeasure::TraceTwoNorm,
            ErrorMeasure::TraceTwoNorm => ErrorMeasure::Mrms,
        }
    }
}

impl fmt::Display for ErrorMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Per-pace values of one error measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSeries {
    pub measure: ErrorMeasure,
    pub values: Vec<f64>,
}

/// Placement of a rolling window relative to the pace it is reported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WindowAlignment {
    /// Window centred on the pace (uses later paces; offline analysis only).
    #[default]
    Centered,
    /// Window ending at the pace.
    Trailing,
}

/// Windows and thresholds for the stopping-criterion estimator.
///
/// The threshold defaults are the empirically tuned values used for the
/// published stopping-pace tables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoppingConfig {
    pub alignment: WindowAlignment,
    pub average_window: usize,
    pub trend_window: usize,
    pub auto_diff_window: usize,
    pub min_window: usize,
    /// Number of completed block minima checked for a residual trend.
    pub minima_lookback: usize,
    pub pmcc_lookahead: usize,
    /// Upper bound on `log10(error)` before stopping is considered.
    pub log_floor: f64,
    pub pmcc_threshold: f64,
    pub pmcc_lower_bound: f64,
    pub auto_diff_threshold: f64,
    pub auto_diff_clip: f64,
    pub minima_pmcc_bound: f64,
}

impl Default for StoppingConfig {
    fn default() -> Self {
        Self {
            alignment: WindowAlignment::Centered,
            average_window: 50,
            trend_window: 200,
            auto_diff_window: 100,
            min_window: 50,
            minima_lookback: 4,
            pmcc_lookahead: 100,
            log_floor: -5.0,
            pmcc_threshold: -0.2,
            pmcc_lower_bound: -0.5,
            auto_diff_threshold: -0.2,
            auto_diff_clip: 5.0,
            minima_pmcc_bound: -0.8,
        }
    }
}

impl StoppingConfig {
    pub fn validate(&self) -> Result<(), EstimatorError> {
        let windows = [
            ("average_window", self.average_window),
            ("trend_window", self.trend_window),
            ("min_window", self.min_window),
        ];
        for (name, w) in windows {
            if w == 0 {
                return Err(EstimatorError::InvalidConfig(format!("{name} must be > 0")));
            }
        }
        if self.auto_diff_window < 4 {
            return Err(EstimatorError::InvalidConfig(
                "auto_diff_window must be >= 4 (its half window needs two differences)".into(),
            ));
        }
        if self.minima_lookback < 3 {
            return Err(EstimatorError::InvalidConfig(
                "minima_lookback must be >= 3 to form a correlation".into(),
            ));
        }
        let thresholds = [
            self.log_floor,
            self.pmcc_threshold,
            self.pmcc_lower_bound,
            self.auto_diff_threshold,
            self.auto_diff_clip,
            self.minima_pmcc_bound,
        ];
        if thresholds.iter().any(|t| !t.is_finite()) {
            return Err(EstimatorError::InvalidConfig("thresholds must be finite".into()));
        }
        Ok(())
    }
}

/// The pace at which the error series was judged flat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoppingPoint {
    /// Index into the error series.
    pub index: usize,
    /// Raw error value at that pace.
    pub error: f64,
    pub log_error: f64,
    /// `|APD(pace) - trueApd|`, when an APD sample exists for the pace.
    pub apd_error: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoppingDecision {
    Reached(StoppingPoint),
    NotReached,
}

impl StoppingDecision {
    pub fn point(&self) -> Option<&StoppingPoint> {
        match self {
            StoppingDecision::Reached(p) => Some(p),
            StoppingDecision::NotReached => None,
        }
    }

    pub fn is_reached(&self) -> bool {
        matches!(self, StoppingDecision::Reached(_))
    }
}

/// One simulated (model, scenario) combination.
///
/// Directory names follow `<model>_<period>ms_<block>_percent`, optionally
/// followed by `_from_<period>ms_<block>_percent` for the initial conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioId {
    pub model: String,
    pub period: f64,
    pub ikr_block: f64,
    pub ic_period: f64,
    pub ic_block: f64,
}

impl ScenarioId {
    pub fn parse_dir_name(name: &str) -> Option<Self> {
        let (head, initial) = match name.split_once("_from_") {
            Some((head, tail)) => (head, Some(parse_period_block(tail)?)),
            None => (name, None),
        };
        let rest = head.strip_suffix("_percent")?;
        let (rest, block) = rest.rsplit_once('_')?;
        let (model, period) = rest.rsplit_once('_')?;
        let period: f64 = period.strip_suffix("ms")?.parse().ok()?;
        let ikr_block: f64 = block.parse().ok()?;
        if model.is_empty() {
            return None;
        }
        let (ic_period, ic_block) = initial.unwrap_or((period, ikr_block));
        Some(Self {
            model: model.to_string(),
            period,
            ikr_block,
            ic_period,
            ic_block,
        })
    }
}

fn parse_period_block(s: &str) -> Option<(f64, f64)> {
    let rest = s.strip_suffix("_percent")?;
    let (period, block) = rest.split_once('_')?;
    Some((period.strip_suffix("ms")?.parse().ok()?, block.parse().ok()?))
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}ms_{}_percent", self.model, self.period, self.ikr_block)?;
        if self.ic_period != self.period || self.ic_block != self.ikr_block {
            write!(f, "_from_{}ms_{}_percent", self.ic_period, self.ic_block)?;
        }
        Ok(())
    }
}

/// One row of `<model>_results.dat`: a benchmark run of one setting on one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRow {
    pub model_name: String,
    pub extrapolation_constant: f64,
    pub buffer_size: i64,
    pub period: f64,
    pub ikr_block: f64,
    /// Total paces simulated.
    pub score: f64,
    pub jumps_used: f64,
    pub apd90: f64,
    pub last_mrms: f64,
    pub reference_mrms: f64,
    pub ic_period: f64,
    pub ic_block: f64,
}

impl BenchmarkRow {
    /// Identifies the scenario independent of the extrapolation setting.
    pub fn scenario_key(&self) -> [u64; 4] {
        [
            self.ic_period.to_bits(),
            self.ic_block.to_bits(),
            self.period.to_bits(),
            self.ikr_block.to_bits(),
        ]
    }
}

/// Stopping estimate for one scenario, as written to `stopping_criteria.out`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: ScenarioId,
    pub measure: ErrorMeasure,
    pub decision: StoppingDecision,
    /// Pace number of the stopping index (from the `pace` column, or the index).
    pub terminal_pace: Option<i64>,
}
