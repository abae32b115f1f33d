//! Command-line parsing for the pacing post-processor.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the estimator code.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::domain::{ErrorMeasure, SignRule, WindowAlignment};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "pex",
    version,
    about = "Pace extrapolation checks and stopping-criterion estimates for cardiac simulations"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log filter directive (overrides -v and RUST_LOG), e.g. `pace_extrap=debug`.
    #[arg(long, global = true, env = "PEX_LOG")]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Estimate the stopping pace of every scenario in a data directory and write the TSV report.
    Stopping(StoppingArgs),
    /// Replay the exponential extrapolation of one scenario against its brute-force run.
    Extrapolate(ExtrapolateArgs),
    /// Summarise a `<model>_results.dat` benchmark table.
    Benchmark(BenchmarkArgs),
    /// Write a synthetic scenario directory.
    Synth(SynthArgs),
    /// Launch the interactive TUI.
    ///
    /// This uses the same stopping pipeline as `pex stopping`, but renders
    /// the error series of each scenario in a terminal UI using Ratatui.
    View(ViewArgs),
}

/// Where scenario data lives and which files to read.
#[derive(Debug, Parser, Clone)]
pub struct DataArgs {
    /// Directory holding one sub-directory per scenario.
    #[arg(long, env = "PEX_DATA_DIR", default_value = "testoutput")]
    pub data_dir: PathBuf,

    /// Only scenarios whose directory name contains this model name.
    #[arg(long)]
    pub model: Option<String>,

    /// Tolerance string of the `error_measures_<tol>.dat` files.
    #[arg(long, env = "PEX_TOLERANCE", default_value = "1e-10")]
    pub tolerance: String,

    /// Tolerance string of the `apds_using_groundtruth_<tol>.dat` files.
    #[arg(long, env = "PEX_GROUNDTRUTH_TOLERANCE", default_value = "1e-12")]
    pub groundtruth_tolerance: String,

    /// Error measure the criterion runs on.
    #[arg(long, value_enum, default_value_t = ErrorMeasure::Mrms)]
    pub measure: ErrorMeasure,

    /// JSON file with stopping thresholds (missing keys keep their defaults).
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Override the rolling-window alignment of the config.
    #[arg(long, value_enum)]
    pub alignment: Option<WindowAlignment>,
}

#[derive(Debug, Parser, Clone)]
pub struct StoppingArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Process scenarios on the rayon thread pool.
    #[arg(long)]
    pub parallel: bool,

    /// TSV report path.
    #[arg(short, long, default_value = "stopping_criteria.out")]
    pub output: PathBuf,

    /// Also export every outcome (including skipped scenarios) to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,

    /// Print an ASCII plot of each scenario's error series.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

#[derive(Debug, Parser, Clone)]
pub struct ExtrapolateArgs {
    /// Scenario directory with `bruteforce.dat` and `JumpParameters*.dat`.
    #[arg(value_name = "DIR")]
    pub scenario: PathBuf,

    /// Re-estimate (tau, alpha) from the brute-force buffer.
    #[arg(long)]
    pub refit: bool,

    /// How the direction of the extrapolated change is chosen.
    #[arg(long, value_enum, default_value_t = SignRule::Endpoints)]
    pub sign_rule: SignRule,

    /// Relative deviation of the check value above which a fit warning is raised.
    #[arg(long, default_value_t = 0.1)]
    pub check_tolerance: f64,

    /// Only this state variable.
    #[arg(long)]
    pub state: Option<String>,

    /// Print an ASCII plot per state.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Export per-state results to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct BenchmarkArgs {
    /// Benchmark table; defaults to `<model>_results.dat`.
    #[arg(long)]
    pub results: Option<PathBuf>,

    /// Model name (used for the default path and the report).
    #[arg(long, default_value = "decker_2009")]
    pub model: String,

    /// Buffer size of the reference setting (lambda = 0).
    #[arg(long, default_value_t = 100)]
    pub reference_buffer_size: i64,

    /// APD range (ms) above which a scenario is flagged as bifurcating.
    #[arg(long, default_value_t = 0.5)]
    pub bifurcation_threshold: f64,

    /// Show the top-N settings.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Export the summary to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Parent directory of the scenario.
    #[arg(long, env = "PEX_DATA_DIR", default_value = "testoutput")]
    pub out_dir: PathBuf,

    /// Scenario directory name.
    #[arg(long, default_value = "synthetic_1000ms_0_percent")]
    pub name: String,

    /// Number of paces.
    #[arg(long, default_value_t = 2500)]
    pub paces: usize,

    /// Random seed.
    #[arg(long, default_value_t = 7)]
    pub seed: u64,

    /// Gaussian noise on every state sample.
    #[arg(long, default_value_t = 1e-9)]
    pub noise: f64,

    /// Tolerance string used in the error-measure file name.
    #[arg(long, env = "PEX_TOLERANCE", default_value = "1e-10")]
    pub tolerance: String,

    /// Tolerance string used in the ground-truth APD file name.
    #[arg(long, env = "PEX_GROUNDTRUTH_TOLERANCE", default_value = "1e-12")]
    pub groundtruth_tolerance: String,

    /// Pace of the jump written to `JumpParameters0.dat`.
    #[arg(long, default_value_t = 300)]
    pub jump_pace: i64,

    /// Buffer length (paces) behind the jump.
    #[arg(long, default_value_t = 100)]
    pub buffer_size: i64,
}

#[derive(Debug, Parser, Clone)]
pub struct ViewArgs {
    #[command(flatten)]
    pub data: DataArgs,
}
