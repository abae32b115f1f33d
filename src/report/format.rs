//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the estimator code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use crate::app::pipeline::{ExtrapolationRun, ScenarioOutcome, StoppingRun};
use crate::report::benchmark::BenchmarkSummary;

/// One line per scenario: stopping pace, log error there, APD error.
pub fn format_stopping_summary(run: &StoppingRun) -> String {
    let mut out = String::new();
    let reached = run.reports().filter(|r| r.decision.is_reached()).count();

    out.push_str(&format!("=== pex - stopping criterion ({}) ===\n", run.measure));
    out.push_str(&format!(
        "Scenarios: {} | reached={} | not reached={} | skipped={}\n\n",
        run.outcomes.len(),
        reached,
        run.outcomes.len() - reached - run.skipped(),
        run.skipped()
    ));

    push_row(&mut out, &format!("{:<48} {:>8} {:>10} {:>12}", "scenario", "pace", "log10 err", "APD err"));
    push_row(&mut out, &format!("{:-<48} {:-<8} {:-<10} {:-<12}", "", "", "", ""));
    for outcome in &run.outcomes {
        match outcome {
            ScenarioOutcome::Estimated { report, .. } => {
                let scenario = truncate(&report.scenario.to_string(), 48);
                match (report.decision.point(), report.terminal_pace) {
                    (Some(p), Some(pace)) => push_row(
                        &mut out,
                        &format!(
                            "{scenario:<48} {pace:>8} {:>10.3} {:>12}",
                            p.log_error,
                            p.apd_error.map(|e| format!("{e:.4}")).unwrap_or_else(|| "-".into())
                        ),
                    ),
                    _ => push_row(&mut out, &format!("{scenario:<48} {:>8}", "NA")),
                }
            }
            ScenarioOutcome::Skipped { scenario, reason } => push_row(
                &mut out,
                &format!("{:<48} (skipped) {reason}", truncate(&scenario.to_string(), 48)),
            ),
        }
    }

    out
}

/// Per-state table of fit checks and asymptote errors.
pub fn format_extrapolation_table(run: &ExtrapolationRun) -> String {
    let mut out = String::new();

    push_row(
        &mut out,
        &format!(
            "{:<12} {:>6} {:>6} {:>10} {:>10} {:>12} {:>10} {:>10} {:>12}",
            "state", "jump", "buf", "tau", "alpha", "asymptote", "check", "expected", "final err"
        ),
    );
    push_row(
        &mut out,
        &format!(
            "{:-<12} {:-<6} {:-<6} {:-<10} {:-<10} {:-<12} {:-<10} {:-<10} {:-<12}",
            "", "", "", "", "", "", "", "", ""
        ),
    );

    for row in &run.rows {
        let state = truncate(&row.state, 12);
        let (tau, alpha) = row
            .fit
            .map(|f| (format!("{:.4}", f.tau), format!("{:.4}", f.alpha)))
            .unwrap_or_else(|| ("-".into(), "-".into()));
        match &row.outcome {
            Ok(result) => {
                let flag = if result.warning.is_some() { " !" } else { "" };
                push_row(
                    &mut out,
                    &format!(
                        "{state:<12} {:>6} {:>6} {tau:>10} {alpha:>10} {:>12.6e} {:>10.4} {:>10.4} {:>12.3e}{flag}",
                        row.jump.jump_pace,
                        row.jump.buffer_size,
                        result.asymptote,
                        result.check_value,
                        result.predicted_value,
                        result.terminal_error,
                    ),
                );
            }
            Err(reason) => push_row(
                &mut out,
                &format!(
                    "{state:<12} {:>6} {:>6} {tau:>10} {alpha:>10} (no extrapolation) {reason}",
                    row.jump.jump_pace, row.jump.buffer_size
                ),
            ),
        }
    }

    let warnings = run
        .rows
        .iter()
        .filter(|r| matches!(&r.outcome, Ok(res) if res.warning.is_some()))
        .count();
    if warnings > 0 {
        out.push_str(&format!("\n! {warnings} fit(s) disagree with their check value\n"));
    }

    out
}

/// Reference total, the best `top` settings, and APD consistency.
pub fn format_benchmark_summary(summary: &BenchmarkSummary, top: usize) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== pex - benchmark ({}) ===\n", summary.model));
    out.push_str(&format!("Reference paces: {:.0}\n\n", summary.reference_total));

    push_row(
        &mut out,
        &format!(
            "{:>8} {:>6} {:>10} {:>10} {:>8} {:>8} {:>24}",
            "lambda", "buf", "paces", "saved", "saved%", "jumps", "saved/scenario [q0 q2 q4]"
        ),
    );
    push_row(
        &mut out,
        &format!("{:-<8} {:-<6} {:-<10} {:-<10} {:-<8} {:-<8} {:-<24}", "", "", "", "", "", "", ""),
    );
    for s in summary.settings.iter().take(top) {
        push_row(
            &mut out,
            &format!(
                "{:>8.2} {:>6} {:>10.0} {:>10.0} {:>8.2} {:>8.0} {:>24}",
                s.extrapolation_constant,
                s.buffer_size,
                s.total_score,
                s.paces_saved,
                s.percentage_saved,
                s.jumps_used,
                fmt_vec(&[s.quantiles[0], s.quantiles[2], s.quantiles[4]]),
            ),
        );
    }

    out.push_str(&format!("\nMax APD90 range: {:.4} ms\n", summary.max_apd_range));
    out.push_str(&format!(
        "Max final MRMS: {:.3e} | reference: {:.3e}\n",
        summary.max_last_mrms, summary.max_reference_mrms
    ));
    if let Some(b) = &summary.bifurcation {
        out.push_str(&format!(
            "Bifurcation: period={} block={} APD90 {:.3}..{:.3} (lambda {} buf {} vs lambda {} buf {})\n",
            b.min_row.period,
            b.min_row.ikr_block,
            b.min_row.apd90,
            b.max_row.apd90,
            b.min_row.extrapolation_constant,
            b.min_row.buffer_size,
            b.max_row.extrapolation_constant,
            b.max_row.buffer_size,
        ));
    }

    out
}

fn push_row(out: &mut String, row: &str) {
    out.push_str(row.trim_end());
    out.push('\n');
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.3}")).collect();
    format!("[{}]", parts.join(" "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
