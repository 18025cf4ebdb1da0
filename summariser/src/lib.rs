use crate::model::SummaryOutput;
use anyhow::Context;
use jawa_summary_model::RunSummary;

mod analyze;
mod exceptions;
pub mod filter;
pub mod model;
mod results;
mod table;

pub use analyze::{median, observed_duration_sec, percentile, throughput};
pub use exceptions::{exceptions_in, parse_exceptions};
pub use results::{columns, parse_results, read_records, summarize_records, MIN_FIELDS};
pub use table::{aggregates_table, exceptions_table};

/// Summarise a finished run from the run history.
///
/// Unlike a live poll, a missing results file is an error here because the run is over and the
/// data should exist.
pub fn summarize_run(run_summary: RunSummary) -> anyhow::Result<SummaryOutput> {
    if !run_summary.results_path.exists() {
        anyhow::bail!(
            "Results for run {} not found at {}",
            run_summary.run_id,
            run_summary.results_path.display()
        );
    }

    let results = parse_results(&run_summary.results_path)
        .with_context(|| format!("Results for run {}", run_summary.run_id))?;
    let exceptions = parse_exceptions(&run_summary.log_path)
        .with_context(|| format!("Log for run {}", run_summary.run_id))?;

    Ok(SummaryOutput {
        fingerprint: run_summary.fingerprint(),
        run_summary,
        results,
        exceptions,
    })
}
