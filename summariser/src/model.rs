use jawa_summary_model::{ExceptionRecord, ResultsSummary, RunSummary};
use serde::{Deserialize, Serialize};

/// The summary of a single run from the run history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryOutput {
    pub run_summary: RunSummary,
    pub fingerprint: String,
    pub results: ResultsSummary,
    pub exceptions: Vec<ExceptionRecord>,
}
