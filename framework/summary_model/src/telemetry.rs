use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A scenario group (JMeter thread group) found in a plan document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenarioGroup {
    /// Display name. Not guaranteed to be unique.
    pub name: String,
    /// The key used to select this group when patching a plan.
    pub identifier: String,
    /// The activation flag as currently written in the document. Absent flags read as `true`.
    pub enabled: bool,
}

/// A distinct, enabled leaf request definition found in a plan document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SamplerRef {
    pub name: String,
}

/// One row of the engine's results stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultRecord {
    pub timestamp_ms: i64,
    pub elapsed_ms: u64,
    pub label: String,
    pub success: bool,
    pub response_code: String,
    pub response_message: String,
    pub thread_name: String,
    pub failure_message: String,
    pub bytes: u64,
    /// Number of active threads across all groups when the sample completed.
    pub all_threads: Option<u64>,
}

/// Statistics for a single label, derived from the results stream on every query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelAggregate {
    pub label: String,
    pub request_count: u64,
    pub failure_count: u64,
    pub min: u64,
    pub max: u64,
    /// Mean of the two central values for an even sample size.
    pub median: f64,
    pub p90: u64,
    pub p95: u64,
    pub p99: u64,
    pub avg_elapsed: f64,
    pub avg_bytes: f64,
    pub throughput_per_sec: f64,
    pub failures_per_sec: f64,
    pub error_percent: f64,
}

impl LabelAggregate {
    /// A zero-valued entry, used to give a caller stable rows before any data has arrived.
    pub fn placeholder(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            request_count: 0,
            failure_count: 0,
            min: 0,
            max: 0,
            median: 0.0,
            p90: 0,
            p95: 0,
            p99: 0,
            avg_elapsed: 0.0,
            avg_bytes: 0.0,
            throughput_per_sec: 0.0,
            failures_per_sec: 0.0,
            error_percent: 0.0,
        }
    }
}

/// The result of parsing a results stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultsSummary {
    /// One entry per label, in order of first appearance in the stream.
    pub aggregates: Vec<LabelAggregate>,
    pub overall_throughput_per_sec: f64,
    pub observed_duration_sec: f64,
    pub total_requests: u64,
    pub total_failures: u64,
    /// The `allThreads` value of the most recent row, if the stream records it.
    pub active_threads: Option<u64>,
}

impl ResultsSummary {
    pub fn is_empty(&self) -> bool {
        self.total_requests == 0
    }

    /// Failure rate as a percentage, defined as `0` when nothing has been recorded.
    pub fn failure_rate_percent(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            100.0 * self.total_failures as f64 / self.total_requests as f64
        }
    }
}

/// Exceptions reported in the engine log, grouped by message text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExceptionRecord {
    pub message: String,
    pub component: String,
    pub count: u64,
    pub first_occurrence_timestamp: String,
    /// At most [ExceptionRecord::MAX_STACK_TRACE_LINES] lines of the first occurrence's trace.
    pub truncated_stack_trace: Vec<String>,
}

impl ExceptionRecord {
    pub const MAX_STACK_TRACE_LINES: usize = 10;
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, derive_more::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// No run artifacts recorded.
    #[default]
    #[display("READY")]
    Ready,
    /// The engine process is live.
    #[display("RUNNING")]
    Running,
    /// The engine has exited, or was asked to stop, but no rows have been parsed yet.
    #[display("PROCESSING")]
    Processing,
    /// The engine has exited and the results stream has yielded data.
    #[display("COMPLETED")]
    Completed,
}

/// Where the aggregates in a [TelemetrySnapshot] came from.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    #[default]
    #[display("none")]
    None,
    #[display("live")]
    Live,
    #[display("cached")]
    Cached,
    #[display("placeholder")]
    Placeholder,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunArtifacts {
    pub patched_plan_path: PathBuf,
    pub results_path: PathBuf,
    pub log_path: PathBuf,
    pub report_path: PathBuf,
}

/// Point in time view of the active run, as served to a dashboard or CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySnapshot {
    pub status: RunStatus,
    pub run_id: Option<String>,
    pub source: SnapshotSource,
    pub scenario_snapshots: Vec<LabelAggregate>,
    pub overall_throughput: f64,
    pub failure_rate_percent: f64,
    pub total_requests: u64,
    pub total_failures: u64,
    pub active_threads: Option<u64>,
    pub observed_duration_sec: f64,
    pub exceptions: Vec<ExceptionRecord>,
    pub exit_code: Option<i32>,
    pub artifacts: Option<RunArtifacts>,
}
