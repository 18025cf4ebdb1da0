use jawa_summariser::{parse_exceptions, parse_results};
use jawa_summary_model::{LabelAggregate, ResultsSummary, SnapshotSource, TelemetrySnapshot};

use crate::error::LifecycleResult;
use crate::lifecycle::{RunLifecycle, RunState};
use crate::request::RunRequest;

/// Serves point in time snapshots of the run owned by its [RunLifecycle].
pub struct TelemetryFacade {
    lifecycle: RunLifecycle,
}

impl TelemetryFacade {
    pub fn new(lifecycle: RunLifecycle) -> Self {
        Self { lifecycle }
    }

    pub fn lifecycle(&self) -> &RunLifecycle {
        &self.lifecycle
    }

    pub fn start(&mut self, request: RunRequest) -> LifecycleResult<&RunState> {
        self.lifecycle.start(request)
    }

    pub fn stop(&mut self) {
        self.lifecycle.stop();
    }

    pub fn reset(&mut self) {
        self.lifecycle.reset();
    }

    /// Parse the run's output as it is right now.
    ///
    /// Rows from the current parse are preferred, then the last parse that had rows, then empty
    /// entries for every label the plan is expected to produce.
    pub fn snapshot(&mut self) -> TelemetrySnapshot {
        let Some(state) = self.lifecycle.state() else {
            return TelemetrySnapshot::default();
        };

        let live = parse_results(&state.artifacts.results_path).unwrap_or_else(|e| {
            log::warn!("Treating unreadable results as no new data: {e:#}");
            ResultsSummary::default()
        });
        let exceptions = parse_exceptions(&state.artifacts.log_path).unwrap_or_else(|e| {
            log::warn!("Failed to read exceptions: {e:#}");
            Vec::new()
        });

        self.lifecycle.record_parse(&live);
        let status = self.lifecycle.refresh();
        let Some(state) = self.lifecycle.state() else {
            return TelemetrySnapshot::default();
        };

        let (source, summary) = if !live.is_empty() {
            (SnapshotSource::Live, live)
        } else if let Some(cached) = &state.last_good_snapshot {
            (SnapshotSource::Cached, cached.clone())
        } else if !state.placeholder_labels().is_empty() {
            let summary = ResultsSummary {
                aggregates: state
                    .placeholder_labels()
                    .iter()
                    .map(LabelAggregate::placeholder)
                    .collect(),
                ..Default::default()
            };
            (SnapshotSource::Placeholder, summary)
        } else {
            (SnapshotSource::None, ResultsSummary::default())
        };

        TelemetrySnapshot {
            status,
            run_id: Some(state.run_id.clone()),
            source,
            overall_throughput: summary.overall_throughput_per_sec,
            failure_rate_percent: summary.failure_rate_percent(),
            total_requests: summary.total_requests,
            total_failures: summary.total_failures,
            active_threads: summary.active_threads,
            observed_duration_sec: summary.observed_duration_sec,
            scenario_snapshots: summary.aggregates,
            exceptions,
            exit_code: state.exit_code,
            artifacts: Some(state.artifacts.clone()),
        }
    }
}
