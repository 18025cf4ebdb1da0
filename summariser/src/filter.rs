use itertools::Itertools;
use jawa_summary_model::RunSummary;

/// Pick the most recent run for each plan and configuration fingerprint.
///
/// Returns `(plan name, fingerprint, summary)` ordered by plan name then fingerprint.
pub fn latest_run_summaries_by_plan_and_config(
    summary_runs: Vec<RunSummary>,
) -> Vec<(String, String, RunSummary)> {
    summary_runs
        .into_iter()
        .into_group_map_by(|summary| (summary.plan_name.clone(), summary.fingerprint()))
        .into_iter()
        .filter_map(|((name, fingerprint), summaries)| {
            summaries
                .into_iter()
                .max_by_key(|summary| summary.started_at)
                .map(|latest| (name, fingerprint, latest))
        })
        .sorted_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)))
        .collect::<Vec<_>>()
}
