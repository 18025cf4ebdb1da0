use anyhow::{anyhow, Context};
use chrono::Utc;
use jawa_summariser::filter::latest_run_summaries_by_plan_and_config;
use jawa_summary_model::{load_summary_runs, run_summary_path};
use log::debug;
use std::fs::File;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let ignore_errors = std::env::var("IGNORE_SUMMARY_ERRORS").is_ok();

    let summary_path = run_summary_path();
    debug!("Loading summary from {}", summary_path.display());
    let summary_runs = load_summary_runs(&summary_path).with_context(|| {
        format!("Failed to load run summaries from {}", summary_path.display())
    })?;

    let latest_by_config_summaries = latest_run_summaries_by_plan_and_config(summary_runs);

    for (name, fingerprint, summary) in &latest_by_config_summaries {
        log::debug!("Selected summary for {name} ({fingerprint}): {summary:?}");
    }

    let total_summaries = latest_by_config_summaries.len();
    let mut errors = vec![];
    let mut summary_outputs = vec![];

    for (_, _, summary) in latest_by_config_summaries {
        match jawa_summariser::summarize_run(summary) {
            Ok(output) => {
                log::info!(
                    "Summarised run {} of {}: {} requests, {} exception groups",
                    output.run_summary.run_id,
                    output.run_summary.plan_name,
                    output.results.total_requests,
                    output.exceptions.len()
                );
                summary_outputs.push(output);
            }
            Err(e) => {
                errors.push(e);
            }
        }
    }
    summary_outputs.sort_by_key(|r| r.run_summary.plan_name.clone());

    let report = File::create_new(format!(
        "summariser-report-{}.json",
        Utc::now().format("%Y-%m-%dT%H.%M.%S%.fZ")
    ))?;

    serde_json::to_writer_pretty(report, &summary_outputs)?;

    // If any of the summaries failed and errors should not explicitly be ignored, return an error
    if !errors.is_empty() {
        let error_message = format!(
            "{} out of {} summaries failed:\n{:#?}",
            errors.len(),
            total_summaries,
            errors
        );

        if ignore_errors {
            log::warn!("{}", error_message);
        } else {
            return Err(anyhow!(error_message));
        }
    }

    Ok(())
}
