use jawa_summariser::{aggregates_table, exceptions_table};
use jawa_summary_model::{ScenarioGroup, SnapshotSource, TelemetrySnapshot};
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Exception groups shown below the live statistics.
const LIVE_EXCEPTION_LIMIT: usize = 5;

#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "Scenario group")]
    name: String,
    #[tabled(rename = "Enabled")]
    enabled: bool,
}

pub fn groups_table(groups: &[ScenarioGroup]) -> String {
    let mut table = Table::new(groups.iter().map(|g| GroupRow {
        name: g.name.clone(),
        enabled: g.enabled,
    }));
    table.with(Style::modern());
    table.to_string()
}

/// One line describing where a run is at.
pub fn status_line(snapshot: &TelemetrySnapshot) -> String {
    let mut line = format!(
        "[{}] {} | {} requests | {:.2} req/s | {:.2}% failed | {:.0}s observed",
        snapshot.status,
        snapshot.run_id.as_deref().unwrap_or("-"),
        snapshot.total_requests,
        snapshot.overall_throughput,
        snapshot.failure_rate_percent,
        snapshot.observed_duration_sec,
    );
    if let Some(threads) = snapshot.active_threads {
        line.push_str(&format!(" | {threads} threads"));
    }
    match snapshot.source {
        SnapshotSource::Cached => line.push_str(" | waiting for new data"),
        SnapshotSource::Placeholder => line.push_str(" | no results yet"),
        SnapshotSource::Live | SnapshotSource::None => {}
    }
    line
}

pub fn print_snapshot(snapshot: &TelemetrySnapshot, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }

    println!("{}", status_line(snapshot));
    if !snapshot.scenario_snapshots.is_empty() {
        println!("{}", aggregates_table(&snapshot.scenario_snapshots));
    }
    if !snapshot.exceptions.is_empty() {
        let shown = snapshot.exceptions.len().min(LIVE_EXCEPTION_LIMIT);
        println!("{}", exceptions_table(&snapshot.exceptions[..shown]));
        if snapshot.exceptions.len() > shown {
            println!("... and {} more", snapshot.exceptions.len() - shown);
        }
    }
    Ok(())
}
