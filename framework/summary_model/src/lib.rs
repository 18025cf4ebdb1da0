use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::HashMap;
use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};

mod telemetry;

pub use telemetry::{
    ExceptionRecord, LabelAggregate, ResultRecord, ResultsSummary, RunArtifacts, RunStatus,
    SamplerRef, ScenarioGroup, SnapshotSource, TelemetrySnapshot,
};

/// How a run decides when to stop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum Termination {
    /// Each thread runs the plan this many times.
    Iterations(u64),
    /// Threads keep running for this many seconds.
    Duration(u64),
}

/// Summary of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The run id
    ///
    /// The timestamp token used to namespace the results file, log file and report directory.
    pub run_id: String,
    /// File name of the plan document the run was started from
    pub plan_name: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// Name of the target environment, selects the property files passed to the engine
    pub environment: String,
    /// The number of simulated users per scenario group
    pub users: u64,
    pub ramp_up_secs: u64,
    pub termination: Termination,
    /// Identifiers of the scenario groups that were enabled for this run
    pub scenario_set: Vec<String>,
    /// Remote engine hosts, empty for a local run
    pub remote_hosts: Vec<String>,
    /// Properties passed through to the engine
    pub overrides: HashMap<String, String>,
    pub results_path: PathBuf,
    pub log_path: PathBuf,
    pub report_path: PathBuf,
    /// Exit code of the engine, if it exited on its own
    pub exit_code: Option<i32>,
    /// The version of Jawa that was used for this run
    pub jawa_version: String,
}

impl RunSummary {
    /// Compute a fingerprint for this run summary
    ///
    /// The fingerprint is intended to uniquely identify the configuration used for the run.
    /// It uses the
    ///     - Plan name
    ///     - Environment
    ///     - Users, ramp up and termination
    ///     - Selected scenario groups
    ///     - Overrides
    ///     - Jawa version
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.plan_name.as_bytes());
        Digest::update(&mut hasher, self.environment.as_bytes());
        Digest::update(&mut hasher, self.users.to_le_bytes());
        Digest::update(&mut hasher, self.ramp_up_secs.to_le_bytes());
        match self.termination {
            Termination::Iterations(n) => {
                Digest::update(&mut hasher, b"iterations");
                Digest::update(&mut hasher, n.to_le_bytes());
            }
            Termination::Duration(secs) => {
                Digest::update(&mut hasher, b"duration");
                Digest::update(&mut hasher, secs.to_le_bytes());
            }
        }
        self.scenario_set.iter().sorted().for_each(|s| {
            Digest::update(&mut hasher, s.as_bytes());
        });
        self.overrides
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.as_bytes());
            });
        Digest::update(&mut hasher, self.jawa_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Environment variable name to set a custom run summary file path
pub const RUN_SUMMARY_PATH_ENV: &str = "RUN_SUMMARY_PATH";
/// Default path for the run summary file
pub const DEFAULT_RUN_SUMMARY_PATH: &str = "run_summary.jsonl";

/// The run history file, from [RUN_SUMMARY_PATH_ENV] or [DEFAULT_RUN_SUMMARY_PATH].
pub fn run_summary_path() -> PathBuf {
    std::env::var(RUN_SUMMARY_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_RUN_SUMMARY_PATH))
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_summary)?;
    Ok(())
}

/// Load a run summary from a reader
pub fn load_run_summary<R: Read>(reader: R) -> anyhow::Result<RunSummary> {
    let reader = std::io::BufReader::new(reader);
    let run_summary: RunSummary = serde_json::from_reader(reader)?;
    Ok(run_summary)
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary]. Blank lines are skipped.
pub fn load_summary_runs(path: &Path) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunSummary = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}
