//! Parsing of the engine's CSV results stream.
//!
//! The engine appends one row per completed sample while the run is in progress, so the file may
//! end part-way through a row at any moment. Everything after the last complete row is ignored.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use jawa_summary_model::{ResultRecord, ResultsSummary};

use crate::analyze::{label_aggregate, observed_duration_sec, span, throughput};

/// Column positions of the engine's default CSV layout.
pub mod columns {
    pub const TIMESTAMP: usize = 0;
    pub const ELAPSED: usize = 1;
    pub const LABEL: usize = 2;
    pub const RESPONSE_CODE: usize = 3;
    pub const RESPONSE_MESSAGE: usize = 4;
    pub const THREAD_NAME: usize = 5;
    pub const SUCCESS: usize = 7;
    pub const FAILURE_MESSAGE: usize = 8;
    pub const BYTES: usize = 9;
    pub const ALL_THREADS: usize = 12;
}

/// Rows with fewer fields than this are dropped.
pub const MIN_FIELDS: usize = columns::BYTES + 1;

const ERROR_LABEL_PREFIX: &str = "[ERROR]";
const DEFAULT_FAILURE_MESSAGE: &str = "Unknown error";

/// Parse the results file at `path`.
///
/// A missing file is not an error, it just has no data yet.
pub fn parse_results(path: &Path) -> anyhow::Result<ResultsSummary> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::trace!("No results at {} yet", path.display());
            return Ok(ResultsSummary::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read results {}", path.display()))
        }
    };

    let records = read_records(&content);
    log::debug!("Parsed {} rows from {}", records.len(), path.display());
    Ok(summarize_records(&records))
}

/// Parse every complete row of a results stream.
///
/// The header row, malformed rows and a trailing partial row are skipped.
pub fn read_records(content: &[u8]) -> Vec<ResultRecord> {
    let complete = &content[..complete_len(content)];

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(complete);

    reader
        .byte_records()
        .filter_map(|record| match record {
            Ok(record) => parse_record(&record),
            Err(e) => {
                log::trace!("Skipping unreadable results row: {e}");
                None
            }
        })
        .collect()
}

/// Aggregate rows per label, in order of the label's first appearance.
pub fn summarize_records(records: &[ResultRecord]) -> ResultsSummary {
    let Some(overall) = span(records) else {
        return ResultsSummary::default();
    };

    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut buckets: Vec<(&str, Vec<&ResultRecord>)> = Vec::new();
    for record in records {
        let slot = *index.entry(record.label.as_str()).or_insert_with(|| {
            buckets.push((record.label.as_str(), Vec::new()));
            buckets.len() - 1
        });
        buckets[slot].1.push(record);
    }

    let total_requests = records.len() as u64;
    ResultsSummary {
        aggregates: buckets
            .iter()
            .map(|(label, rows)| label_aggregate(label, rows))
            .collect(),
        overall_throughput_per_sec: throughput(
            total_requests,
            overall.min_timestamp_ms,
            overall.max_timestamp_ms,
            overall.mean_elapsed_ms,
        ),
        observed_duration_sec: observed_duration_sec(
            overall.min_timestamp_ms,
            overall.max_timestamp_ms,
        ),
        total_requests,
        total_failures: records.iter().filter(|r| !r.success).count() as u64,
        active_threads: records.last().and_then(|r| r.all_threads),
    }
}

/// Length of the prefix of `content` that ends with a complete row.
///
/// A row ends at a line break that is not inside a quoted field. Escaped quotes (`""`) toggle the
/// quoting state twice, so they don't need special handling.
fn complete_len(content: &[u8]) -> usize {
    let mut quoted = false;
    let mut end = 0;
    for (i, byte) in content.iter().enumerate() {
        match byte {
            b'"' => quoted = !quoted,
            b'\n' if !quoted => end = i + 1,
            _ => {}
        }
    }
    end
}

fn parse_record(record: &csv::ByteRecord) -> Option<ResultRecord> {
    if record.len() < MIN_FIELDS {
        log::trace!("Skipping results row with {} fields", record.len());
        return None;
    }

    let text = |index: usize| field(record, index);

    // Also skips the header row
    let timestamp_ms = text(columns::TIMESTAMP).trim().parse::<i64>().ok()?;
    let elapsed_ms = text(columns::ELAPSED).trim().parse::<u64>().ok()?;

    let failure_message = text(columns::FAILURE_MESSAGE).into_owned();
    let label = match text(columns::LABEL) {
        label if label.trim().is_empty() => error_label(&failure_message),
        label => label.into_owned(),
    };

    Some(ResultRecord {
        timestamp_ms,
        elapsed_ms,
        label,
        success: text(columns::SUCCESS).trim().eq_ignore_ascii_case("true"),
        response_code: text(columns::RESPONSE_CODE).into_owned(),
        response_message: text(columns::RESPONSE_MESSAGE).into_owned(),
        thread_name: text(columns::THREAD_NAME).into_owned(),
        failure_message,
        bytes: text(columns::BYTES).trim().parse().unwrap_or_default(),
        all_threads: record
            .get(columns::ALL_THREADS)
            .and_then(|v| std::str::from_utf8(v).ok())
            .and_then(|v| v.trim().parse().ok()),
    })
}

fn field(record: &csv::ByteRecord, index: usize) -> Cow<'_, str> {
    String::from_utf8_lossy(record.get(index).unwrap_or_default())
}

/// Label for a row that arrived without one, so that it still shows up in the aggregates.
fn error_label(failure_message: &str) -> String {
    let message = failure_message.trim();
    let message = if message.is_empty() {
        DEFAULT_FAILURE_MESSAGE
    } else {
        message
    };
    format!("{ERROR_LABEL_PREFIX} {message}")
}
