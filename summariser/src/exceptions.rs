use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Context;
use jawa_summary_model::ExceptionRecord;
use regex::Regex;

static ERROR_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<timestamp>\d\S*(?:\s\d\S*)?)\s+ERROR\s+(?P<component>[^\s:]+):\s?(?P<message>.*)$")
        .expect("valid error line regex")
});

/// Parse the engine log at `path` into exception groups, most frequent first.
///
/// A missing log has no exceptions.
pub fn parse_exceptions(path: &Path) -> anyhow::Result<Vec<ExceptionRecord>> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::trace!("No log at {} yet", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to read log {}", path.display())),
    };

    Ok(exceptions_in(&String::from_utf8_lossy(&content)))
}

/// Group the `ERROR` entries of a log by message text.
///
/// Indented lines following an `ERROR` line are its stack trace. Any other non-empty line ends
/// the entry.
pub fn exceptions_in(log: &str) -> Vec<ExceptionRecord> {
    let mut groups = ExceptionGroups::default();
    let mut open: Option<ExceptionRecord> = None;

    for line in log.lines() {
        let line = line.trim_end_matches('\r');

        if let Some(caps) = ERROR_LINE.captures(line) {
            if let Some(record) = open.take() {
                groups.add(record);
            }
            open = Some(ExceptionRecord {
                message: caps["message"].trim_end().to_string(),
                component: caps["component"].to_string(),
                count: 1,
                first_occurrence_timestamp: caps["timestamp"].to_string(),
                truncated_stack_trace: Vec::new(),
            });
        } else if line.starts_with([' ', '\t']) {
            if let Some(record) = open.as_mut() {
                if record.truncated_stack_trace.len() < ExceptionRecord::MAX_STACK_TRACE_LINES {
                    record.truncated_stack_trace.push(line.trim().to_string());
                }
            }
        } else if !line.is_empty() {
            if let Some(record) = open.take() {
                groups.add(record);
            }
        }
    }
    if let Some(record) = open.take() {
        groups.add(record);
    }

    groups.into_sorted()
}

#[derive(Default)]
struct ExceptionGroups {
    by_message: HashMap<String, usize>,
    records: Vec<ExceptionRecord>,
}

impl ExceptionGroups {
    fn add(&mut self, record: ExceptionRecord) {
        match self.by_message.get(&record.message) {
            Some(&i) => {
                let existing = &mut self.records[i];
                existing.count += 1;
                if record.first_occurrence_timestamp < existing.first_occurrence_timestamp {
                    existing.first_occurrence_timestamp = record.first_occurrence_timestamp;
                }
                if existing.truncated_stack_trace.is_empty() {
                    existing.truncated_stack_trace = record.truncated_stack_trace;
                }
            }
            None => {
                self.by_message
                    .insert(record.message.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Descending count, ties stay in order of first appearance.
    fn into_sorted(mut self) -> Vec<ExceptionRecord> {
        self.records.sort_by(|a, b| b.count.cmp(&a.count));
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LOG: &str = "\
2024-05-01 10:00:00,100 INFO o.a.j.e.StandardJMeterEngine: Running the test!
2024-05-01 10:00:01,200 ERROR o.a.j.p.h.s.HTTPHCAbstractImpl: Connection refused
java.net.ConnectException: Connection refused
2024-05-01 10:00:02,300 ERROR o.a.j.t.JMeterThread: Test failed!
\tat org.apache.jmeter.threads.JMeterThread.run(JMeterThread.java:1)
\tat java.base/java.lang.Thread.run(Thread.java:2)

2024-05-01 10:00:03,400 ERROR o.a.j.p.h.s.HTTPJavaImpl: Connection refused
\tat sun.nio.ch.Net.connect(Net.java:3)
2024-05-01 10:00:04,500 WARN o.a.j.r.Summariser: slow
";

    #[test]
    fn identical_messages_are_merged() {
        let records = exceptions_in(LOG);

        assert_eq!(2, records.len());
        let refused = &records[0];
        assert_eq!("Connection refused", refused.message);
        assert_eq!(2, refused.count);
        assert_eq!("2024-05-01 10:00:01,200", refused.first_occurrence_timestamp);
        assert_eq!("o.a.j.p.h.s.HTTPHCAbstractImpl", refused.component);
        // The first occurrence was closed by a non-indented line before any trace arrived
        assert_eq!(
            vec!["at sun.nio.ch.Net.connect(Net.java:3)".to_string()],
            refused.truncated_stack_trace
        );

        let failed = &records[1];
        assert_eq!("Test failed!", failed.message);
        assert_eq!(1, failed.count);
        assert_eq!(2, failed.truncated_stack_trace.len());
    }

    #[test]
    fn earliest_timestamp_wins() {
        let log = "\
2024-05-01 10:00:05,000 ERROR a.B: Timeout
2024-05-01 09:59:00,000 ERROR c.D: Timeout
";
        let records = exceptions_in(log);
        assert_eq!(1, records.len());
        assert_eq!(2, records[0].count);
        assert_eq!("2024-05-01 09:59:00,000", records[0].first_occurrence_timestamp);
        assert_eq!("a.B", records[0].component);
    }

    #[test]
    fn stack_trace_is_capped() {
        let mut log = "2024-05-01 10:00:00,000 ERROR a.B: deep\n".to_string();
        for i in 0..25 {
            log.push_str(&format!("\tat frame{i}\n"));
        }
        let records = exceptions_in(&log);
        assert_eq!(ExceptionRecord::MAX_STACK_TRACE_LINES, records[0].truncated_stack_trace.len());
        assert_eq!("at frame9", records[0].truncated_stack_trace[9]);
    }

    #[test]
    fn missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(parse_exceptions(&dir.path().join("jmeter.log")).unwrap().is_empty());
    }
}
