use jawa_summary_model::{ExceptionRecord, LabelAggregate};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct AggregateRow {
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Requests")]
    requests: u64,
    #[tabled(rename = "Fails")]
    fails: u64,
    #[tabled(rename = "Median")]
    median: String,
    #[tabled(rename = "95%")]
    p95: u64,
    #[tabled(rename = "99%")]
    p99: u64,
    #[tabled(rename = "Avg")]
    avg: String,
    #[tabled(rename = "Min")]
    min: u64,
    #[tabled(rename = "Max")]
    max: u64,
    #[tabled(rename = "Avg size")]
    avg_size: String,
    #[tabled(rename = "Req/s")]
    rps: String,
    #[tabled(rename = "Fails/s")]
    failures_per_sec: String,
}

impl From<&LabelAggregate> for AggregateRow {
    fn from(a: &LabelAggregate) -> Self {
        Self {
            label: a.label.clone(),
            requests: a.request_count,
            fails: a.failure_count,
            median: float2(a.median),
            p95: a.p95,
            p99: a.p99,
            avg: float2(a.avg_elapsed),
            min: a.min,
            max: a.max,
            avg_size: float2(a.avg_bytes),
            rps: float2(a.throughput_per_sec),
            failures_per_sec: float2(a.failures_per_sec),
        }
    }
}

#[derive(Tabled)]
struct ExceptionRow {
    #[tabled(rename = "Count")]
    count: u64,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Component")]
    component: String,
    #[tabled(rename = "First seen")]
    first_seen: String,
}

/// Render per-label statistics, times in milliseconds.
pub fn aggregates_table(aggregates: &[LabelAggregate]) -> String {
    let mut table = Table::new(aggregates.iter().map(AggregateRow::from));
    table.with(Style::modern());
    table.to_string()
}

pub fn exceptions_table(exceptions: &[ExceptionRecord]) -> String {
    let mut table = Table::new(exceptions.iter().map(|e| ExceptionRow {
        count: e.count,
        message: e.message.clone(),
        component: e.component.clone(),
        first_seen: e.first_occurrence_timestamp.clone(),
    }));
    table.with(Style::modern());
    table.to_string()
}

fn float2(n: f64) -> String {
    format!("{:.2}", n)
}
