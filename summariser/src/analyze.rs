use jawa_summary_model::{LabelAggregate, ResultRecord};

/// The value at index `floor(n * p)` of an ascending sample, clamped to the last element.
///
/// Returns `0` for an empty sample.
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let index = (sorted.len() as f64 * p).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// The central value of an ascending sample, or the mean of the two central values when the
/// sample size is even. This is deliberately not `percentile(sorted, 0.5)`.
pub fn median(sorted: &[u64]) -> f64 {
    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 0 => (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0,
        _ => sorted[n / 2] as f64,
    }
}

/// Requests per second over the span of observed timestamps.
///
/// When every sample landed in the same millisecond there is no span to divide by, so the rate
/// is estimated from the mean elapsed time instead.
pub fn throughput(count: u64, min_timestamp_ms: i64, max_timestamp_ms: i64, mean_elapsed_ms: f64) -> f64 {
    let duration_sec = observed_duration_sec(min_timestamp_ms, max_timestamp_ms);
    if duration_sec > 0.0 {
        count as f64 / duration_sec
    } else if mean_elapsed_ms > 0.0 {
        1000.0 / mean_elapsed_ms
    } else {
        0.0
    }
}

/// Seconds between the earliest and latest timestamp, saturating for timestamps at the ends of
/// the `i64` range.
pub fn observed_duration_sec(min_timestamp_ms: i64, max_timestamp_ms: i64) -> f64 {
    max_timestamp_ms.saturating_sub(min_timestamp_ms).max(0) as f64 / 1000.0
}

/// Timestamp span and mean elapsed time of a set of rows.
pub(crate) struct Span {
    pub min_timestamp_ms: i64,
    pub max_timestamp_ms: i64,
    pub mean_elapsed_ms: f64,
}

pub(crate) fn span<'a>(rows: impl IntoIterator<Item = &'a ResultRecord>) -> Option<Span> {
    let mut count = 0u64;
    let mut total_elapsed = 0u64;
    let mut min_timestamp_ms = i64::MAX;
    let mut max_timestamp_ms = i64::MIN;
    for row in rows {
        count += 1;
        total_elapsed = total_elapsed.saturating_add(row.elapsed_ms);
        min_timestamp_ms = min_timestamp_ms.min(row.timestamp_ms);
        max_timestamp_ms = max_timestamp_ms.max(row.timestamp_ms);
    }

    (count > 0).then(|| Span {
        min_timestamp_ms,
        max_timestamp_ms,
        mean_elapsed_ms: total_elapsed as f64 / count as f64,
    })
}

pub(crate) fn label_aggregate(label: &str, rows: &[&ResultRecord]) -> LabelAggregate {
    let Some(span) = span(rows.iter().copied()) else {
        return LabelAggregate::placeholder(label);
    };

    let mut elapsed = rows.iter().map(|r| r.elapsed_ms).collect::<Vec<_>>();
    elapsed.sort_unstable();

    let request_count = rows.len() as u64;
    let failure_count = rows.iter().filter(|r| !r.success).count() as u64;
    let total_bytes = rows.iter().fold(0u64, |total, r| total.saturating_add(r.bytes));
    let throughput_per_sec = throughput(
        request_count,
        span.min_timestamp_ms,
        span.max_timestamp_ms,
        span.mean_elapsed_ms,
    );
    let failure_ratio = failure_count as f64 / request_count as f64;

    LabelAggregate {
        label: label.to_string(),
        request_count,
        failure_count,
        min: elapsed[0],
        max: elapsed[elapsed.len() - 1],
        median: median(&elapsed),
        p90: percentile(&elapsed, 0.90),
        p95: percentile(&elapsed, 0.95),
        p99: percentile(&elapsed, 0.99),
        avg_elapsed: span.mean_elapsed_ms,
        avg_bytes: total_bytes as f64 / request_count as f64,
        throughput_per_sec,
        failures_per_sec: throughput_per_sec * failure_ratio,
        error_percent: 100.0 * failure_ratio,
    }
}
