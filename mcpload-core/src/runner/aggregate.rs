use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use super::record::WorkerOutcome;

/// Final report of a run. Field names and nesting are a stable contract
/// for external formatters.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub requests_sent: u64,
    pub requests_received: u64,
    pub successes: u64,
    pub failures: u64,
    pub sessions_created: u64,
    pub execution_time: ExecutionTime,
    pub response_times: ResponseTimes,
    pub throughput: Throughput,
    /// Failure counts keyed by literal error message. Ordered map so
    /// identical inputs serialize identically.
    pub error_summary: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ExecutionTime {
    pub total_seconds: f64,
    pub start_time: f64,
    pub end_time: f64,
}

/// Over received requests only; all zero when nothing came back.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResponseTimes {
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Throughput {
    pub requests_per_second: f64,
    pub successes_per_second: f64,
}

/// Merges all worker outcomes into one report. Pure and deterministic:
/// the same outcomes and window always produce identical numbers.
#[must_use]
pub fn aggregate(
    outcomes: &[WorkerOutcome],
    run_start: SystemTime,
    run_end: SystemTime,
) -> AggregateReport {
    let mut requests_sent = 0u64;
    let mut requests_received = 0u64;
    let mut successes = 0u64;
    let mut failures = 0u64;
    let mut sessions_created = 0u64;
    let mut error_summary: BTreeMap<String, u64> = BTreeMap::new();

    let mut latency_sum = Duration::ZERO;
    let mut latency_min: Option<Duration> = None;
    let mut latency_max: Option<Duration> = None;

    for outcome in outcomes {
        sessions_created += outcome.sessions_created;
        for record in &outcome.records {
            requests_sent += 1;
            if let Some(latency) = record.latency {
                requests_received += 1;
                latency_sum += latency;
                latency_min = Some(latency_min.map_or(latency, |min| min.min(latency)));
                latency_max = Some(latency_max.map_or(latency, |max| max.max(latency)));
            }
            match &record.error {
                None => successes += 1,
                Some(err) => {
                    failures += 1;
                    *error_summary.entry(err.message.clone()).or_insert(0) += 1;
                }
            }
        }
    }

    let total_seconds = run_end
        .duration_since(run_start)
        .unwrap_or_default()
        .as_secs_f64();

    let response_times = ResponseTimes {
        min_ms: latency_min.map_or(0.0, to_millis),
        max_ms: latency_max.map_or(0.0, to_millis),
        avg_ms: if requests_received == 0 {
            0.0
        } else {
            to_millis(latency_sum) / requests_received as f64
        },
    };

    let throughput = if total_seconds > 0.0 {
        Throughput {
            requests_per_second: requests_received as f64 / total_seconds,
            successes_per_second: successes as f64 / total_seconds,
        }
    } else {
        Throughput {
            requests_per_second: 0.0,
            successes_per_second: 0.0,
        }
    };

    AggregateReport {
        requests_sent,
        requests_received,
        successes,
        failures,
        sessions_created,
        execution_time: ExecutionTime {
            total_seconds,
            start_time: unix_seconds(run_start),
            end_time: unix_seconds(run_end),
        },
        response_times,
        throughput,
        error_summary,
    }
}

fn to_millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

fn unix_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::record::{ErrorCategory, RequestError, RequestRecord};
    use std::time::Duration;

    fn window(seconds: u64) -> (SystemTime, SystemTime) {
        let start = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        (start, start + Duration::from_secs(seconds))
    }

    fn failure(message: &str) -> RequestError {
        RequestError {
            category: ErrorCategory::ToolInvocation,
            message: message.to_string(),
        }
    }

    #[test]
    fn zero_outcomes_produce_an_all_zero_report() {
        let (start, end) = window(2);
        let report = aggregate(&[], start, end);

        assert_eq!(report.requests_sent, 0);
        assert_eq!(report.requests_received, 0);
        assert_eq!(report.successes, 0);
        assert_eq!(report.failures, 0);
        assert_eq!(report.sessions_created, 0);
        assert_eq!(report.response_times.min_ms, 0.0);
        assert_eq!(report.response_times.max_ms, 0.0);
        assert_eq!(report.response_times.avg_ms, 0.0);
        assert_eq!(report.throughput.requests_per_second, 0.0);
        assert!(report.error_summary.is_empty());
    }

    #[test]
    fn counts_and_latency_follow_the_records() {
        let (start, end) = window(2);
        let sent = start;

        let mut a = WorkerOutcome::new(1);
        a.sessions_created = 1;
        a.records.push(RequestRecord::success(1, sent, Duration::from_millis(10)));
        a.records.push(RequestRecord::success(2, sent, Duration::from_millis(30)));

        let mut b = WorkerOutcome::new(2);
        b.sessions_created = 1;
        // Replied tool error: received, contributes latency.
        b.records.push(RequestRecord::failure(
            3,
            sent,
            Some(Duration::from_millis(20)),
            failure("tool returned an error: boom"),
        ));
        // Timeout: failed and never received.
        b.records.push(RequestRecord::failure(
            4,
            sent,
            None,
            failure("tool call timed out after 1s"),
        ));

        let report = aggregate(&[a, b], start, end);

        assert_eq!(report.requests_sent, 4);
        assert_eq!(report.requests_received, 3);
        assert_eq!(report.successes, 2);
        assert_eq!(report.failures, 2);
        assert_eq!(report.sessions_created, 2);
        assert_eq!(report.requests_sent, report.successes + report.failures);

        assert_eq!(report.response_times.min_ms, 10.0);
        assert_eq!(report.response_times.max_ms, 30.0);
        assert_eq!(report.response_times.avg_ms, 20.0);

        assert_eq!(report.execution_time.total_seconds, 2.0);
        assert_eq!(report.throughput.requests_per_second, 1.5);
        assert_eq!(report.throughput.successes_per_second, 1.0);
    }

    #[test]
    fn identical_messages_merge_distinct_messages_do_not() {
        let (start, end) = window(1);
        let mut outcome = WorkerOutcome::new(1);
        for sequence in 1..=3 {
            outcome.records.push(RequestRecord::failure(
                sequence,
                start,
                None,
                failure("connection refused"),
            ));
        }
        outcome.records.push(RequestRecord::failure(
            4,
            start,
            None,
            failure("connection reset"),
        ));

        let report = aggregate(&[outcome], start, end);
        assert_eq!(report.error_summary.len(), 2);
        assert_eq!(report.error_summary.get("connection refused"), Some(&3));
        assert_eq!(report.error_summary.get("connection reset"), Some(&1));
    }

    #[test]
    fn aggregation_is_deterministic() {
        let (start, end) = window(3);
        let mut outcome = WorkerOutcome::new(1);
        outcome.sessions_created = 1;
        outcome.records.push(RequestRecord::success(1, start, Duration::from_millis(7)));
        outcome.records.push(RequestRecord::failure(
            2,
            start,
            None,
            failure("boom"),
        ));
        let outcomes = [outcome];

        let first = serde_json::to_string(&aggregate(&outcomes, start, end))
            .unwrap_or_else(|err| panic!("report should serialize: {err}"));
        let second = serde_json::to_string(&aggregate(&outcomes, start, end))
            .unwrap_or_else(|err| panic!("report should serialize: {err}"));
        assert_eq!(first, second);
    }

    #[test]
    fn report_serializes_with_the_contract_field_names() {
        let (start, end) = window(1);
        let value = serde_json::to_value(aggregate(&[], start, end))
            .unwrap_or_else(|err| panic!("report should serialize: {err}"));

        for field in [
            "requests_sent",
            "requests_received",
            "successes",
            "failures",
            "sessions_created",
            "execution_time",
            "response_times",
            "throughput",
            "error_summary",
        ] {
            assert!(value.get(field).is_some(), "missing field `{field}`");
        }
        assert!(value["execution_time"].get("total_seconds").is_some());
        assert!(value["execution_time"].get("start_time").is_some());
        assert!(value["execution_time"].get("end_time").is_some());
        assert!(value["response_times"].get("min_ms").is_some());
        assert!(value["response_times"].get("max_ms").is_some());
        assert!(value["response_times"].get("avg_ms").is_some());
        assert!(value["throughput"].get("requests_per_second").is_some());
        assert!(value["throughput"].get("successes_per_second").is_some());
    }
}
