use std::fmt::Write as _;
use std::time::Duration;

use super::{OutputFormatter, ResultsDoc};

pub(crate) struct HumanReadableOutput;

impl OutputFormatter for HumanReadableOutput {
    fn print_summary(&self, doc: &ResultsDoc<'_>) -> anyhow::Result<()> {
        print!("{}", render(doc));
        Ok(())
    }
}

fn render(doc: &ResultsDoc<'_>) -> String {
    let r = doc.results;
    let mut out = String::new();

    out.push_str("summary\n");
    writeln!(
        &mut out,
        "  requests: {} sent, {} received ({} ok, {} failed)",
        r.requests_sent, r.requests_received, r.successes, r.failures
    )
    .ok();
    writeln!(&mut out, "  sessions: {}", r.sessions_created).ok();
    writeln!(
        &mut out,
        "  duration: {}",
        humantime::format_duration(Duration::from_millis(
            (r.execution_time.total_seconds * 1000.0) as u64
        ))
    )
    .ok();

    if r.requests_received > 0 {
        writeln!(
            &mut out,
            "  latency = min={:.1}ms avg={:.1}ms max={:.1}ms",
            r.response_times.min_ms, r.response_times.avg_ms, r.response_times.max_ms
        )
        .ok();
    } else {
        out.push_str("  latency: n/a\n");
    }

    writeln!(
        &mut out,
        "  throughput: {:.1} req/s ({:.1} ok/s)",
        r.throughput.requests_per_second, r.throughput.successes_per_second
    )
    .ok();

    if !r.error_summary.is_empty() {
        out.push_str("errors\n");
        let mut entries: Vec<_> = r.error_summary.iter().collect();
        entries.sort_by(|(a_msg, a_count), (b_msg, b_count)| {
            b_count.cmp(a_count).then_with(|| a_msg.as_str().cmp(b_msg.as_str()))
        });
        for (message, count) in entries {
            writeln!(&mut out, "  {message}: {count}").ok();
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigFile, Overrides};
    use mcpload_core::runner::aggregate;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn renders_an_empty_run_without_panicking() -> anyhow::Result<()> {
        let config: ConfigFile = serde_yaml::from_str(
            "server:\n  transport: streamable_http\ntest:\n  tool_name: echo\n",
        )?;
        // Keep the config valid so the fixture stays honest.
        config.clone().into_plan(Overrides::default())?;

        let start = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let report = aggregate(&[], start, start + Duration::from_secs(2));
        let doc = ResultsDoc {
            test_config: &config,
            results: &report,
        };

        let text = render(&doc);
        assert!(text.contains("0 sent"));
        assert!(text.contains("latency: n/a"));
        Ok(())
    }
}
