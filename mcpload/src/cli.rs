use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"))?;

    match unit_str.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => {
            let secs = value
                .checked_mul(60)
                .and_then(|v| v.checked_mul(60))
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        )),
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    HumanReadable,
    /// Full results document as YAML.
    Yaml,
    /// Full results document as pretty-printed JSON.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "mcpload",
    author,
    version,
    about = "Load testing tool for MCP tool servers",
    long_about = "mcpload runs a timed, concurrent load test against an MCP server and reports throughput, latency, and failure statistics.\n\nA YAML config describes the server endpoint and the test: which tool to call, with which (templated) arguments, how many workers, and for how long. Argument templates may use {{counter}}, {{timestamp}}, and {{random.randint(min,max)}}.",
    after_help = "Examples:\n  mcpload run --config test.yaml\n  mcpload run --config test.yaml --workers 50 --duration 30s\n  mcpload run --config test.yaml -o results.yaml --output yaml"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a load test described by a YAML config
    #[command(
        long_about = "Run a load test. CLI flags override values from the config file."
    )]
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the YAML test configuration
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: PathBuf,

    /// Write the full results document to this file (YAML)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Override the number of concurrent workers
    #[arg(long)]
    pub workers: Option<u64>,

    /// Override the test duration (e.g. 30s, 2m)
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Stdout format for the results
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
