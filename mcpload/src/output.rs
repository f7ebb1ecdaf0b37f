use std::path::Path;

use anyhow::Context as _;
use serde::Serialize;

use mcpload_core::runner::AggregateReport;

use crate::cli::OutputFormat;
use crate::config::ConfigFile;

mod human;
mod json;
mod yaml;

/// Full results document: the configuration as loaded plus the report.
#[derive(Debug, Serialize)]
pub struct ResultsDoc<'a> {
    pub test_config: &'a ConfigFile,
    pub results: &'a AggregateReport,
}

pub(crate) trait OutputFormatter {
    fn print_summary(&self, doc: &ResultsDoc<'_>) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput),
        OutputFormat::Yaml => Box::new(yaml::YamlOutput),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}

/// Results files are always YAML, independent of the stdout format.
pub(crate) fn write_results_file(path: &Path, doc: &ResultsDoc<'_>) -> anyhow::Result<()> {
    let text = serde_yaml::to_string(doc).context("failed to serialize results")?;
    std::fs::write(path, text)
        .with_context(|| format!("failed to write results file: {}", path.display()))
}
