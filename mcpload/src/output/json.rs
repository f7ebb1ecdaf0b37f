use anyhow::Context as _;

use super::{OutputFormatter, ResultsDoc};

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_summary(&self, doc: &ResultsDoc<'_>) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(doc).context("failed to serialize results")?;
        println!("{text}");
        Ok(())
    }
}
