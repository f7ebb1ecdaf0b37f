use anyhow::Context as _;

use super::{OutputFormatter, ResultsDoc};

pub(crate) struct YamlOutput;

impl OutputFormatter for YamlOutput {
    fn print_summary(&self, doc: &ResultsDoc<'_>) -> anyhow::Result<()> {
        let text = serde_yaml::to_string(doc).context("failed to serialize results")?;
        print!("{text}");
        Ok(())
    }
}
