use std::sync::Arc;

use tracing::info;

use mcpload_core::HttpTransport;
use mcpload_core::runner::run_plan;

use crate::cli::RunArgs;
use crate::config::{self, Overrides};
use crate::output::{self, ResultsDoc};
use crate::run_error::RunError;

pub async fn run(args: RunArgs) -> Result<(), RunError> {
    init_logging(args.verbose);

    let config = config::load(&args.config)
        .await
        .map_err(RunError::InvalidInput)?;

    let overrides = Overrides {
        workers: args.workers,
        duration: args.duration,
    };
    let plan = config
        .clone()
        .into_plan(overrides)
        .map_err(RunError::InvalidInput)?;

    info!(
        url = %plan.descriptor.url(),
        tool = %plan.tool_name,
        workers = plan.workers,
        duration = %humantime::format_duration(plan.duration),
        "configured"
    );

    let transport = Arc::new(HttpTransport::new(plan.descriptor.clone()));
    let report = run_plan(plan, transport)
        .await
        .map_err(|err| RunError::RuntimeError(err.into()))?;

    let doc = ResultsDoc {
        test_config: &config,
        results: &report,
    };

    if let Some(path) = &args.out {
        output::write_results_file(path, &doc).map_err(RunError::RuntimeError)?;
        info!(path = %path.display(), "results written");
    }

    output::formatter(args.output)
        .print_summary(&doc)
        .map_err(RunError::RuntimeError)?;

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose {
        "mcpload=debug,mcpload_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
