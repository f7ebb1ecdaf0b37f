use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tracing::{info, warn};

use crate::Transport;

use super::aggregate::{AggregateReport, aggregate};
use super::counter::SequenceCounter;
use super::error::Result;
use super::plan::TestPlan;
use super::template::Template;
use super::worker::{WorkerContext, run_worker};

/// Executes a validated plan: parses the argument template once, spawns
/// the workers, waits for every one of them (the join barrier), then
/// aggregates.
///
/// In-flight calls are bounded by their own timeout, so the join
/// completes no later than the deadline plus one call budget.
pub async fn run_plan(plan: TestPlan, transport: Arc<dyn Transport>) -> Result<AggregateReport> {
    let template = Arc::new(Template::parse(&plan.tool_args));
    let counter = Arc::new(SequenceCounter::new());
    let plan = Arc::new(plan);

    info!(
        workers = plan.workers,
        duration = ?plan.duration,
        policy = %plan.session_policy,
        tool = %plan.tool_name,
        "starting load test"
    );

    let run_start = SystemTime::now();
    let deadline = Instant::now() + plan.duration;

    let mut handles = Vec::with_capacity(plan.workers as usize);
    for worker_id in 1..=plan.workers {
        let ctx = WorkerContext {
            worker_id,
            plan: plan.clone(),
            template: template.clone(),
            counter: counter.clone(),
            transport: transport.clone(),
        };
        handles.push(tokio::spawn(run_worker(ctx, deadline)));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        outcomes.push(handle.await?);
    }
    let run_end = SystemTime::now();

    for outcome in &outcomes {
        if outcome.failed_to_start {
            warn!(worker = outcome.worker_id, "worker never established a session");
        } else if outcome.stopped_early {
            warn!(
                worker = outcome.worker_id,
                requests = outcome.records.len(),
                "worker stopped before the deadline"
            );
        }
    }

    info!(
        requests = counter.issued(),
        workers = outcomes.len(),
        "load test finished"
    );

    Ok(aggregate(&outcomes, run_start, run_end))
}
