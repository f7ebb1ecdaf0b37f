use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use rand::SeedableRng as _;
use rand::rngs::SmallRng;
use tracing::{debug, warn};

use crate::Transport;

use super::counter::SequenceCounter;
use super::plan::{SessionPolicy, TestPlan};
use super::record::{ErrorCategory, RequestError, RequestRecord, WorkerOutcome};
use super::session::SessionManager;
use super::template::Template;

/// Everything one worker needs; cloned into each spawned task.
#[derive(Clone)]
pub struct WorkerContext {
    pub worker_id: u64,
    pub plan: Arc<TestPlan>,
    pub template: Arc<Template>,
    pub counter: Arc<SequenceCounter>,
    pub transport: Arc<dyn Transport>,
}

/// Runs one request stream until `deadline`. Always returns an outcome,
/// possibly empty: deadline reached, stopped early on a dead session, or
/// never started at all.
///
/// The deadline is checked before each new request; a request already in
/// flight is never cancelled there and finishes on its own call budget.
pub async fn run_worker(ctx: WorkerContext, deadline: Instant) -> WorkerOutcome {
    let mut outcome = WorkerOutcome::new(ctx.worker_id);
    let mut sessions = SessionManager::new(
        ctx.transport.clone(),
        ctx.plan.session_policy,
        ctx.plan.timeouts,
    );
    let mut rng = SmallRng::from_os_rng();

    if let Err(first) = sessions.begin_worker_session().await {
        debug!(
            worker = ctx.worker_id,
            error = %first,
            "session establishment failed, retrying once"
        );
        if let Err(err) = sessions.begin_worker_session().await {
            warn!(worker = ctx.worker_id, error = %err, "worker never got a session");
            outcome.failed_to_start = true;
            outcome.sessions_created = sessions.sessions_created();
            return outcome;
        }
    }

    loop {
        if Instant::now() >= deadline {
            break;
        }

        let sequence = ctx.counter.next();
        let sent_at = SystemTime::now();
        let started = Instant::now();

        let args = match ctx.template.expand(sequence, &mut rng) {
            Ok(args) => args,
            Err(err) => {
                // Never reaches the transport; still a failure in the report.
                outcome
                    .records
                    .push(RequestRecord::failure(sequence, sent_at, None, err.into()));
                pause_until(deadline, ctx.plan.pause).await;
                continue;
            }
        };

        let mut lease = match sessions.obtain_for_request().await {
            Ok(lease) => lease,
            Err(err) => {
                outcome.records.push(RequestRecord::failure(
                    sequence,
                    sent_at,
                    None,
                    RequestError::from(&err),
                ));
                pause_until(deadline, ctx.plan.pause).await;
                continue;
            }
        };

        let result = lease
            .call_tool(&ctx.plan.tool_name, &args, ctx.plan.timeouts.call)
            .await;
        sessions.release_after_request(lease).await;
        let elapsed = started.elapsed();

        match result {
            Ok(_) => outcome
                .records
                .push(RequestRecord::success(sequence, sent_at, elapsed)),
            Err(err) => {
                let latency = err.replied().then_some(elapsed);
                let request_err = RequestError::from(&err);
                let session_fatal = ctx.plan.session_policy == SessionPolicy::Shared
                    && matches!(
                        request_err.category,
                        ErrorCategory::Connection | ErrorCategory::SessionInit
                    );
                outcome
                    .records
                    .push(RequestRecord::failure(sequence, sent_at, latency, request_err));

                if session_fatal {
                    if let Err(err) = sessions.reestablish().await {
                        warn!(
                            worker = ctx.worker_id,
                            error = %err,
                            "session re-establishment failed, stopping worker"
                        );
                        outcome.stopped_early = true;
                        break;
                    }
                }
            }
        }

        pause_until(deadline, ctx.plan.pause).await;
    }

    sessions.end_worker_session().await;
    outcome.sessions_created = sessions.sessions_created();
    outcome
}

/// Naps for the configured pause, clamped to the deadline.
async fn pause_until(deadline: Instant, pause: Duration) {
    if pause.is_zero() {
        return;
    }
    let nap = pause.min(deadline.saturating_duration_since(Instant::now()));
    if !nap.is_zero() {
        tokio::time::sleep(nap).await;
    }
}
