use std::time::Duration;

use serde_json::Value;

use crate::TransportDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum SessionPolicy {
    /// One session per worker, established before the loop and reused for
    /// every request of that worker.
    Shared,
    /// Connect, handshake, invoke, close around every single request.
    PerRequest,
}

/// Independent budgets for the three blocking transport phases.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutBudget {
    pub connect: Duration,
    pub initialize: Duration,
    pub call: Duration,
}

impl Default for TimeoutBudget {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            initialize: Duration::from_secs(10),
            call: Duration::from_secs(30),
        }
    }
}

/// Immutable description of one load-test run. The caller validates it
/// before handing it over; the engine never mutates it.
#[derive(Debug, Clone)]
pub struct TestPlan {
    pub descriptor: TransportDescriptor,
    pub tool_name: String,
    pub tool_args: Value,
    pub workers: u64,
    pub duration: Duration,
    pub session_policy: SessionPolicy,
    /// Pause between consecutive requests of one worker. Clamped to the
    /// deadline so it never stretches the run.
    pub pause: Duration,
    pub timeouts: TimeoutBudget,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_policy_round_trips_kebab_case() {
        let shared: SessionPolicy = "shared"
            .parse()
            .unwrap_or_else(|_| panic!("expected `shared` to parse"));
        assert_eq!(shared, SessionPolicy::Shared);

        let per_request: SessionPolicy = "per-request"
            .parse()
            .unwrap_or_else(|_| panic!("expected `per-request` to parse"));
        assert_eq!(per_request, SessionPolicy::PerRequest);
        assert_eq!(per_request.to_string(), "per-request");

        assert!("per_request".parse::<SessionPolicy>().is_err());
    }
}
