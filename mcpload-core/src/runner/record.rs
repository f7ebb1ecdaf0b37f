use std::time::{Duration, SystemTime};

use crate::TransportError;

use super::template::TemplateError;

/// Failure classification, stable across the report surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    Connection,
    SessionInit,
    ToolInvocation,
    TemplateExpansion,
}

#[derive(Debug, Clone)]
pub struct RequestError {
    pub category: ErrorCategory,
    pub message: String,
}

impl From<&TransportError> for RequestError {
    fn from(err: &TransportError) -> Self {
        let category = match err {
            TransportError::Connect(_) | TransportError::ConnectTimeout(_) => {
                ErrorCategory::Connection
            }
            TransportError::Initialize(_) | TransportError::InitializeTimeout(_) => {
                ErrorCategory::SessionInit
            }
            TransportError::Tool(_)
            | TransportError::ToolTimeout(_)
            | TransportError::ToolRejected(_) => ErrorCategory::ToolInvocation,
        };
        Self {
            category,
            message: err.to_string(),
        }
    }
}

impl From<TemplateError> for RequestError {
    fn from(err: TemplateError) -> Self {
        Self {
            category: ErrorCategory::TemplateExpansion,
            message: err.to_string(),
        }
    }
}

/// One attempt. Immutable once recorded; owned by the worker that made
/// it until aggregation.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub sequence: u64,
    pub sent_at: SystemTime,
    /// Time to the reply. `None` when no reply ever arrived.
    pub latency: Option<Duration>,
    pub error: Option<RequestError>,
}

impl RequestRecord {
    #[must_use]
    pub fn success(sequence: u64, sent_at: SystemTime, latency: Duration) -> Self {
        Self {
            sequence,
            sent_at,
            latency: Some(latency),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(
        sequence: u64,
        sent_at: SystemTime,
        latency: Option<Duration>,
        error: RequestError,
    ) -> Self {
        Self {
            sequence,
            sent_at,
            latency,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// A request counts as received only if a reply came back. Replied
    /// tool errors qualify; timeouts and connection losses do not.
    #[must_use]
    pub fn received(&self) -> bool {
        self.latency.is_some()
    }

    #[must_use]
    pub fn received_at(&self) -> Option<SystemTime> {
        self.latency.map(|latency| self.sent_at + latency)
    }
}

/// Everything one worker produced, in issue order.
#[derive(Debug, Default)]
pub struct WorkerOutcome {
    pub worker_id: u64,
    pub records: Vec<RequestRecord>,
    pub sessions_created: u64,
    /// The first session could not be established, even after the retry.
    pub failed_to_start: bool,
    /// The worker gave up before the deadline after a failed
    /// re-establishment.
    pub stopped_early: bool,
}

impl WorkerOutcome {
    #[must_use]
    pub fn new(worker_id: u64) -> Self {
        Self {
            worker_id,
            ..Self::default()
        }
    }
}
