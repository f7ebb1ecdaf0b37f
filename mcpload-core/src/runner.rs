mod aggregate;
mod counter;
mod error;
mod plan;
mod record;
mod run;
mod session;
mod template;
mod worker;

pub use aggregate::{AggregateReport, ExecutionTime, ResponseTimes, Throughput, aggregate};
pub use counter::SequenceCounter;
pub use error::{Error, Result};
pub use plan::{SessionPolicy, TestPlan, TimeoutBudget};
pub use record::{ErrorCategory, RequestError, RequestRecord, WorkerOutcome};
pub use run::run_plan;
pub use session::{SessionLease, SessionManager};
pub use template::{Template, TemplateError};
pub use worker::{WorkerContext, run_worker};
