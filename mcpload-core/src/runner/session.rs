use std::sync::Arc;

use tracing::debug;

use crate::{Session, Transport, TransportError};

use super::plan::{SessionPolicy, TimeoutBudget};

/// Owns the when-and-how of session lifecycles relative to requests.
///
/// Shared policy keeps one session per worker alive across the whole
/// loop; per-request tears a fresh one up and down around every call.
/// Either way, a lease taken with [`obtain_for_request`] must come back
/// through [`release_after_request`] on every path, so a session is
/// closed exactly once.
///
/// [`obtain_for_request`]: SessionManager::obtain_for_request
/// [`release_after_request`]: SessionManager::release_after_request
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    policy: SessionPolicy,
    timeouts: TimeoutBudget,
    shared: Option<Box<dyn Session>>,
    sessions_created: u64,
}

/// A session checked out for one request. The lease owns the boxed
/// session until it is handed back.
pub struct SessionLease {
    session: Box<dyn Session>,
    shared: bool,
}

impl std::ops::Deref for SessionLease {
    type Target = dyn Session;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl std::ops::DerefMut for SessionLease {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl SessionManager {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, policy: SessionPolicy, timeouts: TimeoutBudget) -> Self {
        Self {
            transport,
            policy,
            timeouts,
            shared: None,
            sessions_created: 0,
        }
    }

    /// Connect plus handshake, each on its own budget. Only successful
    /// handshakes count toward `sessions_created`.
    async fn establish(&mut self) -> Result<Box<dyn Session>, TransportError> {
        let mut session = self.transport.connect(self.timeouts.connect).await?;
        if let Err(err) = session.initialize(self.timeouts.initialize).await {
            session.close().await;
            return Err(err);
        }
        self.sessions_created += 1;
        Ok(session)
    }

    /// Shared policy: establish the worker's one session before its loop.
    /// Per-request policy: nothing to do here.
    pub async fn begin_worker_session(&mut self) -> Result<(), TransportError> {
        if self.policy == SessionPolicy::Shared {
            let session = self.establish().await?;
            self.shared = Some(session);
        }
        Ok(())
    }

    pub async fn obtain_for_request(&mut self) -> Result<SessionLease, TransportError> {
        match self.policy {
            SessionPolicy::Shared => {
                let session = self.shared.take().ok_or_else(|| {
                    TransportError::Initialize(
                        "no established session for this worker".to_string(),
                    )
                })?;
                Ok(SessionLease {
                    session,
                    shared: true,
                })
            }
            SessionPolicy::PerRequest => {
                let session = self.establish().await?;
                Ok(SessionLease {
                    session,
                    shared: false,
                })
            }
        }
    }

    pub async fn release_after_request(&mut self, lease: SessionLease) {
        let mut session = lease.session;
        if lease.shared {
            self.shared = Some(session);
        } else {
            session.close().await;
        }
    }

    /// Tears down the current shared session (if any) and builds a new
    /// one. Called by the worker after a transport-level failure.
    pub async fn reestablish(&mut self) -> Result<(), TransportError> {
        if let Some(mut old) = self.shared.take() {
            old.close().await;
        }
        debug!("re-establishing worker session");
        let session = self.establish().await?;
        self.shared = Some(session);
        Ok(())
    }

    /// Closes the shared session, once, after the worker's loop ends.
    pub async fn end_worker_session(&mut self) {
        if let Some(mut session) = self.shared.take() {
            session.close().await;
        }
    }

    #[must_use]
    pub fn sessions_created(&self) -> u64 {
        self.sessions_created
    }
}
