//! Remote multi-user store.
//!
//! Writes go through an anonymous principal acquired once per session and
//! refreshed before its id token expires, or after the server rejects it.
//! History is a live view kept fresh by polling the backend and redelivering
//! whenever the newest-first result set changes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use crate::domain::{
    AppError, DocumentBackend, Mode, NewRecord, Principal, RemoteConfig, Result,
};

use super::store::{HistoryCallback, Listener, RecordStore, Subscription};

/// Store backed by a hosted document database.
#[derive(Clone)]
pub struct RemoteStore {
    backend: Arc<dyn DocumentBackend>,
    session: Arc<Mutex<Option<Principal>>>,
    history_limit: usize,
    poll_interval: Duration,
}

impl RemoteStore {
    /// Wrap `backend` with the limits from `config`.
    #[must_use]
    pub fn new(backend: Arc<dyn DocumentBackend>, config: &RemoteConfig) -> Self {
        Self {
            backend,
            session: Arc::new(Mutex::new(None)),
            history_limit: config.history_limit,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
        }
    }

    /// The session principal, signing in on first use.
    ///
    /// Concurrent callers share one in-flight sign-in or refresh. A failed
    /// attempt is not cached, so the next caller tries again.
    ///
    /// # Errors
    /// Returns error if anonymous sign-in or token refresh fails.
    pub async fn principal(&self) -> Result<Principal> {
        let mut session = self.session.lock().await;

        match session.as_ref() {
            Some(current) if !current.needs_refresh() => Ok(current.clone()),
            Some(current) => {
                let current = current.clone();
                self.refresh(&mut session, &current).await
            }
            None => {
                tracing::debug!("No session principal, signing in anonymously");
                let principal = self.backend.sign_in_anonymously().await?;
                *session = Some(principal.clone());
                Ok(principal)
            }
        }
    }

    /// The session principal if one exists, refreshed when stale.
    ///
    /// Never signs in; history can be read before the first write.
    async fn current_principal(&self) -> Result<Option<Principal>> {
        let mut session = self.session.lock().await;

        match session.as_ref() {
            Some(current) if current.needs_refresh() => {
                let current = current.clone();
                self.refresh(&mut session, &current).await.map(Some)
            }
            other => Ok(other.cloned()),
        }
    }

    /// Replace a principal whose token the server rejected.
    ///
    /// If another caller already refreshed past `rejected`, its result is
    /// reused instead of refreshing twice.
    async fn renew(&self, rejected: &Principal) -> Result<Principal> {
        let mut session = self.session.lock().await;

        match session.as_ref() {
            Some(current) if current.id_token != rejected.id_token => Ok(current.clone()),
            _ => self.refresh(&mut session, rejected).await,
        }
    }

    async fn refresh(
        &self,
        session: &mut Option<Principal>,
        current: &Principal,
    ) -> Result<Principal> {
        match self.backend.refresh_principal(current).await {
            Ok(principal) => {
                *session = Some(principal.clone());
                Ok(principal)
            }
            Err(e) => {
                tracing::warn!(error = %e, uid = %current.uid, "Token refresh failed, dropping session");
                *session = None;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl RecordStore for RemoteStore {
    fn mode(&self) -> Mode {
        Mode::Remote
    }

    async fn submit(&self, record: NewRecord) -> Result<()> {
        let principal = self.principal().await?;

        let outcome = match self.backend.add_record(&record, &principal).await {
            Err(AppError::Auth { message }) => {
                tracing::debug!(reason = %message, "Id token rejected, refreshing");
                let principal = self.renew(&principal).await?;
                self.backend.add_record(&record, &principal).await
            }
            other => other,
        };

        match outcome {
            Ok(id) => {
                tracing::info!(id = %id, file = %record.file_name, "Record saved remotely");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, file = %record.file_name, "Remote add failed");
                Err(e)
            }
        }
    }

    async fn observe_history(&self, callback: HistoryCallback) -> Subscription {
        let listener = Listener::new(callback);
        let task = tokio::spawn(poll_history(self.clone(), Arc::clone(&listener)));
        Subscription::live(listener, task)
    }
}

/// Poll until detached or the first unrecoverable query error.
///
/// A rejected token is renewed once and the query retried on the next tick.
async fn poll_history(store: RemoteStore, listener: Arc<Listener>) {
    let mut ticker = tokio::time::interval(store.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = None;
    let mut renewed = false;

    loop {
        ticker.tick().await;

        let outcome = match store.current_principal().await {
            Ok(principal) => {
                let result = store
                    .backend
                    .query_recent(store.history_limit, principal.as_ref())
                    .await;
                result.map_err(|e| (e, principal))
            }
            Err(e) => Err((e, None)),
        };

        match outcome {
            Ok(records) => {
                renewed = false;
                if last.as_ref() == Some(&records) {
                    continue;
                }
                tracing::debug!(count = records.len(), "History changed");
                if !listener.deliver(records.clone()) {
                    return;
                }
                last = Some(records);
            }
            Err((AppError::Auth { message }, Some(principal))) if !renewed => {
                tracing::debug!(reason = %message, "History token rejected, refreshing");
                renewed = true;
                if let Err(e) = store.renew(&principal).await {
                    tracing::error!(error = %e, "History subscription failed");
                    listener.deliver(Vec::new());
                    return;
                }
            }
            Err((e, _)) => {
                tracing::error!(error = %e, "History subscription failed");
                listener.deliver(Vec::new());
                return;
            }
        }
    }
}
