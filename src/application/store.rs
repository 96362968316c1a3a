//! The store capability shared by both backing stores, and the handle
//! returned to history observers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, ReentrantMutex};
use tokio::task::JoinHandle;

use crate::domain::{AnalysisRecord, Mode, NewRecord, Result};

/// Callback receiving the full newest-first history on every change.
pub type HistoryCallback = Box<dyn FnMut(Vec<AnalysisRecord>) + Send + 'static>;

/// A backing store for analysis records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Which mode this store implements.
    fn mode(&self) -> Mode;

    /// Persist one new record, assigning its id and timestamp.
    async fn submit(&self, record: NewRecord) -> Result<()>;

    /// Start delivering history to `callback`.
    ///
    /// Never fails: errors are logged and surface as an empty delivery.
    async fn observe_history(&self, callback: HistoryCallback) -> Subscription;
}

/// Shared slot through which a background task reaches the observer.
///
/// The callback is taken out of its slot while it runs, under a reentrant
/// gate. A [`Listener::detach`] from another thread waits for a running
/// delivery to finish; one from inside the callback returns at once. Either
/// way the callback never runs again once `detach` returns.
pub struct Listener {
    callback: Mutex<Option<HistoryCallback>>,
    gate: ReentrantMutex<()>,
    closed: AtomicBool,
}

impl Listener {
    #[must_use]
    pub fn new(callback: HistoryCallback) -> Arc<Self> {
        Arc::new(Self {
            callback: Mutex::new(Some(callback)),
            gate: ReentrantMutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    /// Hand `records` to the callback. Returns `false` once detached.
    pub fn deliver(&self, records: Vec<AnalysisRecord>) -> bool {
        let _gate = self.gate.lock();
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }

        let Some(mut callback) = self.callback.lock().take() else {
            return false;
        };
        callback(records);

        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        *self.callback.lock() = Some(callback);
        true
    }

    fn detach(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _gate = self.gate.lock();
        self.callback.lock().take();
    }
}

/// Handle to an ongoing history observation.
///
/// [`Subscription::close`] is idempotent, valid before any delivery and
/// valid from inside the callback. Dropping the handle closes it.
#[must_use = "dropping a Subscription closes it"]
pub struct Subscription {
    listener: Option<Arc<Listener>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// A handle with nothing behind it (one-shot deliveries).
    pub const fn inert() -> Self {
        Self {
            listener: None,
            task: None,
        }
    }

    /// A handle owning a live background task.
    pub fn live(listener: Arc<Listener>, task: JoinHandle<()>) -> Self {
        Self {
            listener: Some(listener),
            task: Some(task),
        }
    }

    /// Whether further deliveries are still possible.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop deliveries and release the underlying task.
    pub fn close(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.detach();
        }
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("History subscription closed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Weak;

    #[test]
    fn test_inert_close_twice() {
        let mut subscription = Subscription::inert();
        assert!(!subscription.is_active());
        subscription.close();
        subscription.close();
    }

    #[test]
    fn test_detached_listener_stops_delivering() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let listener = Listener::new(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(listener.deliver(Vec::new()));
        listener.detach();
        assert!(!listener.deliver(Vec::new()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_aborts_task_and_detaches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let listener = Listener::new(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let task = tokio::spawn(std::future::pending::<()>());

        let mut subscription = Subscription::live(Arc::clone(&listener), task);
        assert!(subscription.is_active());

        subscription.close();
        subscription.close();

        assert!(!subscription.is_active());
        assert!(!listener.deliver(Vec::new()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_detach_from_inside_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let own: Arc<Mutex<Weak<Listener>>> = Arc::new(Mutex::new(Weak::new()));
        let handle = Arc::clone(&own);

        let listener = Listener::new(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            let this = handle.lock().upgrade();
            if let Some(this) = this {
                this.detach();
            }
        }));
        *own.lock() = Arc::downgrade(&listener);

        assert!(!listener.deliver(Vec::new()));
        assert!(!listener.deliver(Vec::new()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(listener.callback.lock().is_none());
    }

    #[tokio::test]
    async fn test_drop_subscription_from_inside_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let own = Arc::clone(&slot);

        let listener = Listener::new(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            let taken = own.lock().take();
            drop(taken);
        }));
        let task = tokio::spawn(std::future::pending::<()>());
        *slot.lock() = Some(Subscription::live(Arc::clone(&listener), task));

        assert!(!listener.deliver(Vec::new()));
        assert!(!listener.deliver(Vec::new()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(slot.lock().is_none());
    }
}
