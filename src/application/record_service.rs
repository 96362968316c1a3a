//! Public entry point for submitting and observing analysis records.
//!
//! Holds exactly one store chosen at construction; callers never branch on
//! which mode is active.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::{AnalysisRecord, Mode, NewRecord, Result};

use super::mode_selector::ModeSelection;
use super::store::{RecordStore, Subscription};

/// Uniform submit/observe contract over the selected store.
#[derive(Clone)]
pub struct RecordService {
    store: Arc<dyn RecordStore>,
}

impl RecordService {
    /// Build the service around the store picked by mode selection.
    #[must_use]
    pub fn new(selection: ModeSelection) -> Self {
        let store: Arc<dyn RecordStore> = match selection.into_parts() {
            (Some(remote), _) => Arc::new(remote),
            (None, local) => Arc::new(local),
        };
        Self::with_store(store)
    }

    /// Build the service around an explicit store.
    #[must_use]
    pub fn with_store(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// The mode decided at startup.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.store.mode()
    }

    /// Persist one analysis result.
    ///
    /// # Errors
    /// Returns error if the active store rejects the write.
    pub async fn submit(&self, record: NewRecord) -> Result<()> {
        self.store.submit(record).await
    }

    /// Deliver newest-first history to `callback` until the returned handle
    /// is closed or dropped.
    pub async fn observe_history<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(Vec<AnalysisRecord>) + Send + 'static,
    {
        self.store.observe_history(Box::new(callback)).await
    }

    /// History as an async sequence of deliveries.
    pub async fn watch_history(&self) -> HistoryFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self
            .observe_history(move |records| {
                let _ = tx.send(records);
            })
            .await;

        HistoryFeed {
            rx,
            _subscription: subscription,
        }
    }
}

/// Stream of history deliveries; closes the subscription when dropped.
#[derive(Debug)]
pub struct HistoryFeed {
    rx: mpsc::UnboundedReceiver<Vec<AnalysisRecord>>,
    _subscription: Subscription,
}

impl HistoryFeed {
    /// Next delivery, or `None` once no more can arrive.
    pub async fn next(&mut self) -> Option<Vec<AnalysisRecord>> {
        self.rx.recv().await
    }

    /// Next delivery if one is already queued.
    pub fn try_next(&mut self) -> Option<Vec<AnalysisRecord>> {
        self.rx.try_recv().ok()
    }
}
