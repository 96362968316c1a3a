//! Local fallback store.
//!
//! Keeps every record in one key/value slot as a newest-first JSON array.
//! Writes are serialized through a per-store lock and applied in a single
//! SQLite transaction.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::domain::{AnalysisRecord, AppError, Mode, NewRecord, Result, Timestamp};
use crate::infrastructure::LocalStorage;

use super::store::{HistoryCallback, RecordStore, Subscription};

/// Prefix distinguishing local ids from remote document ids.
pub const LOCAL_ID_PREFIX: &str = "demo_";

/// Single-user store backed by a SQLite key/value slot.
#[derive(Clone)]
pub struct LocalStore {
    storage: Arc<Mutex<LocalStorage>>,
    slot: String,
}

impl LocalStore {
    /// Open the store at `path`, keeping records under `slot`.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened.
    pub fn open(path: &Path, slot: impl Into<String>) -> Result<Self> {
        let storage = LocalStorage::open(path)?;
        Ok(Self {
            storage: Arc::new(Mutex::new(storage)),
            slot: slot.into(),
        })
    }

    /// Append a record, returning it with its assigned id and timestamp.
    ///
    /// # Errors
    /// Returns error if the slot cannot be read, decoded or written.
    pub async fn append(&self, record: NewRecord) -> Result<AnalysisRecord> {
        let storage = Arc::clone(&self.storage);
        let slot = self.slot.clone();

        let stored = tokio::task::spawn_blocking(move || {
            storage.lock().update_slot(&slot, |current| {
                let mut records = decode(current)?;
                let stored = assign_identity(record, &records);
                records.insert(0, stored.clone());
                let encoded = serde_json::to_string(&records).map_err(AppError::json_parse)?;
                Ok((encoded, stored))
            })
        })
        .await
        .map_err(|e| AppError::task(&e))??;

        tracing::info!(id = %stored.id, file = %stored.file_name, "Record saved locally");

        Ok(stored)
    }

    /// Read the full history, newest first.
    ///
    /// # Errors
    /// Returns error if the slot cannot be read or decoded.
    pub async fn snapshot(&self) -> Result<Vec<AnalysisRecord>> {
        let storage = Arc::clone(&self.storage);
        let slot = self.slot.clone();

        let raw = tokio::task::spawn_blocking(move || storage.lock().read_slot(&slot))
            .await
            .map_err(|e| AppError::task(&e))??;

        let mut records = decode(raw.as_deref())?;
        // Stable, so equal timestamps keep their stored order.
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[async_trait]
impl RecordStore for LocalStore {
    fn mode(&self) -> Mode {
        Mode::Local
    }

    async fn submit(&self, record: NewRecord) -> Result<()> {
        self.append(record).await.map(|_| ())
    }

    async fn observe_history(&self, mut callback: HistoryCallback) -> Subscription {
        let records = match self.snapshot().await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read local history");
                Vec::new()
            }
        };

        callback(records);
        Subscription::inert()
    }
}

fn decode(raw: Option<&str>) -> Result<Vec<AnalysisRecord>> {
    match raw {
        Some(json) if !json.trim().is_empty() => {
            serde_json::from_str(json).map_err(AppError::json_parse)
        }
        _ => Ok(Vec::new()),
    }
}

/// Assign a fresh id and timestamp relative to the existing newest-first
/// records.
///
/// The id token is the wall-clock millisecond, bumped past every token
/// already in the slot. The timestamp never precedes the current newest
/// record, even if the clock stepped back.
fn assign_identity(record: NewRecord, existing: &[AnalysisRecord]) -> AnalysisRecord {
    let now = Utc::now();
    let last_token = existing
        .iter()
        .filter_map(|r| r.id.strip_prefix(LOCAL_ID_PREFIX))
        .filter_map(|token| token.parse::<i64>().ok())
        .max();

    let token = match last_token {
        Some(last) if last >= now.timestamp_millis() => last + 1,
        _ => now.timestamp_millis(),
    };

    let created_at = match existing.first() {
        Some(newest) if newest.created_at.to_date() > now => newest.created_at,
        _ => Timestamp::from(now),
    };

    record.into_record(format!("{LOCAL_ID_PREFIX}{token}"), created_at, None)
}
