//! Port to the remote document store.

use async_trait::async_trait;

use super::{AnalysisRecord, NewRecord, Principal, Result};

/// Operations the remote store needs from a hosted document database.
///
/// Implementations must be `Send + Sync` to be shared across async tasks.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Acquire a fresh anonymous principal.
    async fn sign_in_anonymously(&self) -> Result<Principal>;

    /// Exchange the refresh token of `principal` for a new id token.
    /// The returned principal keeps the same uid.
    async fn refresh_principal(&self, principal: &Principal) -> Result<Principal>;

    /// Add one record owned by `principal`, with a server-assigned
    /// timestamp. Returns the new document id.
    ///
    /// A rejected id token surfaces as [`AppError::Auth`](super::AppError::Auth).
    async fn add_record(&self, record: &NewRecord, principal: &Principal) -> Result<String>;

    /// Fetch the `limit` most recent records, newest first.
    async fn query_recent(
        &self,
        limit: usize,
        principal: Option<&Principal>,
    ) -> Result<Vec<AnalysisRecord>>;
}
