//! Domain models for analysis results.
//!
//! These models represent the records persisted by either backing store and
//! delivered to history observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Verdict of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// The media appears authentic.
    #[serde(alias = "REAL")]
    Genuine,
    /// The media shows signs of manipulation.
    #[serde(alias = "FAKE")]
    Manipulated,
}

impl Verdict {
    /// Wire representation shared by both stores.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Genuine => "GENUINE",
            Self::Manipulated => "MANIPULATED",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "genuine" | "real" => Ok(Self::Genuine),
            "manipulated" | "fake" => Ok(Self::Manipulated),
            _ => Err(format!("Unknown verdict: {s}. Use: genuine, manipulated")),
        }
    }
}

/// Store-assigned creation time.
///
/// Both stores hand out the same type so observers never care which one
/// produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Convert to a calendar date-time.
    #[must_use]
    pub const fn to_date(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

/// Result of an analysis run as produced by the caller.
///
/// Carries no identity: id, timestamp and owner are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    /// Display name of the analyzed media.
    #[serde(default)]
    pub file_name: String,
    /// The verdict.
    pub result: Verdict,
    /// Verdict confidence as a percentage.
    pub confidence: f64,
    /// Human-readable findings.
    #[serde(default)]
    pub issues: Vec<String>,
}

impl NewRecord {
    /// Attach store-assigned identity to this payload.
    #[must_use]
    pub fn into_record(
        self,
        id: String,
        created_at: Timestamp,
        owner_principal: Option<String>,
    ) -> AnalysisRecord {
        AnalysisRecord {
            id,
            created_at,
            file_name: self.file_name,
            result: self.result,
            confidence: self.confidence,
            issues: self.issues,
            owner_principal,
        }
    }
}

/// A persisted analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    /// Unique identifier within its store.
    pub id: String,
    /// When the store accepted this record.
    #[serde(alias = "timestamp")]
    pub created_at: Timestamp,
    /// Display name of the analyzed media.
    #[serde(default)]
    pub file_name: String,
    /// The verdict.
    pub result: Verdict,
    /// Verdict confidence as a percentage.
    pub confidence: f64,
    /// Human-readable findings.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Identity that wrote the record (remote mode only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_principal: Option<String>,
}

impl AnalysisRecord {
    /// Name to show for this record, with a placeholder for empty names.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.file_name.is_empty() {
            "Unknown Video"
        } else {
            &self.file_name
        }
    }
}

/// Which backing store the process is using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Private, single-user SQLite store.
    Local,
    /// Hosted, multi-user document store.
    Remote,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Seconds before expiry at which a token is treated as stale.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Anonymous identity acquired from the remote backend.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    /// Opaque user id stamped on written records.
    pub uid: String,
    /// Bearer token for authenticated requests.
    pub id_token: String,
    /// Long-lived token exchanged for a new `id_token`.
    pub refresh_token: String,
    /// When `id_token` stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl Principal {
    /// Whether `id_token` is expired or about to expire.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        Utc::now() + chrono::Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Principal")
            .field("uid", &self.uid)
            .field("id_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
