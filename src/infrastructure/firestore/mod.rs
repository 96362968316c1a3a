//! Firestore REST client.
//!
//! Implements [`DocumentBackend`] over the public REST surface: anonymous
//! sign-up and token refresh on the identity APIs, a `commit` with a
//! request-time transform for adds, and `runQuery` for the recent-history
//! view.

pub mod value;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::{
    AnalysisRecord, AppError, DocumentBackend, NewRecord, Principal, RemoteConfig, Result,
};

use value::{decode_documents, encode_fields, QueryResult, TIMESTAMP_FIELD};

/// Length of generated document ids.
const AUTO_ID_LEN: usize = 20;

/// Token lifetime assumed when a response omits or garbles `expiresIn`.
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// HTTP client for one Firestore project.
pub struct FirestoreClient {
    config: RemoteConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    local_id: String,
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

/// Response of the securetoken API, which uses snake_case keys.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    expires_in: Option<String>,
}

impl FirestoreClient {
    /// Build a client for the configured project.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed in this runtime.
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::remote("Failed to create HTTP client", e))?;

        Ok(Self { config, http })
    }

    /// Resource path of the database's document root.
    fn database_path(&self) -> String {
        format!(
            "projects/{}/databases/(default)/documents",
            self.config.project_id
        )
    }

    fn documents_url(&self, method: &str) -> String {
        format!(
            "{}/{}:{method}",
            self.config.endpoint.trim_end_matches('/'),
            self.database_path()
        )
    }

    fn sign_up_url(&self) -> String {
        format!(
            "{}/accounts:signUp?key={}",
            self.config.auth_endpoint.trim_end_matches('/'),
            self.config.api_key
        )
    }

    fn token_url(&self) -> String {
        format!(
            "{}/token?key={}",
            self.config.token_endpoint.trim_end_matches('/'),
            self.config.api_key
        )
    }

    /// Body of a `commit` creating one new document.
    fn commit_body(&self, doc_id: &str, record: &NewRecord, owner: &str) -> Value {
        json!({
            "writes": [{
                "update": {
                    "name": format!("{}/{}/{doc_id}", self.database_path(), self.config.collection),
                    "fields": encode_fields(record, owner),
                },
                "updateTransforms": [{
                    "fieldPath": TIMESTAMP_FIELD,
                    "setToServerValue": "REQUEST_TIME",
                }],
                "currentDocument": { "exists": false },
            }]
        })
    }

    /// Body of the newest-first history query.
    fn query_body(&self, limit: usize) -> Value {
        json!({
            "structuredQuery": {
                "from": [{ "collectionId": self.config.collection }],
                "orderBy": [{
                    "field": { "fieldPath": TIMESTAMP_FIELD },
                    "direction": "DESCENDING",
                }],
                "limit": limit,
            }
        })
    }

    fn with_auth(
        request: reqwest::RequestBuilder,
        principal: Option<&Principal>,
    ) -> reqwest::RequestBuilder {
        match principal {
            Some(p) => request.bearer_auth(&p.id_token),
            None => request,
        }
    }
}

/// Random document id in the style of client-generated Firestore ids.
fn auto_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}

/// Expiry instant for a token issued now with the given `expiresIn`.
fn token_expiry(expires_in: Option<&str>) -> chrono::DateTime<Utc> {
    let secs = expires_in
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(DEFAULT_TOKEN_TTL_SECS);
    Utc::now() + chrono::Duration::seconds(secs)
}

/// Collapse a non-success response into its status and body text.
async fn rejection(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("{status}: {body}")
}

/// Whether the server refused the bearer token itself.
fn is_token_rejection(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::UNAUTHORIZED
}

#[async_trait]
impl DocumentBackend for FirestoreClient {
    async fn sign_in_anonymously(&self) -> Result<Principal> {
        let response = self
            .http
            .post(self.sign_up_url())
            .json(&json!({ "returnSecureToken": true }))
            .send()
            .await
            .map_err(|e| AppError::remote("Anonymous sign-in request failed", e))?;

        if !response.status().is_success() {
            return Err(AppError::Auth {
                message: rejection(response).await,
            });
        }

        let body: SignUpResponse = response
            .json()
            .await
            .map_err(|e| AppError::remote("Invalid sign-in response", e))?;

        tracing::info!(uid = %body.local_id, "Signed in anonymously");

        Ok(Principal {
            uid: body.local_id,
            id_token: body.id_token,
            refresh_token: body.refresh_token,
            expires_at: token_expiry(body.expires_in.as_deref()),
        })
    }

    async fn refresh_principal(&self, principal: &Principal) -> Result<Principal> {
        let response = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", principal.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::remote("Token refresh request failed", e))?;

        if !response.status().is_success() {
            return Err(AppError::Auth {
                message: format!("Token refresh rejected: {}", rejection(response).await),
            });
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| AppError::remote("Invalid token refresh response", e))?;

        tracing::debug!(uid = %principal.uid, "Refreshed id token");

        Ok(Principal {
            uid: body.user_id.unwrap_or_else(|| principal.uid.clone()),
            id_token: body.id_token,
            refresh_token: body.refresh_token,
            expires_at: token_expiry(body.expires_in.as_deref()),
        })
    }

    async fn add_record(&self, record: &NewRecord, principal: &Principal) -> Result<String> {
        let doc_id = auto_id();
        let request = self
            .http
            .post(self.documents_url("commit"))
            .json(&self.commit_body(&doc_id, record, &principal.uid));

        let response = Self::with_auth(request, Some(principal))
            .send()
            .await
            .map_err(|e| AppError::Write {
                message: format!("commit request failed: {e}"),
            })?;

        if is_token_rejection(response.status()) {
            return Err(AppError::Auth {
                message: rejection(response).await,
            });
        }

        if !response.status().is_success() {
            return Err(AppError::Write {
                message: rejection(response).await,
            });
        }

        tracing::debug!(id = %doc_id, collection = %self.config.collection, "Document added");

        Ok(doc_id)
    }

    async fn query_recent(
        &self,
        limit: usize,
        principal: Option<&Principal>,
    ) -> Result<Vec<AnalysisRecord>> {
        let request = self
            .http
            .post(self.documents_url("runQuery"))
            .json(&self.query_body(limit));

        let response = Self::with_auth(request, principal)
            .send()
            .await
            .map_err(|e| AppError::remote("History query failed", e))?;

        if is_token_rejection(response.status()) {
            return Err(AppError::Auth {
                message: format!("History query rejected: {}", rejection(response).await),
            });
        }

        if !response.status().is_success() {
            return Err(AppError::Remote {
                message: format!("History query rejected: {}", rejection(response).await),
                source: None,
            });
        }

        let entries: Vec<QueryResult> = response
            .json()
            .await
            .map_err(|e| AppError::remote("Invalid query response", e))?;

        Ok(decode_documents(&entries))
    }
}
