//! Service-account keys and the OAuth access tokens minted from them.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SCOPES: &str =
    "https://www.googleapis.com/auth/datastore https://www.googleapis.com/auth/cloud-platform";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Tokens are refreshed this long before the provider says they expire.
const EXPIRY_MARGIN_SECS: i64 = 60;
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The JSON key file downloaded for a service account.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| Error::validation(format!("invalid service account key: {e}")))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct GrantClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

enum Source {
    ServiceAccount(ServiceAccountKey),
    Fixed(String),
}

/// Hands out bearer tokens for REST calls, minting new ones as they expire.
pub struct AccessTokenSource {
    source: Source,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl AccessTokenSource {
    pub fn service_account(key: ServiceAccountKey) -> Self {
        Self {
            source: Source::ServiceAccount(key),
            client: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// A token that never changes, e.g. `owner` for a local emulator.
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            source: Source::Fixed(token.into()),
            client: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> Result<String> {
        let key = match &self.source {
            Source::Fixed(token) => return Ok(token.clone()),
            Source::ServiceAccount(key) => key,
        };
        let mut cached = self.cached.lock().await;
        if let Some(current) = cached.as_ref() {
            if current.expires_at > Utc::now() {
                return Ok(current.token.clone());
            }
        }
        let fresh = self.mint(key).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn mint(&self, key: &ServiceAccountKey) -> Result<CachedToken> {
        let now = Utc::now().timestamp();
        let claims = GrantClaims {
            iss: &key.client_email,
            scope: SCOPES,
            aud: &key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| Error::Auth(format!("unusable private key: {e}")))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
            .map_err(|e| Error::Auth(format!("failed to sign token request: {e}")))?;

        let resp = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("token exchange failed ({status}): {body}")));
        }
        let body: TokenResponse = resp.json().await?;
        debug!(account = %key.client_email, expires_in = body.expires_in, "minted access token");
        Ok(CachedToken {
            token: body.access_token,
            expires_at: Utc::now() + Duration::seconds(body.expires_in - EXPIRY_MARGIN_SECS),
        })
    }
}
