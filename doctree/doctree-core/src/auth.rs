use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Public keys used to sign identity tokens issued by the hosted identity provider.
pub const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

#[derive(Deserialize, Clone, Debug)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Option<Claims>;
}

/// Shared-secret verifier for development and tests.
pub struct Hs256Verifier {
    key: DecodingKey,
}

impl Hs256Verifier {
    pub fn new(secret: String) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[async_trait]
impl TokenVerifier for Hs256Verifier {
    async fn verify(&self, token: &str) -> Option<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.key, &validation)
            .ok()
            .map(|d| d.claims)
    }
}

/// Verifies RS256 identity tokens minted for one project.
pub struct FirebaseVerifier {
    project_id: String,
    jwks_url: String,
    client: reqwest::Client,
    keys: Mutex<Option<Jwks>>,
}

#[derive(Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

impl FirebaseVerifier {
    pub fn new(project_id: String) -> Self {
        Self::with_jwks_url(project_id, FIREBASE_JWKS_URL.to_string())
    }

    pub fn with_jwks_url(project_id: String, jwks_url: String) -> Self {
        Self {
            project_id,
            jwks_url,
            client: reqwest::Client::new(),
            keys: Mutex::new(None),
        }
    }

    async fn fetch_keys(&self) -> reqwest::Result<Jwks> {
        self.client
            .get(&self.jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[format!("https://securetoken.google.com/{}", self.project_id)]);
        validation
    }
}

#[async_trait]
impl TokenVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Option<Claims> {
        let header = decode_header(token).ok()?;
        let kid = header.kid?;
        let mut guard = self.keys.lock().await;
        // keys rotate, so an unknown kid triggers one refetch
        let known = guard
            .as_ref()
            .is_some_and(|jwks| jwks.keys.iter().any(|k| k.kid == kid));
        if !known {
            match self.fetch_keys().await {
                Ok(jwks) => *guard = Some(jwks),
                Err(err) => {
                    warn!(%err, "failed to fetch identity token keys");
                    return None;
                }
            }
        }
        let jwks = guard.as_ref()?;
        let jwk = jwks.keys.iter().find(|k| k.kid == kid)?;
        let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e).ok()?;
        match decode::<Claims>(token, &key, &self.validation()) {
            Ok(data) => Some(data.claims),
            Err(err) => {
                debug!(%err, "identity token rejected");
                None
            }
        }
    }
}
