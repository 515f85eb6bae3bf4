//! Bearer tokens for Google APIs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use ferry_core::config::GcpConfig;

use crate::error::WarehouseError;

const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Bearer token for the next request; `None` sends it unauthenticated.
    async fn token(&self) -> Result<Option<String>, WarehouseError>;
}

/// Pick a provider from config: anonymous, service account, or metadata server.
pub fn token_provider(gcp: &GcpConfig) -> Result<Arc<dyn TokenProvider>, WarehouseError> {
    if gcp.without_authentication {
        info!("GCP auth: anonymous");
        return Ok(Arc::new(AnonymousToken));
    }
    let key = gcp
        .credential_json()
        .map_err(|e| WarehouseError::Auth(e.to_string()))?;
    match key {
        Some(json) => {
            let provider = ServiceAccountToken::from_json(&json)?;
            info!(client_email = %provider.key.client_email, "GCP auth: service account");
            Ok(Arc::new(provider))
        }
        None => {
            info!("GCP auth: metadata server");
            Ok(Arc::new(MetadataServerToken::new()))
        }
    }
}

/// No authentication (emulators).
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousToken;

#[async_trait]
impl TokenProvider for AnonymousToken {
    async fn token(&self) -> Result<Option<String>, WarehouseError> {
        Ok(None)
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn fresh(&self) -> Option<String> {
        (self.expires_at > Instant::now() + REFRESH_MARGIN).then(|| self.value.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

impl TokenResponse {
    fn into_cached(self) -> CachedToken {
        CachedToken {
            value: self.access_token,
            expires_at: Instant::now() + Duration::from_secs(self.expires_in.max(1)),
        }
    }
}

/// Fields of a service-account key file used for the JWT grant.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// OAuth2 JWT-bearer grant signed with a service-account key.
pub struct ServiceAccountToken {
    key: ServiceAccountKey,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountToken {
    pub fn from_json(json: &str) -> Result<Self, WarehouseError> {
        let key: ServiceAccountKey = serde_json::from_str(json)
            .map_err(|e| WarehouseError::Auth(format!("invalid service account key: {e}")))?;
        Ok(Self {
            key,
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        })
    }

    fn token_uri(&self) -> &str {
        self.key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }

    /// Signed RS256 assertion for the token endpoint.
    fn assertion(&self) -> Result<String, WarehouseError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: BIGQUERY_SCOPE,
            aud: self.token_uri(),
            iat: now,
            exp: now + 3600,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| WarehouseError::Auth(format!("invalid private key: {e}")))?;
        jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|e| WarehouseError::Auth(format!("sign assertion: {e}")))
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountToken {
    async fn token(&self) -> Result<Option<String>, WarehouseError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().and_then(CachedToken::fresh) {
            return Ok(Some(token));
        }

        debug!(client_email = %self.key.client_email, "exchanging service account assertion");
        let assertion = self.assertion()?;
        let response = self
            .http
            .post(self.token_uri())
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WarehouseError::Auth(format!("token endpoint returned {status}: {body}")));
        }

        let token = response.json::<TokenResponse>().await?.into_cached();
        let value = token.value.clone();
        *cached = Some(token);
        Ok(Some(value))
    }
}

/// Tokens from the GCE/GKE metadata server.
pub struct MetadataServerToken {
    url: String,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl Default for MetadataServerToken {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataServerToken {
    pub fn new() -> Self {
        Self::with_url(METADATA_TOKEN_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TokenProvider for MetadataServerToken {
    async fn token(&self) -> Result<Option<String>, WarehouseError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().and_then(CachedToken::fresh) {
            return Ok(Some(token));
        }

        let response = self
            .http
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| WarehouseError::Auth(format!("metadata server unreachable: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(WarehouseError::Auth(format!("metadata server returned {status}")));
        }

        let token = response.json::<TokenResponse>().await?.into_cached();
        let value = token.value.clone();
        *cached = Some(token);
        Ok(Some(value))
    }
}
