use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;

use crate::config::{CredentialsConfig, DEFAULT_TOKEN_URI};
use crate::error::{LeaderboardError, Result};

/// OAuth scopes requested for the service account.
pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

// Refresh this long before the token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// The fields of a Google service account key that the token exchange needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Parses a key from its JSON form.
    ///
    /// # Errors
    /// * `Auth` if the JSON is not a service account key
    pub fn from_json(text: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(text)
            .map_err(|e| LeaderboardError::Auth(format!("invalid service account key: {}", e)))?;
        Ok(key.unescaped())
    }

    // Secret stores often keep the PEM on one line with literal "\n".
    fn unescaped(mut self) -> Self {
        if self.private_key.contains("\\n") {
            self.private_key = self.private_key.replace("\\n", "\n");
        }
        self
    }
}

/// Finds the service account key using the order documented on
/// [`CredentialsConfig`]. `env` looks up environment variables.
///
/// # Errors
/// * `Auth` if no source yields a key, or the one found cannot be parsed
pub fn load_service_account(
    config: &CredentialsConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ServiceAccountKey> {
    if let Some(path) = config.key_file.as_deref().filter(|p| p.exists()) {
        log::info!("using service account key file {}", path.display());
        let text = read(path)?;
        return ServiceAccountKey::from_json(&text);
    }

    if let Some(path) = config.secrets_file.as_deref().filter(|p| p.exists()) {
        log::info!("using service account from secrets file {}", path.display());
        return from_secrets_toml(&read(path)?);
    }

    match env(&config.env_var) {
        Some(text) => {
            log::info!("using service account from ${}", config.env_var);
            ServiceAccountKey::from_json(&text)
        }
        None => Err(LeaderboardError::Auth(
            "no service account credentials configured".to_string(),
        )),
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| LeaderboardError::Auth(format!("cannot read {}: {}", path.display(), e)))
}

/// Reads the `[connections.gsheets]` table of a secrets file.
///
/// # Errors
/// * `Auth` if the table is missing or is not a service account key
pub fn from_secrets_toml(text: &str) -> Result<ServiceAccountKey> {
    #[derive(Deserialize)]
    struct Secrets {
        connections: Connections,
    }
    #[derive(Deserialize)]
    struct Connections {
        gsheets: ServiceAccountKey,
    }

    let secrets: Secrets = toml::from_str(text)
        .map_err(|e| LeaderboardError::Auth(format!("invalid secrets file: {}", e)))?;
    Ok(secrets.connections.gsheets.unescaped())
}

/// Supplies bearer tokens for the Sheets API.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// A fixed token, for tests and for tokens minted outside the process.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
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
    3600
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Exchanges a signed service account assertion for access tokens and
/// caches them until shortly before they expire.
pub struct ServiceAccountAuth {
    email: String,
    key_id: Option<String>,
    encoding_key: EncodingKey,
    token_uri: String,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    /// # Errors
    /// * `Auth` if the private key is not a valid RSA PEM
    pub fn new(
        key: ServiceAccountKey,
        token_uri_override: Option<String>,
        client: reqwest::Client,
    ) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| LeaderboardError::Auth(format!("invalid private key: {}", e)))?;
        let token_uri = token_uri_override
            .or(key.token_uri)
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());
        Ok(ServiceAccountAuth {
            email: key.client_email,
            key_id: key.private_key_id,
            encoding_key,
            token_uri,
            client,
            cached: Mutex::new(None),
        })
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            iss: &self.email,
            scope: SCOPES.join(" "),
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();
        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| LeaderboardError::Auth(format!("cannot sign assertion: {}", e)))
    }

    async fn exchange(&self) -> Result<CachedToken> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;
        let response = self
            .client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| LeaderboardError::Auth(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LeaderboardError::Auth(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| LeaderboardError::Auth(format!("bad token response: {}", e)))?;
        log::debug!("obtained access token valid for {}s", token.expires_in);
        Ok(CachedToken {
            value: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountAuth {
    async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > Utc::now() {
                return Ok(token.value.clone());
            }
        }
        let fresh = self.exchange().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}
