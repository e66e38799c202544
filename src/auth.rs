//! Google service-account authentication.
//!
//! A service-account key file is turned into short-lived OAuth access
//! tokens by signing an RS256 JWT assertion and exchanging it at the key's
//! `token_uri`. Tokens are cached until shortly before they expire.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{SheetsError, SheetsResult};
use crate::google::retry_after;

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Lifetime requested for each assertion (Google caps this at one hour).
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the cached token expires.
const REFRESH_MARGIN_SECS: i64 = 60;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// The fields of a service-account key file we need.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> SheetsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SheetsError::Config {
            message: format!("failed to read credentials {}: {e}", path.display()),
        })?;
        serde_json::from_str(&content).map_err(|e| SheetsError::Config {
            message: format!("failed to parse credentials {}: {e}", path.display()),
        })
    }
}

/// JWT claims for the OAuth JWT-bearer grant.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AssertionClaims {
    pub fn new(key: &ServiceAccountKey, scope: &str, now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        Self {
            iss: key.client_email.clone(),
            scope: scope.to_string(),
            aud: key.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        }
    }
}

/// Sign the assertion with the key's RSA private key.
pub fn sign_assertion(key: &ServiceAccountKey, claims: &AssertionClaims) -> SheetsResult<String> {
    let encoding_key =
        EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| SheetsError::Auth {
            message: format!("invalid service-account private key: {e}"),
        })?;

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    encode(&header, claims, &encoding_key).map_err(|e| SheetsError::Auth {
        message: format!("failed to sign assertion: {e}"),
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
pub struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Source of bearer tokens for the Sheets API.
pub enum TokenProvider {
    /// Fixed token, used for tests and pre-issued tokens.
    Static(String),
    ServiceAccount {
        key: ServiceAccountKey,
        http: reqwest::Client,
        cache: Mutex<Option<CachedToken>>,
    },
}

impl TokenProvider {
    pub fn static_token(token: impl Into<String>) -> Self {
        Self::Static(token.into())
    }

    pub fn service_account(key: ServiceAccountKey, http: reqwest::Client) -> Self {
        Self::ServiceAccount {
            key,
            http,
            cache: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> SheetsResult<String> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::ServiceAccount { key, http, cache } => {
                let mut cached = cache.lock().await;
                let now = Utc::now();
                if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
                    return Ok(token.token.clone());
                }

                let fresh = exchange_assertion(http, key, now).await?;
                let token = fresh.token.clone();
                *cached = Some(fresh);
                Ok(token)
            }
        }
    }
}

async fn exchange_assertion(
    http: &reqwest::Client,
    key: &ServiceAccountKey,
    now: DateTime<Utc>,
) -> SheetsResult<CachedToken> {
    let claims = AssertionClaims::new(key, SPREADSHEETS_SCOPE, now);
    let assertion = sign_assertion(key, &claims)?;

    tracing::debug!(client_email = %key.client_email, "Exchanging service-account assertion");
    request_token(http, &key.token_uri, &assertion, now).await
}

/// Trade a signed assertion for an access token. Throttling and server
/// errors keep their retryable kinds; other rejections are auth failures.
async fn request_token(
    http: &reqwest::Client,
    token_uri: &str,
    assertion: &str,
    now: DateTime<Utc>,
) -> SheetsResult<CachedToken> {
    let resp = http
        .post(token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion)])
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let retry_after = retry_after(&resp);
        let body = resp.text().await.unwrap_or_default();
        let message = format!("token exchange failed (status {}): {body}", status.as_u16());
        return Err(if status == StatusCode::TOO_MANY_REQUESTS {
            SheetsError::RateLimited { retry_after }
        } else if status.is_server_error() {
            SheetsError::Api {
                status: status.as_u16(),
                message,
            }
        } else {
            SheetsError::Auth { message }
        });
    }

    let token: TokenResponse = resp.json().await.map_err(|e| SheetsError::Auth {
        message: format!("malformed token response: {e}"),
    })?;

    Ok(CachedToken {
        token: token.access_token,
        expires_at: now + Duration::seconds(token.expires_in),
    })
}
