//! OAuth2 access tokens for a service account (JWT bearer grant).

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use binwatch_core::ports::PortError;

use crate::client::fetch_json;
use crate::credentials::{CredentialsError, ServiceAccount};

const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
// Refresh a bit early so a token never expires mid-request.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Hands out bearer tokens for Firestore, refreshing them before they expire.
pub struct TokenProvider {
    http: Client,
    account: ServiceAccount,
    key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    /// Prepare a provider for `account`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::PrivateKey`] when the key is not a PEM encoded RSA key.
    pub fn new(http: Client, account: ServiceAccount) -> Result<Self, CredentialsError> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())?;
        Ok(Self {
            http,
            account,
            key,
            cached: Mutex::new(None),
        })
    }

    /// Project the service account belongs to.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.account.project_id
    }

    /// Return a valid access token, exchanging a new assertion when needed.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when signing fails or the token endpoint rejects the assertion.
    pub async fn access_token(&self) -> Result<String, PortError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        let fresh = self.exchange(now).await?;
        debug!(expires_at = %fresh.expires_at, "Obtained Firestore access token");
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn exchange(&self, now: DateTime<Utc>) -> Result<CachedToken, PortError> {
        let issued_at = now.timestamp();
        let claims = Claims {
            iss: &self.account.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.account.token_uri,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid.clone_from(&self.account.private_key_id);

        let assertion = jsonwebtoken::encode(&header, &claims, &self.key)
            .map_err(|err| PortError::Auth(format!("signing assertion failed: {err}")))?;

        let request = self
            .http
            .post(&self.account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())]);
        let response = fetch_json::<TokenResponse>(request)
            .await
            .map_err(|err| match err {
                PortError::Status { status, message } => {
                    PortError::Auth(format!("token endpoint answered {status}: {message}"))
                }
                other => other,
            })?;

        Ok(CachedToken {
            expires_at: expiry(now, response.expires_in)?,
            value: response.access_token,
        })
    }
}

fn expiry(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>, PortError> {
    TimeDelta::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| PortError::Auth(format!("token endpoint returned unusable expires_in {expires_in}")))
}
