//! Access-token providers for the video platform.
//!
//! The pipeline only needs a bearer token. Obtaining the first token through
//! a browser consent screen is out of scope: the authorized-user file it
//! produces is read here and refreshed headlessly from then on.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::AuthError;

/// Tokens expiring sooner than this are refreshed first.
const EXPIRY_SKEW_SECS: i64 = 60;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// A bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
}

impl Credential {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Source of access credentials.
#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credential(&self) -> Result<Credential, AuthError>;
}

/// A fixed, externally managed token.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait::async_trait]
impl CredentialProvider for StaticTokenProvider {
    async fn credential(&self) -> Result<Credential, AuthError> {
        Ok(Credential {
            access_token: self.token.clone(),
        })
    }
}

/// On-disk "authorized user" credential, as written by Google's client libraries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub expiry: Option<String>,
    /// Fields this tool does not use (scopes, account, ...), preserved on rewrite.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AuthorizedUser {
    /// Parse the stored expiry. Accepts RFC 3339 and naive UTC timestamps.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.expiry.as_deref()?.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Whether the stored token can be used at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        if self.token.as_deref().map(str::is_empty).unwrap_or(true) {
            return false;
        }
        match self.expires_at() {
            Some(at) => at - now > Duration::seconds(EXPIRY_SKEW_SECS),
            // No expiry recorded: trust the token until the API says otherwise.
            None => self.expiry.is_none(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Authorized-user credential file with automatic refresh.
pub struct AuthorizedUserProvider {
    path: PathBuf,
    client: Client,
    state: Mutex<Option<AuthorizedUser>>,
}

impl AuthorizedUserProvider {
    pub fn new(path: impl Into<PathBuf>, client: Client) -> Self {
        Self {
            path: path.into(),
            client,
            state: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<AuthorizedUser, AuthError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::MissingCredentials {
                    path: self.path.clone(),
                })
            }
            Err(e) => {
                return Err(AuthError::InvalidCredentials {
                    path: self.path.clone(),
                    message: e.to_string(),
                })
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| AuthError::InvalidCredentials {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    async fn refresh(&self, user: &mut AuthorizedUser, now: DateTime<Utc>) -> Result<(), AuthError> {
        let refresh_token = user
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Refresh("token expired and no refresh_token is stored".into()))?;
        let token_uri = user
            .token_uri
            .clone()
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());

        tracing::debug!("Refreshing access token via {}", token_uri);

        let response = self
            .client
            .post(&token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", user.client_id.as_str()),
                ("client_secret", user.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Refresh(format!("{}: {}", status.as_u16(), body.trim())));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Refresh(format!("invalid token response: {}", e)))?;

        user.token = Some(token.access_token);
        user.expiry = token.expires_in.map(|secs| {
            (now + Duration::seconds(secs)).to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        });
        if let Some(rotated) = token.refresh_token {
            user.refresh_token = Some(rotated);
        }

        let bytes = serde_json::to_vec_pretty(user).map_err(vidrelay_common::Error::from)?;
        vidrelay_common::paths::write_atomic(&self.path, &bytes)?;

        tracing::info!("Access token refreshed; expires at {:?}", user.expiry);
        Ok(())
    }
}

#[async_trait::async_trait]
impl CredentialProvider for AuthorizedUserProvider {
    async fn credential(&self) -> Result<Credential, AuthError> {
        // Held across the refresh so concurrent callers share one refresh.
        let mut guard = self.state.lock().await;
        if guard.is_none() {
            *guard = Some(self.load()?);
        }
        let user = match guard.as_mut() {
            Some(user) => user,
            None => {
                return Err(AuthError::MissingCredentials {
                    path: self.path.clone(),
                })
            }
        };

        let now = Utc::now();
        if !user.is_fresh(now) {
            self.refresh(user, now).await?;
        }

        user.token
            .clone()
            .map(|access_token| Credential { access_token })
            .ok_or_else(|| AuthError::Refresh("no access token after refresh".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user(token: Option<&str>, expiry: Option<&str>) -> AuthorizedUser {
        AuthorizedUser {
            token: token.map(String::from),
            refresh_token: Some("1//refresh".into()),
            token_uri: None,
            client_id: "id".into(),
            client_secret: "secret".into(),
            expiry: expiry.map(String::from),
            extra: Default::default(),
        }
    }

    #[test]
    fn test_expiry_formats() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(user(None, Some("2024-05-01T10:00:00Z")).expires_at(), Some(at));
        assert_eq!(
            user(None, Some("2024-05-01T10:00:00.000000")).expires_at(),
            Some(at)
        );
        assert_eq!(user(None, Some("garbage")).expires_at(), None);
    }

    #[test]
    fn test_freshness() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert!(user(Some("t"), Some("2024-05-01T11:00:00Z")).is_fresh(now));
        // Inside the skew window counts as expired.
        assert!(!user(Some("t"), Some("2024-05-01T10:00:30Z")).is_fresh(now));
        assert!(!user(None, Some("2024-05-01T11:00:00Z")).is_fresh(now));
        assert!(user(Some("t"), None).is_fresh(now));
        assert!(!user(Some("t"), Some("garbage")).is_fresh(now));
    }

    #[test]
    fn test_extra_fields_preserved() {
        let json = r#"{"token":"t","refresh_token":"r","client_id":"c","client_secret":"s",
                       "scopes":["https://www.googleapis.com/auth/youtube.force-ssl"]}"#;
        let parsed: AuthorizedUser = serde_json::from_str(json).unwrap();
        let back = serde_json::to_value(&parsed).unwrap();
        assert!(back.get("scopes").is_some());
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticTokenProvider::new("abc");
        let cred = provider.credential().await.unwrap();
        assert_eq!(cred.bearer(), "Bearer abc");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let provider = AuthorizedUserProvider::new(dir.path().join("creds.json"), Client::new());
        let err = provider.credential().await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredentials { .. }));
    }

    #[tokio::test]
    async fn test_fresh_token_used_without_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        let expiry = (Utc::now() + Duration::hours(1)).to_rfc3339();
        std::fs::write(
            &path,
            serde_json::to_vec(&user(Some("live-token"), Some(&expiry))).unwrap(),
        )
        .unwrap();

        let provider = AuthorizedUserProvider::new(&path, Client::new());
        assert_eq!(provider.credential().await.unwrap().access_token, "live-token");
    }
}
