//! YouTube Data API v3 client.
//!
//! One client serves both sides of the relay: it lists new uploads on the
//! source channel ([`crate::source::VideoSource`]) and uploads the branded
//! result ([`crate::publish::Publisher`]). Base URLs come from config so
//! tests can point the client at a mock server.

mod search;
pub mod types;
mod upload;

use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::CredentialProvider;
use crate::config::YouTubeConfig;

/// Results per listing page (the API maximum).
pub const PAGE_SIZE: u32 = 50;

pub struct YouTubeClient {
    /// Client for metadata calls, with a timeout.
    api: Client,
    /// Client for media transfers, without a timeout.
    upload: Client,
    api_base: String,
    upload_base: String,
    credentials: Arc<dyn CredentialProvider>,
    max_pages: u32,
}

impl YouTubeClient {
    pub fn new(config: &YouTubeConfig, credentials: Arc<dyn CredentialProvider>, max_pages: u32) -> Self {
        let api = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            api,
            upload: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_base: config.upload_base.trim_end_matches('/').to_string(),
            credentials,
            max_pages: max_pages.max(1),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn upload_url(&self, path: &str) -> String {
        format!("{}{}", self.upload_base, path)
    }
}

/// Split a response into success, or `(status, message)` for an API error.
async fn check_status(response: Response) -> Result<Response, (u16, String)> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err((status.as_u16(), error_message(status, &body)))
}

/// Extract the human-readable message from a Google error envelope.
fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<types::ErrorEnvelope>(body) {
        Ok(env) if !env.error.message.is_empty() => env.error.message,
        _ if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        _ => body.trim().chars().take(500).collect(),
    }
}
