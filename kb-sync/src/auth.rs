use crate::error::{KbResult, KbSyncError};
use async_trait::async_trait;
use config::ServiceIdentity;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Authenticated access to the knowledge base instance.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub instance_url: String
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"***")
            .field("instance_url", &self.instance_url)
            .finish()
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self, identity: &ServiceIdentity) -> KbResult<Session>;

    /// Drops any token the provider itself holds for `identity`.
    async fn invalidate(&self, _identity: &ServiceIdentity) {}
}

/// OAuth2 client-credentials flow against `{login_url}/services/oauth2/token`.
pub struct ClientCredentialsAuth {
    http_client: Client
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    instance_url: String
}

impl ClientCredentialsAuth {
    pub fn new(timeout: Duration) -> KbResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(KbSyncError::HttpError)?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsAuth {
    async fn get_token(&self, identity: &ServiceIdentity) -> KbResult<Session> {
        let token_url = format!(
            "{}/services/oauth2/token",
            identity.login_url.trim_end_matches('/')
        );
        debug!(url = %token_url, identity = %identity.name, "Requesting access token");

        let body = format!(
            "grant_type=client_credentials&client_id={}&client_secret={}",
            urlencoding::encode(&identity.client_id),
            urlencoding::encode(&identity.client_secret)
        );

        let response = self
            .http_client
            .post(&token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| KbSyncError::AuthenticationError(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_body = response.text().await.unwrap_or_default();
            return Err(KbSyncError::AuthenticationError(format!(
                "Token request failed: {} - {}",
                status, error_body
            )));
        }

        let token_response: OAuthTokenResponse = response.json().await.map_err(|e| {
            KbSyncError::AuthenticationError(format!("Failed to parse token response: {}", e))
        })?;

        Ok(Session {
            access_token: token_response.access_token,
            instance_url: token_response.instance_url.trim_end_matches('/').to_string()
        })
    }
}
