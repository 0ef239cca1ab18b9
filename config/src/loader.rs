//! # Environment Variable Loader
//!
//! Loads the knowledge base service identity from environment variables
//! following 12-factor app principles. Credentials never live in the site
//! configuration document.
//!
//! # Naming Convention
//! - `KBSYNC_*`: knowledge base connection settings

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

pub const DEFAULT_API_VERSION: &str = "v60.0";
pub const DEFAULT_LOGIN_URL: &str = "https://login.salesforce.com";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Credentials and endpoints of the remote knowledge base.
///
/// `name` identifies the identity in token caches; two identities with the
/// same name share a cached token within a run.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub name: String,
    pub login_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub api_version: String,
    pub timeout_seconds: u64,
}

impl fmt::Debug for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceIdentity")
            .field("name", &self.name)
            .field("login_url", &self.login_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("api_version", &self.api_version)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Load the service identity from environment variables.
///
/// # M-CANONICAL-DOCS
///
/// ## Environment Variables
/// - `KBSYNC_CLIENT_ID`: OAuth client id (required)
/// - `KBSYNC_CLIENT_SECRET`: OAuth client secret (required)
/// - `KBSYNC_LOGIN_URL`: token endpoint host (default:
///   "https://login.salesforce.com")
/// - `KBSYNC_SERVICE_NAME`: identity name used as cache key (default:
///   "knowledge")
/// - `KBSYNC_API_VERSION`: REST API version (default: "v60.0")
/// - `KBSYNC_TIMEOUT_SECONDS`: HTTP timeout in seconds (default: 30)
pub fn load_service_identity_from_env() -> Result<ServiceIdentity, ConfigError> {
    Ok(ServiceIdentity {
        name: env::var("KBSYNC_SERVICE_NAME").unwrap_or_else(|_| "knowledge".to_string()),
        login_url: env::var("KBSYNC_LOGIN_URL").unwrap_or_else(|_| DEFAULT_LOGIN_URL.to_string()),
        client_id: required_env("KBSYNC_CLIENT_ID")?,
        client_secret: required_env("KBSYNC_CLIENT_SECRET")?,
        api_version: env::var("KBSYNC_API_VERSION")
            .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
        timeout_seconds: parse_env("KBSYNC_TIMEOUT_SECONDS").unwrap_or(DEFAULT_TIMEOUT_SECONDS),
    })
}

fn required_env(key: &str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnv(key.to_string())),
    }
}

fn parse_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok().and_then(|s| s.parse::<T>().ok())
}
