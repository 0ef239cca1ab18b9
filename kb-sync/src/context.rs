//! Per-run state: the token memo and lookups that are cached for the
//! duration of one export run.

use crate::auth::{Session, TokenProvider};
use crate::error::{KbResult, KbSyncError};
use config::ServiceIdentity;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// State shared by every record of one run. A new context is created for
/// each run, so nothing leaks between runs.
pub struct RunContext {
    identity: ServiceIdentity,
    auth: Arc<dyn TokenProvider>,
    token: Option<(String, Session)>,
    record_type_ids: HashMap<String, Option<String>>,
    field_exists: HashMap<String, bool>
}

impl RunContext {
    pub fn new(identity: ServiceIdentity, auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            identity,
            auth,
            token: None,
            record_type_ids: HashMap::new(),
            field_exists: HashMap::new()
        }
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    /// Returns the cached session, acquiring one if the slot is empty or
    /// belongs to another identity. Any acquisition failure is reported as
    /// an authentication error.
    pub async fn session(&mut self) -> KbResult<Session> {
        if let Some((name, session)) = &self.token {
            if *name == self.identity.name {
                return Ok(session.clone());
            }
        }

        debug!(identity = %self.identity.name, "Acquiring access token");
        let session = self
            .auth
            .get_token(&self.identity)
            .await
            .map_err(|e| match e {
                KbSyncError::AuthenticationError(_) => e,
                other => KbSyncError::AuthenticationError(other.to_string())
            })?;

        self.token = Some((self.identity.name.clone(), session.clone()));
        Ok(session)
    }

    pub async fn invalidate_token(&mut self) {
        if self.token.take().is_some() {
            warn!(identity = %self.identity.name, "Access token rejected, cleared cached token");
        }
        self.auth.invalidate(&self.identity).await;
    }

    /// Clears the token when `result` reports that it was rejected.
    pub async fn observe<T>(&mut self, result: &KbResult<T>) {
        if matches!(result, Err(e) if e.is_unauthorized()) {
            self.invalidate_token().await;
        }
    }

    pub fn cached_record_type(&self, key: &str) -> Option<Option<String>> {
        self.record_type_ids.get(key).cloned()
    }

    pub fn remember_record_type(&mut self, key: impl Into<String>, id: Option<String>) {
        self.record_type_ids.insert(key.into(), id);
    }

    pub fn cached_field(&self, resource_type: &str, field: &str) -> Option<bool> {
        self.field_exists.get(&field_key(resource_type, field)).copied()
    }

    pub fn remember_field(&mut self, resource_type: &str, field: &str, exists: bool) {
        self.field_exists.insert(field_key(resource_type, field), exists);
    }
}

fn field_key(resource_type: &str, field: &str) -> String {
    format!("{}.{}", resource_type, field.to_ascii_lowercase())
}
