#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use config::ServiceIdentity;
use kb_sync::types::PublishStatus;
use kb_sync::{
    ContentSource, KbResult, KbSyncError, KnowledgeApi, Session, SourceRecord, SyncMetadata,
    TokenProvider
};
use regex::Regex;
use reqwest::Method;
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const EXTERNAL_ID_FIELD: &str = "External_Id__c";

pub fn identity() -> ServiceIdentity {
    ServiceIdentity {
        name: "knowledge".to_string(),
        login_url: "https://login.example.com".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        api_version: "v60.0".to_string(),
        timeout_seconds: 5
    }
}

pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
}

pub fn record(id: &str, name: &str) -> SourceRecord {
    SourceRecord::new(id, at(10)).with_name(name)
}

#[derive(Debug, Clone)]
pub struct StoredVersion {
    pub id: String,
    pub master_id: String,
    pub status: PublishStatus,
    pub version_number: u32,
    pub fields: Map<String, Value>
}

impl StoredVersion {
    fn external_id(&self) -> Option<&str> {
        self.fields.get(EXTERNAL_ID_FIELD).and_then(Value::as_str)
    }

    fn row(&self) -> Value {
        json!({
            "Id": self.id,
            "KnowledgeArticleId": self.master_id,
            "PublishStatus": self.status.as_str(),
            "VersionNumber": self.version_number,
            EXTERNAL_ID_FIELD: self.external_id()
        })
    }
}

#[derive(Default)]
struct KnowledgeState {
    versions: Vec<StoredVersion>,
    next_id: usize,
    fields: HashSet<String>,
    record_types: Vec<(String, String)>,
    calls: Vec<String>
}

/// Knowledge base fake that understands the queries and writes the sync
/// engine issues.
#[derive(Default)]
pub struct InMemoryKnowledgeBase {
    state: Mutex<KnowledgeState>,
    pub fail_publish: AtomicBool,
    reject_next: AtomicUsize,
    failing_ids: Mutex<HashSet<String>>,
    expiring_ids: Mutex<HashSet<String>>
}

fn unescape(literal: &str) -> String {
    let mut out = String::new();
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

impl InMemoryKnowledgeBase {
    pub fn new() -> Self {
        let kb = Self::default();
        kb.add_field(EXTERNAL_ID_FIELD);
        kb
    }

    pub fn add_field(&self, name: &str) {
        self.state.lock().unwrap().fields.insert(name.to_lowercase());
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.state.lock().unwrap().fields.contains(&name.to_lowercase())
    }

    pub fn add_record_type(&self, developer_name: &str, id: &str) {
        self.state
            .lock()
            .unwrap()
            .record_types
            .push((developer_name.to_string(), id.to_string()));
    }

    /// Fails create and update calls whose payload carries `external_id`.
    pub fn fail_writes_for(&self, external_id: &str) {
        self.failing_ids.lock().unwrap().insert(external_id.to_string());
    }

    /// Rejects the first lookup for `external_id` with 401.
    pub fn expire_session_on(&self, external_id: &str) {
        self.expiring_ids.lock().unwrap().insert(external_id.to_string());
    }

    /// Rejects the next `count` calls with 401.
    pub fn reject_next(&self, count: usize) {
        self.reject_next.store(count, Ordering::SeqCst);
    }

    /// Seeds a published article and returns its master id.
    pub fn seed_online(&self, external_id: &str, fields: Value) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let n = state.next_id;
        let mut fields = fields.as_object().cloned().unwrap_or_default();
        fields.insert(EXTERNAL_ID_FIELD.to_string(), json!(external_id));
        let version = StoredVersion {
            id: format!("ka{n:04}"),
            master_id: format!("kA{n:04}"),
            status: PublishStatus::Online,
            version_number: 1,
            fields
        };
        let master = version.master_id.clone();
        state.versions.push(version);
        master
    }

    pub fn set_status(&self, version_id: &str, status: PublishStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(v) = state.versions.iter_mut().find(|v| v.id == version_id) {
            v.status = status;
        }
    }

    pub fn versions_of(&self, external_id: &str) -> Vec<StoredVersion> {
        self.state
            .lock()
            .unwrap()
            .versions
            .iter()
            .filter(|v| v.external_id() == Some(external_id))
            .cloned()
            .collect()
    }

    pub fn version(&self, version_id: &str) -> Option<StoredVersion> {
        self.state
            .lock()
            .unwrap()
            .versions
            .iter()
            .find(|v| v.id == version_id)
            .cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn write_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| !c.starts_with("QUERY") && !c.starts_with("GET"))
            .count()
    }

    fn check_session(&self, label: String) -> KbResult<()> {
        self.state.lock().unwrap().calls.push(label);
        let pending = self.reject_next.load(Ordering::SeqCst);
        if pending > 0 {
            self.reject_next.store(pending - 1, Ordering::SeqCst);
            return Err(KbSyncError::Unauthorized("INVALID_SESSION_ID: Session expired".to_string()));
        }
        Ok(())
    }

    fn check_failing(&self, fields: &Map<String, Value>) -> KbResult<()> {
        let failing = self.failing_ids.lock().unwrap();
        match fields.get(EXTERNAL_ID_FIELD).and_then(Value::as_str) {
            Some(id) if failing.contains(id) => Err(KbSyncError::ApiError {
                status: 400,
                message: "FIELD_CUSTOM_VALIDATION_EXCEPTION: rejected".to_string()
            }),
            _ => Ok(())
        }
    }
}

#[async_trait]
impl KnowledgeApi for InMemoryKnowledgeBase {
    async fn query(&self, _session: &Session, soql: &str) -> KbResult<Vec<Value>> {
        self.check_session(format!("QUERY {soql}"))?;
        let literal = r"'((?:[^'\\]|\\.)*)'";

        let record_type = Regex::new(&format!(
            r"FROM RecordType WHERE SobjectType = {literal} AND DeveloperName = {literal}"
        ))
        .unwrap();
        if let Some(caps) = record_type.captures(soql) {
            let name = unescape(&caps[2]);
            let state = self.state.lock().unwrap();
            return Ok(state
                .record_types
                .iter()
                .filter(|(dev, _)| *dev == name)
                .map(|(_, id)| json!({ "Id": id }))
                .collect());
        }

        let by_id = Regex::new(&format!(r"FROM \w+ WHERE Id = {literal} LIMIT 1$")).unwrap();
        if let Some(caps) = by_id.captures(soql) {
            let id = unescape(&caps[1]);
            return Ok(self.version(&id).map(|v| v.row()).into_iter().collect());
        }

        let by_external = Regex::new(&format!(
            r"FROM \w+ WHERE (\w+) = {literal}(?: AND PublishStatus = {literal})? ORDER BY VersionNumber DESC LIMIT 1$"
        ))
        .unwrap();
        let caps = by_external
            .captures(soql)
            .ok_or_else(|| KbSyncError::ApiError {
                status: 400,
                message: format!("MALFORMED_QUERY: {soql}")
            })?;
        let external_id = unescape(&caps[2]);
        let status = caps.get(3).map(|m| unescape(m.as_str()));
        if self.expiring_ids.lock().unwrap().remove(&external_id) {
            return Err(KbSyncError::Unauthorized("INVALID_SESSION_ID: Session expired".to_string()));
        }

        let mut matches: Vec<StoredVersion> = self
            .versions_of(&external_id)
            .into_iter()
            .filter(|v| status.as_deref().is_none_or(|s| v.status.as_str() == s))
            .collect();
        matches.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        Ok(matches.first().map(StoredVersion::row).into_iter().collect())
    }

    async fn request(
        &self,
        _session: &Session,
        method: Method,
        path: &str,
        body: Option<&Value>
    ) -> KbResult<Value> {
        self.check_session(format!("{method} {path}"))?;
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let fields = body.and_then(Value::as_object).cloned().unwrap_or_default();

        match (method, segments.as_slice()) {
            (Method::POST, ["sobjects", _type]) => {
                self.check_failing(&fields)?;
                let mut state = self.state.lock().unwrap();
                state.next_id += 1;
                let n = state.next_id;
                let version = StoredVersion {
                    id: format!("ka{n:04}"),
                    master_id: format!("kA{n:04}"),
                    status: PublishStatus::Draft,
                    version_number: 1,
                    fields
                };
                let id = version.id.clone();
                state.versions.push(version);
                Ok(json!({ "id": id, "success": true, "errors": [] }))
            }
            (Method::PATCH, ["sobjects", _type, id]) => {
                let mut state = self.state.lock().unwrap();
                let version = state
                    .versions
                    .iter_mut()
                    .find(|v| v.id == *id)
                    .ok_or_else(|| KbSyncError::NotFound(path.to_string()))?;
                if version.status == PublishStatus::Online {
                    return Err(KbSyncError::ApiError {
                        status: 400,
                        message: "INVALID_STATUS: published versions cannot be edited".to_string()
                    });
                }
                let mut merged = version.fields.clone();
                merged.extend(fields);
                drop(state);
                self.check_failing(&merged)?;
                let mut state = self.state.lock().unwrap();
                if let Some(version) = state.versions.iter_mut().find(|v| v.id == *id) {
                    version.fields = merged;
                }
                Ok(Value::Null)
            }
            (Method::GET, ["sobjects", _type, "describe"]) => {
                let state = self.state.lock().unwrap();
                let fields: Vec<Value> = state.fields.iter().map(|f| json!({ "name": f })).collect();
                Ok(json!({ "fields": fields }))
            }
            (Method::POST, ["tooling", "sobjects", "CustomField"]) => {
                let full_name = fields
                    .get("FullName")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let field = full_name.rsplit('.').next().unwrap_or_default().to_string();
                self.add_field(&field);
                Ok(json!({ "id": format!("00N{field}") }))
            }
            _ => Err(KbSyncError::NotFound(path.to_string()))
        }
    }

    async fn create_draft_from_master(&self, _session: &Session, master_id: &str) -> KbResult<String> {
        self.check_session(format!("DRAFT {master_id}"))?;
        let mut state = self.state.lock().unwrap();
        if state
            .versions
            .iter()
            .any(|v| v.master_id == master_id && v.status == PublishStatus::Draft)
        {
            return Err(KbSyncError::ApiError {
                status: 400,
                message: "INVALID_OPERATION: draft already exists".to_string()
            });
        }
        let online = state
            .versions
            .iter()
            .filter(|v| v.master_id == master_id)
            .max_by_key(|v| v.version_number)
            .cloned()
            .ok_or_else(|| KbSyncError::NotFound(master_id.to_string()))?;

        state.next_id += 1;
        let id = format!("ka{:04}", state.next_id);
        state.versions.push(StoredVersion {
            id: id.clone(),
            master_id: master_id.to_string(),
            status: PublishStatus::Draft,
            version_number: online.version_number + 1,
            fields: online.fields
        });
        Ok(id)
    }

    async fn publish(&self, _session: &Session, version_ids: &[String]) -> KbResult<()> {
        self.check_session(format!("PUBLISH {}", version_ids.join(",")))?;
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(KbSyncError::UnexpectedResponse(
                "publish rejected: Article is locked".to_string()
            ));
        }
        let mut state = self.state.lock().unwrap();
        for id in version_ids {
            let Some(master) = state.versions.iter().find(|v| v.id == *id).map(|v| v.master_id.clone())
            else {
                continue;
            };
            for v in state.versions.iter_mut().filter(|v| v.master_id == master) {
                if v.id == *id {
                    v.status = PublishStatus::Online;
                } else if v.status == PublishStatus::Online {
                    v.status = PublishStatus::Archived;
                }
            }
        }
        Ok(())
    }
}

/// Token provider that counts acquisitions and can be told to start failing.
#[derive(Default)]
pub struct StaticTokenProvider {
    pub calls: AtomicUsize,
    pub invalidations: AtomicUsize,
    pub fail: AtomicBool,
    /// Start failing once a token has been invalidated.
    pub revoke_on_invalidate: AtomicBool
}

impl StaticTokenProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self, _identity: &ServiceIdentity) -> KbResult<Session> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(KbSyncError::AuthenticationError("invalid_client".to_string()));
        }
        Ok(Session {
            access_token: format!("token-{n}"),
            instance_url: "https://kb.example.com".to_string()
        })
    }

    async fn invalidate(&self, _identity: &ServiceIdentity) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        if self.revoke_on_invalidate.load(Ordering::SeqCst) {
            self.fail.store(true, Ordering::SeqCst);
        }
    }
}

/// Content source holding records in memory.
#[derive(Default)]
pub struct MemorySource {
    records: Mutex<Vec<SourceRecord>>,
    pub fail_persist: AtomicBool
}

impl MemorySource {
    pub fn new(records: Vec<SourceRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            fail_persist: AtomicBool::new(false)
        }
    }

    pub fn get(&self, id: &str) -> Option<SourceRecord> {
        self.records.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }

    pub fn touch(&self, id: &str, modified: DateTime<Utc>) {
        if let Some(r) = self.records.lock().unwrap().iter_mut().find(|r| r.id == id) {
            r.last_modified = modified;
        }
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn list_records(&self, _folder_ids: &[String], _recursive: bool) -> KbResult<Vec<SourceRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.online)
            .cloned()
            .collect())
    }

    async fn persist_sync_metadata(&self, metadata: &SyncMetadata) -> KbResult<()> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(KbSyncError::SourceError("source is read only".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == metadata.content_id)
            .ok_or_else(|| KbSyncError::SourceError(format!("unknown record {}", metadata.content_id)))?;
        record.mark_synced(metadata);
        Ok(())
    }
}
