//! Custom field existence checks and creation before a run.

use crate::auth::Session;
use crate::client::KnowledgeApi;
use crate::context::RunContext;
use crate::error::{KbResult, KbSyncError};
use async_trait::async_trait;
use config::EffectiveConfig;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

const CUSTOM_FIELD_SUFFIX: &str = "__c";
const DEFAULT_FIELD_TYPE: &str = "Text";
const DEFAULT_TEXT_LENGTH: u64 = 255;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStatus {
    pub exists: bool,
    pub field_id: Option<String>
}

#[async_trait]
pub trait FieldProvisioner: Send + Sync {
    async fn field_exists(
        &self,
        session: &Session,
        resource_type: &str,
        field: &str
    ) -> KbResult<FieldStatus>;

    /// Creates `field` on `resource_type` and returns the new field id.
    async fn create_field(
        &self,
        session: &Session,
        resource_type: &str,
        field: &str,
        type_spec: &Value
    ) -> KbResult<String>;
}

/// Checks fields through the object describe call and creates them through
/// the tooling `CustomField` endpoint.
pub struct DescribeFieldProvisioner {
    api: Arc<dyn KnowledgeApi>
}

impl DescribeFieldProvisioner {
    pub fn new(api: Arc<dyn KnowledgeApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl FieldProvisioner for DescribeFieldProvisioner {
    async fn field_exists(
        &self,
        session: &Session,
        resource_type: &str,
        field: &str
    ) -> KbResult<FieldStatus> {
        let path = format!("/sobjects/{}/describe", resource_type);
        let describe = self.api.request(session, Method::GET, &path, None).await?;

        let found = describe
            .get("fields")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find(|f| {
                f.get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| name.eq_ignore_ascii_case(field))
            });

        Ok(FieldStatus {
            exists: found.is_some(),
            field_id: found
                .and_then(|f| f.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }

    async fn create_field(
        &self,
        session: &Session,
        resource_type: &str,
        field: &str,
        type_spec: &Value
    ) -> KbResult<String> {
        let body = custom_field_body(resource_type, field, type_spec);
        let response = self
            .api
            .request(session, Method::POST, "/tooling/sobjects/CustomField", Some(&body))
            .await?;

        response
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                KbSyncError::ProvisioningError(format!("creating {resource_type}.{field} returned no id"))
            })
    }
}

/// Tooling payload for a new custom field. `type_spec` may set `type`,
/// `label`, `length` and any other metadata key; missing values default to
/// a 255 character text field labelled after the field name.
pub fn custom_field_body(resource_type: &str, field: &str, type_spec: &Value) -> Value {
    let default_label = field.trim_end_matches(CUSTOM_FIELD_SUFFIX).replace('_', " ");
    let mut metadata = json!({
        "label": default_label,
        "type": DEFAULT_FIELD_TYPE
    });

    if let (Some(target), Some(spec)) = (metadata.as_object_mut(), type_spec.as_object()) {
        for (key, value) in spec {
            target.insert(key.clone(), value.clone());
        }
        let is_text = target.get("type").and_then(Value::as_str) == Some(DEFAULT_FIELD_TYPE);
        if is_text && !target.contains_key("length") {
            target.insert("length".to_string(), json!(DEFAULT_TEXT_LENGTH));
        }
    } else if let Some(target) = metadata.as_object_mut() {
        target.insert("length".to_string(), json!(DEFAULT_TEXT_LENGTH));
    }

    json!({
        "FullName": format!("{}.{}", resource_type, field),
        "Metadata": metadata
    })
}

/// Custom fields the payload may write: mapped targets, static keys and the
/// external id field.
pub fn custom_fields(config: &EffectiveConfig) -> Vec<String> {
    let mut fields: Vec<String> = config
        .target_fields()
        .into_iter()
        .chain(std::iter::once(config.external_id_field.clone()))
        .filter(|f| f.ends_with(CUSTOM_FIELD_SUFFIX))
        .collect();
    fields.sort();
    fields.dedup();
    fields
}

/// Ensures every custom field the configuration writes exists, creating it
/// when `autoCreateFields` is on. Fields still missing afterwards are removed
/// from the mapping and static values so records do not fail on them.
pub async fn prepare_fields(
    provisioner: &dyn FieldProvisioner,
    ctx: &mut RunContext,
    mut config: EffectiveConfig
) -> KbResult<EffectiveConfig> {
    let resource_type = config.article_type.clone();
    let mut missing = Vec::new();

    for field in custom_fields(&config) {
        if ensure_field(provisioner, ctx, &config, &resource_type, &field).await? {
            continue;
        }
        missing.push(field);
    }

    for field in &missing {
        if *field == config.external_id_field {
            return Err(KbSyncError::ProvisioningError(format!(
                "external id field {resource_type}.{field} does not exist"
            )));
        }
        warn!(field = %field, resource_type = %resource_type, "Field does not exist, dropped from payload");
        config.field_mapping.remove(field);
        config.static_fields.remove(field);
        config.transforms.remove(field);
    }

    Ok(config)
}

async fn ensure_field(
    provisioner: &dyn FieldProvisioner,
    ctx: &mut RunContext,
    config: &EffectiveConfig,
    resource_type: &str,
    field: &str
) -> KbResult<bool> {
    if let Some(exists) = ctx.cached_field(resource_type, field) {
        return Ok(exists);
    }

    let session = ctx.session().await?;
    let status = provisioner.field_exists(&session, resource_type, field).await;
    ctx.observe(&status).await;
    let mut exists = match status {
        Ok(status) => status.exists,
        Err(e) if e.aborts_run() => return Err(e),
        Err(e) => {
            warn!(field, error = %e, "Field existence check failed");
            false
        }
    };

    if !exists && config.auto_create_fields {
        let type_spec = config.field_metadata.get(field).cloned().unwrap_or(Value::Null);
        let created = provisioner
            .create_field(&session, resource_type, field, &type_spec)
            .await;
        ctx.observe(&created).await;
        match created {
            Ok(field_id) => {
                info!(field, field_id = %field_id, "Created custom field");
                exists = true;
            }
            Err(e) if e.aborts_run() => return Err(e),
            Err(e) => warn!(field, error = %e, "Failed to create custom field")
        }
    }

    ctx.remember_field(resource_type, field, exists);
    Ok(exists)
}
