//! Payload assembly: raw mapping, then transforms, then static fields.

use crate::mapper::{MappingRequest, map_record};
use crate::transform::apply_multiple_transforms;
use crate::types::SourceRecord;
use config::EffectiveConfig;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Builds article payloads for one site configuration.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    config: EffectiveConfig
}

impl PayloadBuilder {
    pub fn new(config: EffectiveConfig) -> Self {
        if config.static_fields.contains_key(&config.external_id_field) {
            warn!(
                field = %config.external_id_field,
                "Static value for the external id field is ignored"
            );
        }
        Self { config }
    }

    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    /// Builds the payload sent for `source`. `is_create` controls
    /// create-only fields such as the language.
    pub fn build(&self, source: &SourceRecord, is_create: bool) -> Map<String, Value> {
        let config = &self.config;
        let request = MappingRequest {
            target_type: &config.article_type,
            field_mapping: &config.field_mapping,
            data_category: config.data_category.as_deref(),
            is_create,
            language: &config.language,
            debug: config.enable_debug_logging
        };

        let mut payload = map_record(source, &request);

        for (field, chain) in &config.transforms {
            let Some(current) = payload.get(field) else {
                continue;
            };
            let transformed = apply_multiple_transforms(current, chain.specs(), field);
            match &transformed {
                Value::String(s) if s.is_empty() => {
                    debug!(content_id = %source.id, field, "Transform produced empty value, field omitted");
                    payload.remove(field);
                }
                _ => {
                    payload.insert(field.clone(), transformed);
                }
            }
        }

        for (field, value) in &config.static_fields {
            if *field == config.external_id_field {
                continue;
            }
            if config.transforms.contains_key(field) && payload.contains_key(field) {
                debug!(content_id = %source.id, field, "Static value overrides transformed value");
            }
            payload.insert(field.clone(), value.clone());
        }

        payload.insert(
            config.external_id_field.clone(),
            Value::String(source.id.clone())
        );

        payload
    }
}
