//! # Site Configuration
//!
//! Multi-site configuration for the knowledge base sync engine.
//!
//! This crate provides:
//! - Parsing of the site configuration document (`_defaults` + site blocks)
//! - Site-over-defaults merging with shallow-merged static fields
//! - Validation reports with errors and warnings
//! - The typed [`EffectiveConfig`] consumed by the sync engine
//! - Transform declarations ([`TransformSpec`])
//! - Service identity loading from environment variables

pub mod config;
pub mod error;
pub mod file_loader;
pub mod loader;
pub mod precedence;
pub mod site;
pub mod transform_spec;
pub mod validation;

pub use config::{EffectiveConfig, ExportMode, FieldMapping};
pub use error::ConfigError;
pub use file_loader::load_from_file;
pub use loader::{ServiceIdentity, load_service_identity_from_env};
pub use precedence::merge_site_config;
pub use site::{DEFAULTS_KEY, SiteConfigSet, normalize_content_folder_ids};
pub use transform_spec::{TransformChain, TransformSpec, TransformSpecError};
pub use validation::{ValidationReport, validate};
