pub mod run;
pub mod validate;

use crate::ux_error;
use anyhow::Result;
use clap::{Parser, Subcommand};
use config::{ConfigError, SiteConfigSet, load_from_file};
use std::path::Path;
use tracing::warn;
use tracing_subscriber::{EnvFilter, Registry, reload};

#[derive(Parser)]
#[command(
    name = "kbsync",
    author,
    version,
    about = "kbsync - export content repository records into a knowledge base",
    long_about = "Reads a multi-site configuration document, maps content records to knowledge \
                  articles and upserts them as drafts.\n\nCredentials come from KBSYNC_CLIENT_ID \
                  and KBSYNC_CLIENT_SECRET; use --dry-run to preview payloads without them."
)]
pub struct Cli {
    /// Enable debug logging regardless of site settings
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Validate a site's configuration and show the effective settings")]
    Validate(validate::ValidateArgs),

    #[command(about = "Export content records to the knowledge base")]
    Run(run::RunArgs),
}

/// Runtime control over the log filter installed by `main`.
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
    pinned: bool,
}

impl LogControl {
    /// `pinned` is set when `RUST_LOG` chose the filter.
    pub fn new(handle: reload::Handle<EnvFilter, Registry>, pinned: bool) -> Self {
        Self { handle, pinned }
    }

    pub fn enable_debug(&self) {
        if self.pinned {
            return;
        }
        if let Err(e) = self.handle.modify(|filter| *filter = EnvFilter::new("debug")) {
            warn!(error = %e, "Failed to raise log level");
        }
    }
}

pub(crate) fn load_sites(path: &Path) -> Result<SiteConfigSet> {
    load_from_file(path).map_err(|e| match e {
        ConfigError::FileNotFound(p) => ux_error::config_not_found(&p).into(),
        ConfigError::Malformed => ux_error::config_malformed(&path.display().to_string()).into(),
        other => anyhow::Error::new(other),
    })
}

pub(crate) fn config_error(err: ConfigError) -> anyhow::Error {
    match err {
        ConfigError::Invalid { site, errors } => ux_error::invalid_config(&site, &errors).into(),
        other => anyhow::Error::new(other),
    }
}
