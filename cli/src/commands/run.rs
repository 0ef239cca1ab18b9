//! Run command - exports a site's content records.

use anyhow::Result;
use clap::Args;
use config::{ConfigError, ExportMode, load_service_identity_from_env};
use kb_sync::{
    ClientCredentialsAuth, DescribeFieldProvisioner, JsonFileSource, KbSyncError,
    KnowledgeSyncService, RunReport, RunStatus, create_knowledge_client,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{LogControl, config_error, load_sites};
use crate::output;
use crate::ux_error;

#[derive(Args)]
pub struct RunArgs {
    /// Site configuration document
    #[arg(long, short, env = "KBSYNC_CONFIG")]
    pub config: PathBuf,

    /// Site id; sites without their own block use `_defaults`
    #[arg(long, short)]
    pub site: String,

    /// Content export (JSON folders and records)
    #[arg(long, env = "KBSYNC_SOURCE")]
    pub source: PathBuf,

    /// Override the configured export mode: delta or full
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<ExportMode>,

    /// Print the payloads that would be sent without contacting the knowledge base
    #[arg(long)]
    pub dry_run: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_mode(value: &str) -> Result<ExportMode, String> {
    value.parse::<ExportMode>().map_err(|e| e.to_string())
}

/// Exit code for a completed run: partial runs are distinguishable from
/// total failures.
pub fn exit_code(status: RunStatus) -> ExitCode {
    match status {
        RunStatus::Success | RunStatus::Empty => ExitCode::SUCCESS,
        RunStatus::Partial => ExitCode::from(2),
        RunStatus::Failed => ExitCode::FAILURE,
    }
}

pub async fn run(args: RunArgs, logging: &LogControl) -> Result<ExitCode> {
    let sites = load_sites(&args.config)?;
    let mut config = sites.effective(&args.site).map_err(config_error)?;
    if let Some(mode) = args.mode {
        config.export_mode = mode;
    }
    if config.enable_debug_logging {
        logging.enable_debug();
    }

    let source = Arc::new(JsonFileSource::new(&args.source));

    if args.dry_run {
        info!(site = %args.site, "Dry run, no knowledge base calls");
        let previews = kb_sync::preview(source.as_ref(), config).await?;
        println!("{}", serde_json::to_string_pretty(&previews)?);
        return Ok(ExitCode::SUCCESS);
    }

    let identity = load_service_identity_from_env().map_err(|e| match e {
        ConfigError::MissingEnv(variable) => ux_error::missing_credentials(&variable).into(),
        other => anyhow::Error::new(other),
    })?;
    let timeout = Duration::from_secs(identity.timeout_seconds);
    let api = create_knowledge_client(&identity.api_version, timeout)?;
    let auth = Arc::new(ClientCredentialsAuth::new(timeout)?);
    let service = KnowledgeSyncService::new(identity, api.clone(), auth, source)
        .with_provisioner(Arc::new(DescribeFieldProvisioner::new(api)));

    let report = match service.run(&args.site, config).await {
        Ok(report) => report,
        Err(KbSyncError::AuthenticationError(reason)) => {
            return Err(ux_error::authentication_failed(&reason).into());
        }
        Err(e) => return Err(e.into()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(exit_code(report.status))
}

fn print_report(report: &RunReport) {
    let summary = &report.summary;
    output::header(&format!("Run Report: {}", report.site_id));
    println!();
    output::field("Status", format!("{:?}", report.status).to_lowercase());
    output::field("Mode", format!("{:?}", report.export_mode).to_lowercase());
    output::field("Processed", summary.total_processed);
    output::field("Succeeded", summary.total_success);
    output::field("Failed", summary.total_failed);
    output::field("Skipped", report.skipped);
    if summary.metadata_failures > 0 {
        output::field("Metadata failures", summary.metadata_failures);
    }
    println!();

    for result in &summary.details {
        if result.success {
            let operation = result
                .operation
                .map(|op| format!("{op:?}").to_lowercase())
                .unwrap_or_default();
            output::success(&format!(
                "{} {} {}",
                result.content_id,
                operation,
                result.version_id.as_deref().unwrap_or_default(),
            ));
            if let Some(warning) = &result.warning {
                output::warn(&format!("{}: {}", result.content_id, warning));
            }
        } else {
            output::failure(&format!(
                "{}: {}",
                result.content_id,
                result.error.as_deref().unwrap_or("unknown error"),
            ));
        }
    }
}
