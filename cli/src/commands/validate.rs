//! Validate command - shows how a site's configuration resolves.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use config::EffectiveConfig;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;

use super::{config_error, load_sites};
use crate::output;

#[derive(Args)]
pub struct ValidateArgs {
    /// Site configuration document
    #[arg(long, short, env = "KBSYNC_CONFIG")]
    pub config: PathBuf,

    /// Site id; sites without their own block use `_defaults`
    #[arg(long, short)]
    pub site: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ValidateArgs) -> Result<ExitCode> {
    let sites = load_sites(&args.config)?;
    let report = sites.check(&args.site);
    let effective = if report.valid {
        Some(sites.effective(&args.site).map_err(config_error)?)
    } else {
        None
    };

    if args.json {
        let body = json!({
            "site": args.site,
            "hasSiteBlock": sites.has_site(&args.site),
            "report": report,
            "effective": effective
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        output::header(&format!("Configuration: {}", args.site));
        println!();
        let block = if sites.has_site(&args.site) {
            "own block merged over _defaults".to_string()
        } else {
            "_defaults only".dimmed().to_string()
        };
        output::field("Source", block);
        println!();

        for error in &report.errors {
            output::failure(error);
        }
        for warning in &report.warnings {
            output::warn(warning);
        }

        match &effective {
            Some(config) => print_effective(config)?,
            None => println!(
                "\n{} {} error(s)",
                "Invalid:".red().bold(),
                report.errors.len(),
            ),
        }
    }

    Ok(if report.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_effective(config: &EffectiveConfig) -> Result<()> {
    output::success("Configuration is valid");
    println!();
    output::subheader("Effective settings");
    output::field("Article type", &config.article_type);
    output::field("Export mode", format!("{:?}", config.export_mode).to_lowercase());
    output::field("Batch size", config.batch_size);
    output::field("Publish", config.publish_articles);
    output::field("Folders", config.content_folder_ids.join(", "));
    output::field("Mapped fields", config.field_mapping.len());
    output::field("External id field", &config.external_id_field);
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
