use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

mod commands;
mod output;
pub mod ux_error;

use commands::{Cli, Commands, LogControl};

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().ok();
    let pinned = env_filter.is_some();
    let (filter, handle) = reload::Layer::<EnvFilter, Registry>::new(
        env_filter.unwrap_or_else(|| EnvFilter::new("info")),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let logging = LogControl::new(handle, pinned);
    if cli.verbose {
        logging.enable_debug();
    }

    let outcome = match cli.command {
        Commands::Validate(args) => commands::validate::run(args),
        Commands::Run(args) => commands::run::run(args, &logging).await,
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            match err.downcast_ref::<ux_error::UxError>() {
                Some(ux) => ux.display(),
                None => output::error(&format!("{err:#}")),
            }
            ExitCode::FAILURE
        }
    }
}
