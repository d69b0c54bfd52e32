//! Terminal client for EdgeServer bot providers.
//!
//! `--agent bot` opens an interactive conversation; `--agent function` runs a
//! single JSON or form trigger and prints the result.

mod args;
mod bot;
mod commands;
mod errors;
mod function;
mod interrupt;

use std::process::ExitCode;

use clap::Parser as _;
use edgeserver_client::EdgeServerConfig;
use edgeserver_client::observability::init_observability_with_level;
use tracing::error;

use crate::args::{AgentMode, Cli};
use crate::errors::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_observability_with_level(Some(cli.effective_log_level()));

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(event = "cli.failed", domain = "edgeserver", error = %err);
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.api_key.trim().is_empty() {
        return Err(CliError::Usage(
            "bot provider API key is required (use --apikey or BOT_PROVIDER_API_KEY)".into(),
        ));
    }
    let config = EdgeServerConfig::new(
        cli.host.clone(),
        cli.namespace.clone(),
        cli.bot_provider_name.clone(),
        cli.api_key.clone(),
    );
    match cli.agent {
        AgentMode::Bot => bot::run(cli, config).await,
        AgentMode::Function => function::run(cli, config).await,
    }
}
