//! shiftboard CLI entry point.

use std::process::ExitCode;

use chrono::Local;
use clap::Parser;

use shiftboard_cli::cli::{Cli, Command, ConfigAction};
use shiftboard_cli::commands;
use shiftboard_cli::config::ClientConfig;
use shiftboard_cli::error::{ClientError, ClientResult};
use shiftboard_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_config(&cli);

    let tracing = if cli.log_json {
        TracingConfig::unattended()
    } else if cli.debug || config.as_ref().is_ok_and(|c| c.debug) {
        TracingConfig::verbose()
    } else {
        TracingConfig::default()
    };
    if let Err(e) = init_tracing(tracing) {
        eprintln!("warning: {}", e);
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(ClientError::Strict(count)) => {
            eprintln!("error: {} warning(s) reported, failing because of --strict", count);
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig, String> {
    match cli.config {
        Some(ref path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    }
}

async fn run(cli: Cli, config: Result<ClientConfig, String>) -> ClientResult<()> {
    let mut config = config.map_err(ClientError::Config)?;
    cli.apply_to(&mut config);

    let today = Local::now().date_naive();
    match cli.command {
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => commands::config::validate(&config, today),
            ConfigAction::Path => commands::config::path(),
        },
        None => commands::run::run(&config, today, cli.strict).await,
    }
}
