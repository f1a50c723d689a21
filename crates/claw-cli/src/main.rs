//! claw CLI binary entrypoint.

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use claw_cli::cli::{Cli, Commands};
use claw_cli::commands::{CallCommand, StatusCommand, WatchCommand};
use claw_cli::config;
use claw_cli::output::OutputFormat;

const DEFAULT_LOG_FILTER: &str = "claw=info,claw_cli=info,claw_link=info";

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), claw_cli::CliError> {
    let format = OutputFormat::new(cli.format);
    let connect_timeout = Duration::from_secs(cli.connect_timeout);
    let config = config::resolve(&cli).await?;
    debug!(url = %config.url, "resolved gateway configuration");
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Status => {
            let cmd = StatusCommand::new(config, connect_timeout);
            cmd.execute(&mut stdout, &format).await?;
        }
        Commands::Call(args) => {
            let cmd = CallCommand::new(config, connect_timeout);
            cmd.execute(&mut stdout, &format, &args).await?;
        }
        Commands::Watch(args) => {
            let cmd = WatchCommand::new(config, connect_timeout);
            let shutdown = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            cmd.execute(&mut stdout, &format, &args, shutdown).await?;
        }
    }

    Ok(())
}
