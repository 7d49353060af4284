use std::process::ExitCode;
use clap::Parser;
use tracing::{error, warn};

use cli_interface::{print_fatal, print_report, Cli};
use provisioner::{exit_code, Provisioner, EXIT_FAILURE, EXIT_INTERRUPTED};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let color = !cli.no_color && console::colors_enabled_stderr();

    // keeps the file appender flushing until main returns
    let _log_guard = match logging::init(&cli.log_config()) {
        Ok(guard) => guard,
        Err(e) => {
            print_fatal(&format!("{:#}", e), color);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let config = match cli.config_manager().load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            print_fatal(&e.to_string(), color);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let mut provisioner = match Provisioner::new(config) {
        Ok(provisioner) => provisioner,
        Err(e) => {
            print_fatal(&format!("{:#}", e), color);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    // dropping the run future kills any child and removes the installer file
    let result = tokio::select! {
        result = provisioner.run() => result,
        _ = interrupted() => {
            warn!("Interrupted; no report printed");
            return ExitCode::from(EXIT_INTERRUPTED);
        }
    };

    match &result {
        Ok(outcome) => {
            if let Err(e) = print_report(&outcome.summary, cli.json, cli.use_color()) {
                error!("{:#}", e);
            }
        }
        Err(e) => print_fatal(&e.to_string(), color),
    }

    ExitCode::from(exit_code(&result))
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
