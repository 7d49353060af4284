//! Background service control for the model-serving tool

use std::time::Duration;
use tracing::{debug, info};

use command_executor::{CommandExecutor, CommandSpec};
use common::error::StepError;
use common::types::{CommandLine, OsFamily, PlatformProfile};

/// Starts the service and enables it at boot through systemd
pub async fn start_and_enable(
    executor: &dyn CommandExecutor,
    profile: &PlatformProfile,
    service: &str,
    timeout: Duration,
) -> Result<(), StepError> {
    for verb in ["start", "enable"] {
        let line = CommandLine::new("systemctl", &[verb, service]).elevated(profile.elevation());
        let spec = CommandSpec::from(line).timeout(timeout);
        let output = executor
            .execute(&spec)
            .await
            .map_err(|e| StepError::Service(e.to_string()))?;
        if !output.success() {
            return Err(StepError::Service(format!(
                "systemctl {} {}: {}",
                verb,
                service,
                output.failure_reason()
            )));
        }
        debug!("systemctl {} {} succeeded", verb, service);
    }
    info!("Service {} is running and enabled", service);
    Ok(())
}

/// Checks for a running server process directly
///
/// Returns `None` when the check itself could not be performed.
pub async fn process_running(
    executor: &dyn CommandExecutor,
    os: OsFamily,
    program: &str,
    timeout: Duration,
) -> Option<bool> {
    let spec = match os {
        OsFamily::Windows => CommandSpec::new("tasklist")
            .arg("/FI")
            .arg(format!("IMAGENAME eq {}.exe", program))
            .arg("/NH"),
        OsFamily::Linux | OsFamily::MacOs => CommandSpec::new("pgrep").args(["-x", program]),
    }
    .timeout(timeout);

    match executor.execute(&spec).await {
        Ok(output) => match (os, output.code) {
            (OsFamily::Windows, Some(0)) => {
                let image = format!("{}.exe", program).to_ascii_lowercase();
                Some(output.stdout.to_ascii_lowercase().contains(&image))
            }
            (_, Some(0)) => Some(true),
            (OsFamily::Linux | OsFamily::MacOs, Some(1)) => Some(false),
            _ => None,
        },
        Err(e) => {
            debug!("Process check failed: {}", e);
            None
        }
    }
}
