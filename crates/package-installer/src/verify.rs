//! Package verification
//!
//! `show <name>` exits 0 when the package is installed and 1 when it is
//! not. Anything else means the query itself failed. When the declaration
//! carries version clauses, the reported `Version:` must satisfy them too.

use std::time::Duration;
use tracing::debug;

use command_executor::{CommandExecutor, CommandSpec};
use common::error::StepError;
use common::models::{DeclaredDependencySet, Verification};
use common::types::PlatformProfile;

use crate::requirement::{shown_version, Requirement};

fn check_failed(item: &str, reason: impl Into<String>) -> Verification {
    Verification::CheckFailed(
        StepError::Verification {
            item: item.to_string(),
            reason: reason.into(),
        }
        .to_string(),
    )
}

/// Queries whether an installed distribution satisfies a requirement
pub async fn query_requirement(
    executor: &dyn CommandExecutor,
    profile: &PlatformProfile,
    requirement: &Requirement,
    timeout: Duration,
) -> Verification {
    let name = requirement.name.as_str();
    let spec = CommandSpec::from(profile.package_manager_command(["show", name])).timeout(timeout);
    let output = match executor.execute(&spec).await {
        Ok(output) => output,
        Err(e) => {
            debug!("{} failed: {}", spec, e);
            return check_failed(name, e.to_string());
        }
    };

    match output.code {
        Some(0) if requirement.clauses.is_empty() => Verification::Present,
        Some(0) => {
            let Some(installed) = shown_version(&output.stdout) else {
                return check_failed(name, "no version reported");
            };
            match requirement.satisfied_by(installed) {
                Ok(true) => Verification::Present,
                Ok(false) => {
                    debug!("{} {} does not satisfy {}", name, installed, requirement.specifier());
                    Verification::Absent
                }
                Err(reason) => check_failed(name, reason),
            }
        }
        Some(1) => Verification::Absent,
        _ => check_failed(name, output.failure_reason()),
    }
}

/// Verifies every declared dependency, in declared order
pub async fn verify_dependencies(
    executor: &dyn CommandExecutor,
    profile: &PlatformProfile,
    deps: &DeclaredDependencySet,
    timeout: Duration,
) -> Vec<(String, Verification)> {
    let mut results = Vec::with_capacity(deps.len());
    for dep in deps.iter() {
        let verification = match Requirement::parse(dep) {
            Ok(requirement) => query_requirement(executor, profile, &requirement, timeout).await,
            Err(reason) => check_failed(dep, reason),
        };
        results.push((dep.to_string(), verification));
    }
    results
}
