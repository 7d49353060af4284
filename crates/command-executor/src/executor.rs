//! Subprocess executor implementation
//!
//! This module provides the executor seam used by every stage, and the
//! tokio-backed implementation that runs real processes.

use std::process::Stdio;
use std::time::Instant;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use common::utils::format_duration;

use crate::command::{CommandOutput, CommandSpec, ExecError};

/// Runs subprocesses on behalf of the provisioning stages
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Runs a command to completion, honouring its timeout
    async fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError>;

    /// Runs a command and reports whether it exited with code 0
    async fn probe(&self, spec: &CommandSpec) -> bool {
        match self.execute(spec).await {
            Ok(output) => output.success(),
            Err(_) => false,
        }
    }
}

/// Executor backed by `tokio::process`
///
/// Children are spawned with `kill_on_drop`, so dropping an in-flight call
/// (for example on Ctrl-C) never leaves a process behind.
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    /// Creates a new system executor
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for SystemExecutor {
    async fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
        debug!("Running {}", spec);
        let started = Instant::now();

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| ExecError::from_spawn(&spec.program, e))?;
        let pid = child.id();

        let stdout = child.stdout.take().map(|pipe| tokio::spawn(read_pipe(pipe)));
        let stderr = child.stderr.take().map(|pipe| tokio::spawn(read_pipe(pipe)));

        let waited = match spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(waited) => waited,
                Err(_) => {
                    warn!(
                        "{} exceeded {} timeout, terminating pid {:?}",
                        spec.program,
                        format_duration(limit),
                        pid
                    );
                    // kill() also reaps the child
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill {}: {}", spec.program, e);
                    }
                    abort_reader(stdout);
                    abort_reader(stderr);
                    return Err(ExecError::Timeout {
                        program: spec.program.clone(),
                        after: limit,
                        pid,
                    });
                }
            },
            None => child.wait().await,
        };

        let status = waited.map_err(|source| ExecError::Io {
            program: spec.program.clone(),
            source,
        })?;

        let output = CommandOutput {
            code: status.code(),
            stdout: join_reader(stdout).await,
            stderr: join_reader(stderr).await,
            elapsed: started.elapsed(),
        };

        trace!(
            "{} finished with {:?} in {}",
            spec.program,
            output.code,
            format_duration(output.elapsed)
        );

        Ok(output)
    }
}

async fn read_pipe<R>(mut pipe: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Err(e) = pipe.read_to_end(&mut buf).await {
        debug!("Failed to read child output: {}", e);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn join_reader(reader: Option<JoinHandle<String>>) -> String {
    match reader {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

fn abort_reader(reader: Option<JoinHandle<String>>) {
    if let Some(handle) = reader {
        handle.abort();
    }
}
