//! Command descriptions and results
//!
//! This module defines what is handed to an executor and what comes back.

use std::fmt;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use common::types::CommandLine;
use common::utils::{format_duration, last_line, truncate_string};

/// A subprocess invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,

    /// Arguments
    pub args: Vec<String>,

    /// Upper bound on the run time; the child is killed when it expires
    pub timeout: Option<Duration>,

    /// Extra environment variables
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Creates a command for a program with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
            env: Vec::new(),
        }
    }

    /// Adds one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Returns true if the program and leading arguments equal `prefix`
    pub fn starts_with<S: AsRef<str>>(&self, prefix: &[S]) -> bool {
        let mut parts = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        prefix.iter().all(|p| parts.next() == Some(p.as_ref()))
    }
}

impl From<CommandLine> for CommandSpec {
    fn from(line: CommandLine) -> Self {
        CommandSpec::new(line.program).args(line.args)
    }
}

impl From<&CommandLine> for CommandSpec {
    fn from(line: &CommandLine) -> Self {
        CommandSpec::from(line.clone())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished subprocess
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,

    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,

    /// Wall time spent waiting for the child
    pub elapsed: Duration,
}

impl CommandOutput {
    /// Returns true if the process exited with code 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Short human-readable reason for a nonzero exit
    pub fn failure_reason(&self) -> String {
        let status = match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        match last_line(&self.stderr).or_else(|| last_line(&self.stdout)) {
            Some(line) => format!("{}: {}", status, truncate_string(line, 160)),
            None => status,
        }
    }

    /// First non-empty line of stdout, trimmed
    pub fn first_line(&self) -> Option<&str> {
        self.stdout.lines().map(str::trim).find(|l| !l.is_empty())
    }
}

/// Failure to run a subprocess to completion
#[derive(Error, Debug)]
pub enum ExecError {
    /// The program could not be found
    #[error("'{program}' not found")]
    NotFound { program: String },

    /// Spawning failed for another reason
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The timeout expired; the child has been killed and reaped
    #[error("'{program}' timed out after {}", format_duration(*.after))]
    Timeout {
        program: String,
        after: Duration,
        pid: Option<u32>,
    },

    /// Waiting on the child failed
    #[error("I/O error while running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExecError {
    /// Classifies a spawn error
    pub fn from_spawn(program: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            ExecError::NotFound { program: program.to_string() }
        } else {
            ExecError::Spawn { program: program.to_string(), source }
        }
    }

    /// Returns true if the program was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, ExecError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with() {
        let spec = CommandSpec::new("pip3").args(["install", "alpha"]);
        assert!(spec.starts_with(&["pip3"]));
        assert!(spec.starts_with(&["pip3", "install"]));
        assert!(!spec.starts_with(&["pip3", "show"]));
        assert!(!spec.starts_with(&["pip3", "install", "alpha", "beta"]));
    }

    #[test]
    fn test_failure_reason_prefers_stderr() {
        let output = CommandOutput {
            code: Some(1),
            stdout: "Collecting beta\n".to_string(),
            stderr: "ERROR: No matching distribution found for beta\n".to_string(),
            elapsed: Duration::from_millis(5),
        };
        assert_eq!(
            output.failure_reason(),
            "exit code 1: ERROR: No matching distribution found for beta"
        );
    }

    #[test]
    fn test_from_command_line() {
        let line = CommandLine::new("python3", &["-m", "pip"]).with_args(["show", "torch"]);
        let spec = CommandSpec::from(line);
        assert_eq!(spec.to_string(), "python3 -m pip show torch");
        assert!(spec.timeout.is_none());
    }

    #[test]
    fn test_timeout_message() {
        let err = ExecError::Timeout {
            program: "ollama".to_string(),
            after: Duration::from_secs(300),
            pid: None,
        };
        assert_eq!(err.to_string(), "'ollama' timed out after 5m 0s");
    }
}
