//! Scripted executor
//!
//! An in-memory [`CommandExecutor`] that answers from registered rules and
//! records every call. Stages are exercised against it in tests without
//! touching the host.

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::command::{CommandOutput, CommandSpec, ExecError};
use crate::executor::CommandExecutor;

/// Canned answer for a matching command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The process ran and exited
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    /// The program does not exist
    NotFound,
    /// The process exceeded its timeout
    Timeout,
}

impl Reply {
    /// Exit code 0 with the given stdout
    pub fn success(stdout: impl Into<String>) -> Self {
        Reply::Exit {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Nonzero exit with the given stderr
    pub fn exit(code: i32, stderr: impl Into<String>) -> Self {
        Reply::Exit {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

#[derive(Debug)]
struct Rule {
    prefix: Vec<String>,
    reply: Reply,
    remaining: Option<usize>,
}

/// Executor that answers from registered prefix rules
///
/// The matching rule with the longest prefix wins; among equally long
/// prefixes the earliest registered, non-exhausted rule wins. Commands with
/// no matching rule reply [`Reply::NotFound`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedExecutor {
    rules: Arc<Mutex<Vec<Rule>>>,
    calls: Arc<Mutex<Vec<CommandSpec>>>,
}

impl ScriptedExecutor {
    /// Creates an executor with no rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every command starting with `prefix`
    pub fn on<S: AsRef<str>>(&self, prefix: &[S], reply: Reply) -> &Self {
        self.push(prefix, reply, None);
        self
    }

    /// Answers the next command starting with `prefix`, once
    pub fn once<S: AsRef<str>>(&self, prefix: &[S], reply: Reply) -> &Self {
        self.push(prefix, reply, Some(1));
        self
    }

    fn push<S: AsRef<str>>(&self, prefix: &[S], reply: Reply, remaining: Option<usize>) {
        self.rules.lock().push(Rule {
            prefix: prefix.iter().map(|p| p.as_ref().to_string()).collect(),
            reply,
            remaining,
        });
    }

    /// Every command executed so far, in order
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }

    /// Commands executed so far that start with `prefix`
    pub fn calls_matching<S: AsRef<str>>(&self, prefix: &[S]) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Returns true if any executed command starts with `prefix`
    pub fn was_called<S: AsRef<str>>(&self, prefix: &[S]) -> bool {
        !self.calls_matching(prefix).is_empty()
    }

    fn answer(&self, spec: &CommandSpec) -> Reply {
        let mut rules = self.rules.lock();
        let mut best: Option<usize> = None;
        for (idx, rule) in rules.iter().enumerate() {
            if rule.remaining == Some(0) || !spec.starts_with(rule.prefix.as_slice()) {
                continue;
            }
            match best {
                Some(b) if rules[b].prefix.len() >= rule.prefix.len() => {}
                _ => best = Some(idx),
            }
        }
        match best {
            Some(idx) => {
                let rule = &mut rules[idx];
                if let Some(remaining) = rule.remaining.as_mut() {
                    *remaining -= 1;
                }
                rule.reply.clone()
            }
            None => Reply::NotFound,
        }
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
        self.calls.lock().push(spec.clone());
        match self.answer(spec) {
            Reply::Exit { code, stdout, stderr } => Ok(CommandOutput {
                code: Some(code),
                stdout,
                stderr,
                elapsed: Duration::ZERO,
            }),
            Reply::NotFound => Err(ExecError::NotFound {
                program: spec.program.clone(),
            }),
            Reply::Timeout => Err(ExecError::Timeout {
                program: spec.program.clone(),
                after: spec.timeout.unwrap_or_default(),
                pid: None,
            }),
        }
    }
}
