//! Lifecycle tracking for the model-serving tool

use tracing::debug;

use common::error::{Error, Result};
use common::models::{StepResult, ToolState, ToolStatus};

/// Tracks the tool's state and the notes gathered along the way
#[derive(Debug, Clone)]
pub struct ToolLifecycle {
    state: ToolState,
    notes: Vec<String>,
    executable: Option<String>,
    service: Option<StepResult>,
}

impl ToolLifecycle {
    /// Creates a lifecycle in the `Absent` state
    pub fn new() -> Self {
        Self {
            state: ToolState::Absent,
            notes: Vec::new(),
            executable: None,
            service: None,
        }
    }

    /// Current state
    pub fn state(&self) -> ToolState {
        self.state
    }

    /// Moves to `next`, rejecting transitions the state machine forbids
    pub fn transition_to(&mut self, next: ToolState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidArgument(format!(
                "illegal tool state transition: {} -> {}",
                self.state, next
            )));
        }
        debug!("Tool state: {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Adds a note for the final report
    pub fn note(&mut self, note: impl Into<String>) {
        let note = note.into();
        debug!("Tool note: {}", note);
        self.notes.push(note);
    }

    /// Remembers the executable path the tool answered from
    pub fn locate(&mut self, executable: impl Into<String>) {
        self.executable = Some(executable.into());
    }

    /// Records the outcome of the service start
    pub fn record_service(&mut self, result: StepResult) {
        self.service = Some(result);
    }

    /// Finishes the lifecycle
    pub fn into_status(self, version: Option<String>, process_running: Option<bool>) -> ToolStatus {
        ToolStatus {
            state: self.state,
            version,
            process_running,
            notes: self.notes,
            executable: self.executable,
            service: self.service,
        }
    }
}

impl Default for ToolLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_path() {
        let mut lifecycle = ToolLifecycle::new();
        lifecycle.transition_to(ToolState::Installing).unwrap();
        lifecycle.transition_to(ToolState::Installed).unwrap();
        lifecycle.transition_to(ToolState::ServiceRunning).unwrap();
        assert_eq!(lifecycle.state(), ToolState::ServiceRunning);
    }

    #[test]
    fn test_failed_install_returns_to_absent() {
        let mut lifecycle = ToolLifecycle::new();
        lifecycle.transition_to(ToolState::Installing).unwrap();
        lifecycle.transition_to(ToolState::Absent).unwrap();
        lifecycle.note("installer exited with code 1");

        let status = lifecycle.into_status(None, None);
        assert!(!status.is_available());
        assert_eq!(status.notes, vec!["installer exited with code 1"]);
    }

    #[test]
    fn test_rejects_illegal_transition() {
        let mut lifecycle = ToolLifecycle::new();
        let err = lifecycle.transition_to(ToolState::ServiceRunning).unwrap_err();
        assert!(err.to_string().contains("absent -> service running"));
        assert_eq!(lifecycle.state(), ToolState::Absent);

        lifecycle.transition_to(ToolState::Installed).unwrap();
        assert!(lifecycle.transition_to(ToolState::Installing).is_err());
    }
}
