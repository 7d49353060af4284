//! Common data models for the provisioner
//!
//! This module defines the declared sets, per-item step results and the run
//! report that every stage appends to.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// An ordered, duplicate-free list of identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct DeclaredSet {
    items: Vec<String>,
}

/// Python packages the run must ensure are installed
pub type DeclaredDependencySet = DeclaredSet;

/// Models the run must ensure are pulled
pub type DeclaredModelSet = DeclaredSet;

impl DeclaredSet {
    /// Creates a declared set, keeping the first occurrence of each identifier
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for item in items {
            let item = item.into();
            if !set.items.contains(&item) {
                set.items.push(item);
            }
        }
        set
    }

    /// Iterates identifiers in declared order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    /// Number of identifiers
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the set is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true if the identifier is declared
    pub fn contains(&self, item: &str) -> bool {
        self.items.iter().any(|i| i == item)
    }
}

/// Outcome of one attempted operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum StepResult {
    Success,
    Failure(String),
    Skipped(String),
}

impl StepResult {
    /// Returns true on success
    pub fn is_success(&self) -> bool {
        matches!(self, StepResult::Success)
    }

    /// Returns true on failure
    pub fn is_failure(&self) -> bool {
        matches!(self, StepResult::Failure(_))
    }

    /// Returns true when skipped
    pub fn is_skipped(&self) -> bool {
        matches!(self, StepResult::Skipped(_))
    }

    /// Failure or skip reason
    pub fn reason(&self) -> Option<&str> {
        match self {
            StepResult::Success => None,
            StepResult::Failure(reason) | StepResult::Skipped(reason) => Some(reason),
        }
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepResult::Success => write!(f, "success"),
            StepResult::Failure(reason) => write!(f, "failed: {}", reason),
            StepResult::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}

/// Run phase an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    PackageInstall,
    ModelFetch,
    Service,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::PackageInstall => write!(f, "package-install"),
            Phase::ModelFetch => write!(f, "model-fetch"),
            Phase::Service => write!(f, "service"),
        }
    }
}

/// One recorded outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Phase the item was attempted in
    pub phase: Phase,
    /// Item identifier
    pub item: String,
    /// Outcome
    pub result: StepResult,
    /// Informational detail such as "already satisfied"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Ordered per-item outcomes of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunReport {
    entries: Vec<ReportEntry>,
}

impl RunReport {
    /// Creates an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an outcome; an item may appear once per phase
    pub fn record(&mut self, phase: Phase, item: &str, result: StepResult) -> Result<()> {
        self.record_with_detail(phase, item, result, None)
    }

    /// Records an outcome with an informational detail
    pub fn record_with_detail(
        &mut self,
        phase: Phase,
        item: &str,
        result: StepResult,
        detail: Option<String>,
    ) -> Result<()> {
        if self.get(phase, item).is_some() {
            return Err(Error::AlreadyExists(format!("{} already recorded for {}", item, phase)));
        }
        self.entries.push(ReportEntry {
            phase,
            item: item.to_string(),
            result,
            detail,
        });
        Ok(())
    }

    /// Looks up the entry for an item in a phase
    pub fn get(&self, phase: Phase, item: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.phase == phase && e.item == item)
    }

    /// All entries in recording order
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Entries of one phase in recording order
    pub fn phase_entries(&self, phase: Phase) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(move |e| e.phase == phase)
    }

    /// Item identifiers of one phase in recording order
    pub fn items(&self, phase: Phase) -> Vec<&str> {
        self.phase_entries(phase).map(|e| e.item.as_str()).collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of failures across all phases
    pub fn failure_count(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_failure()).count()
    }

    /// Appends every entry of another report
    pub fn merge(&mut self, other: RunReport) -> Result<()> {
        for entry in other.entries {
            self.record_with_detail(entry.phase, &entry.item, entry.result, entry.detail)?;
        }
        Ok(())
    }
}

/// Verification outcome for one declared item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum Verification {
    /// Confirmed present
    Present,
    /// Confirmed absent
    Absent,
    /// The verification query itself errored
    CheckFailed(String),
}

impl Verification {
    /// Returns true if the item is confirmed present
    pub fn is_present(&self) -> bool {
        matches!(self, Verification::Present)
    }
}

/// Lifecycle states of the model-serving tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolState {
    Absent,
    Installing,
    Installed,
    ServiceUnknown,
    ServiceRunning,
    ServiceFailed,
}

impl ToolState {
    /// Returns true when the tool binary is usable
    pub fn is_available(&self) -> bool {
        !matches!(self, ToolState::Absent | ToolState::Installing)
    }

    /// Returns true if `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: ToolState) -> bool {
        use ToolState::*;
        matches!(
            (self, next),
            (Absent, Installing)
                | (Absent, Installed)
                | (Installing, Installed)
                | (Installing, Absent)
                | (Installed, ServiceUnknown)
                | (Installed, ServiceRunning)
                | (Installed, ServiceFailed)
        )
    }
}

impl fmt::Display for ToolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToolState::Absent => "absent",
            ToolState::Installing => "installing",
            ToolState::Installed => "installed",
            ToolState::ServiceUnknown => "service unknown",
            ToolState::ServiceRunning => "service running",
            ToolState::ServiceFailed => "service failed",
        };
        f.write_str(name)
    }
}

/// Final state of the model-serving tool after its installer stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStatus {
    /// Final lifecycle state
    pub state: ToolState,
    /// Version string, when the tool answered `--version`
    pub version: Option<String>,
    /// Whether a running server process was observed
    pub process_running: Option<bool>,
    /// Notes surfaced in the final report
    pub notes: Vec<String>,
    /// Executable the tool answered from when it is not reachable by name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    /// Outcome of starting the background service, when one was attempted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<StepResult>,
}

impl ToolStatus {
    /// Status for a tool that could not be installed or located
    pub fn absent(note: impl Into<String>) -> Self {
        Self {
            state: ToolState::Absent,
            version: None,
            process_running: None,
            notes: vec![note.into()],
            executable: None,
            service: None,
        }
    }

    /// Command that runs the tool, falling back to its configured name
    pub fn command<'a>(&'a self, program: &'a str) -> &'a str {
        self.executable.as_deref().unwrap_or(program)
    }

    /// Returns true when the tool binary is usable
    pub fn is_available(&self) -> bool {
        self.state.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_set_keeps_first_occurrence() {
        let set = DeclaredSet::new(["beta", "alpha", "beta"]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["beta", "alpha"]);
        assert_eq!(set.len(), 2);
        assert!(set.contains("alpha"));
    }

    #[test]
    fn test_report_rejects_duplicate_in_phase() {
        let mut report = RunReport::new();
        report.record(Phase::PackageInstall, "alpha", StepResult::Success).unwrap();
        let err = report
            .record(Phase::PackageInstall, "alpha", StepResult::Success)
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        // same id in another phase is fine
        report.record(Phase::ModelFetch, "alpha", StepResult::Success).unwrap();
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn test_report_preserves_order() {
        let mut report = RunReport::new();
        report.record(Phase::PackageInstall, "b", StepResult::Success).unwrap();
        report
            .record(Phase::PackageInstall, "a", StepResult::Failure("exit 1".to_string()))
            .unwrap();
        assert_eq!(report.items(Phase::PackageInstall), vec!["b", "a"]);
        assert_eq!(report.failure_count(), 1);
    }

    #[test]
    fn test_tool_state_transitions() {
        assert!(ToolState::Absent.can_transition_to(ToolState::Installing));
        assert!(ToolState::Installing.can_transition_to(ToolState::Absent));
        assert!(ToolState::Installed.can_transition_to(ToolState::ServiceRunning));
        assert!(!ToolState::Absent.can_transition_to(ToolState::ServiceRunning));
        assert!(!ToolState::ServiceRunning.can_transition_to(ToolState::Absent));
        assert!(!ToolState::Installing.is_available());
        assert!(ToolState::ServiceFailed.is_available());
    }

    #[test]
    fn test_step_result_serializes_tagged() {
        let json = serde_json::to_string(&StepResult::Failure("exit 1".to_string())).unwrap();
        assert_eq!(json, r#"{"status":"failure","reason":"exit 1"}"#);
    }
}
