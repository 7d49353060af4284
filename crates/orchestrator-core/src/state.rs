//! Stage tracking for a provisioning run
//!
//! Stages advance strictly in order; only the probe can move a run into
//! the failed state.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Stage a provisioning run is in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStage {
    /// Not started yet
    Pending,

    /// Detecting the platform
    Probing,

    /// Installing Python packages
    InstallingPackages,

    /// Installing the model-serving tool and its service
    InstallingTool,

    /// Pulling models
    FetchingModels,

    /// Verifying and summarising
    Reporting,

    /// Finished; the summary is available
    Completed,

    /// Aborted by a fatal environment error
    Failed(String),
}

impl RunStage {
    /// Creates a new run stage
    pub fn new() -> Self {
        RunStage::Pending
    }

    /// Returns true once the run can no longer advance
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStage::Completed | RunStage::Failed(_))
    }

    /// Returns true if the run failed
    pub fn is_failed(&self) -> bool {
        matches!(self, RunStage::Failed(_))
    }

    fn ordinal(&self) -> u8 {
        match self {
            RunStage::Pending => 0,
            RunStage::Probing => 1,
            RunStage::InstallingPackages => 2,
            RunStage::InstallingTool => 3,
            RunStage::FetchingModels => 4,
            RunStage::Reporting => 5,
            RunStage::Completed => 6,
            RunStage::Failed(_) => 6,
        }
    }

    /// Returns true if `next` may follow this stage
    pub fn can_advance_to(&self, next: &RunStage) -> bool {
        match next {
            RunStage::Failed(_) => matches!(self, RunStage::Probing),
            _ => !self.is_terminal() && next.ordinal() == self.ordinal() + 1,
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStage::Pending => write!(f, "pending"),
            RunStage::Probing => write!(f, "probing environment"),
            RunStage::InstallingPackages => write!(f, "installing packages"),
            RunStage::InstallingTool => write!(f, "installing model tool"),
            RunStage::FetchingModels => write!(f, "fetching models"),
            RunStage::Reporting => write!(f, "reporting"),
            RunStage::Completed => write!(f, "completed"),
            RunStage::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

impl Default for RunStage {
    fn default() -> Self {
        Self::new()
    }
}
