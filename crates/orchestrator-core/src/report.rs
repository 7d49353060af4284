//! Report generation
//!
//! Re-verifies every declared item against the live system and renders a
//! summary. Rendering is a pure function of the [`Summary`]: the same
//! summary always produces the same text, in declared order.

use std::sync::Arc;
use std::time::Duration;
use console::style;
use serde::{Deserialize, Serialize};
use tracing::info;

use command_executor::CommandExecutor;
use common::models::{
    DeclaredDependencySet, DeclaredModelSet, Phase, RunReport, StepResult, ToolStatus, Verification,
};
use common::types::{OsFamily, PlatformProfile};
use model_manager::{verify_models, FETCH_DISABLED, TOOL_UNAVAILABLE};
use package_installer::verify_dependencies;

/// Glyph for a verified item
pub const GLYPH_PRESENT: &str = "[ OK ]";

/// Glyph for a missing item
pub const GLYPH_ABSENT: &str = "[FAIL]";

/// Glyph for an item whose check errored
pub const GLYPH_UNKNOWN: &str = "[ ?? ]";

/// Platform facts shown in the summary header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSummary {
    pub os_family: OsFamily,
    pub distribution: Option<String>,
    pub runtime: String,
    pub runtime_version: String,
    pub package_manager: String,
}

impl From<&PlatformProfile> for PlatformSummary {
    fn from(profile: &PlatformProfile) -> Self {
        Self {
            os_family: profile.os_family,
            distribution: profile
                .distribution
                .as_ref()
                .map(|d| d.pretty_name.clone().unwrap_or_else(|| d.id.clone())),
            runtime: profile.runtime.to_string(),
            runtime_version: profile.runtime_version.clone(),
            package_manager: profile.package_manager.to_string(),
        }
    }
}

/// Verified state of one declared item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    /// Declared identifier
    pub item: String,

    /// Authoritative verification outcome
    pub verification: Verification,

    /// Outcome of the install phase, if the item was attempted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install: Option<StepResult>,

    /// Informational detail from the install phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ItemSummary {
    /// Returns true when the install result adds information to the verdict
    pub fn shows_install_result(&self) -> bool {
        match (&self.verification, &self.install) {
            (_, None) => false,
            (Verification::Present, Some(StepResult::Success)) => false,
            _ => true,
        }
    }
}

/// Everything the final report shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub platform: PlatformSummary,
    pub dependencies: Vec<ItemSummary>,
    pub models: Vec<ItemSummary>,
    pub tool_program: String,
    pub tool: ToolStatus,
    pub notes: Vec<String>,
}

impl Summary {
    /// Number of item lines
    pub fn item_count(&self) -> usize {
        self.dependencies.len() + self.models.len()
    }

    /// Number of items verified present
    pub fn present_count(&self) -> usize {
        self.dependencies
            .iter()
            .chain(self.models.iter())
            .filter(|i| i.verification.is_present())
            .count()
    }

    /// Returns true if every declared item is present
    pub fn all_present(&self) -> bool {
        self.present_count() == self.item_count()
    }
}

/// Verifies the run and renders its summary
pub struct ReportGenerator {
    executor: Arc<dyn CommandExecutor>,
    tool_program: String,
    query_timeout: Duration,
}

impl ReportGenerator {
    /// Creates a new report generator
    pub fn new(executor: Arc<dyn CommandExecutor>, tool_program: impl Into<String>, query_timeout: Duration) -> Self {
        Self {
            executor,
            tool_program: tool_program.into(),
            query_timeout,
        }
    }

    /// Re-verifies every declared item and assembles the summary
    pub async fn verify(
        &self,
        profile: &PlatformProfile,
        deps: &DeclaredDependencySet,
        models: &DeclaredModelSet,
        report: &RunReport,
        tool: &ToolStatus,
    ) -> Summary {
        info!("Verifying {} package(s) and {} model(s)", deps.len(), models.len());

        let dep_checks = verify_dependencies(self.executor.as_ref(), profile, deps, self.query_timeout).await;
        let model_checks = verify_models(
            self.executor.as_ref(),
            &self.tool_program,
            models,
            tool,
            self.query_timeout,
        )
        .await;

        let mut notes = tool.notes.clone();
        if !models.is_empty() && all_skipped_with(report, TOOL_UNAVAILABLE) {
            notes.push(format!("{}: all models skipped", TOOL_UNAVAILABLE));
        }
        if !models.is_empty() && all_skipped_with(report, FETCH_DISABLED) {
            notes.push(format!("{}: models were not pulled", FETCH_DISABLED));
        }

        Summary {
            platform: PlatformSummary::from(profile),
            dependencies: summarise(dep_checks, report, Phase::PackageInstall),
            models: summarise(model_checks, report, Phase::ModelFetch),
            tool_program: self.tool_program.clone(),
            tool: tool.clone(),
            notes,
        }
    }
}

fn all_skipped_with(report: &RunReport, reason: &str) -> bool {
    let mut entries = report.phase_entries(Phase::ModelFetch).peekable();
    entries.peek().is_some() && entries.all(|e| e.result.reason() == Some(reason) && e.result.is_skipped())
}

fn summarise(checks: Vec<(String, Verification)>, report: &RunReport, phase: Phase) -> Vec<ItemSummary> {
    checks
        .into_iter()
        .map(|(item, verification)| {
            let entry = report.get(phase, &item);
            ItemSummary {
                install: entry.map(|e| e.result.clone()),
                detail: entry.and_then(|e| e.detail.clone()),
                item,
                verification,
            }
        })
        .collect()
}

fn glyph(verification: &Verification, color: bool) -> String {
    let styled = match verification {
        Verification::Present => style(GLYPH_PRESENT).green(),
        Verification::Absent => style(GLYPH_ABSENT).red(),
        Verification::CheckFailed(_) => style(GLYPH_UNKNOWN).yellow(),
    };
    styled.force_styling(color).to_string()
}

fn item_line(item: &ItemSummary, color: bool) -> String {
    let mut line = format!("{} {}", glyph(&item.verification, color), item.item);

    let mut remarks = Vec::new();
    if let Verification::CheckFailed(reason) = &item.verification {
        remarks.push(format!("check failed: {}", reason));
    }
    if item.shows_install_result() {
        if let Some(install) = &item.install {
            remarks.push(format!("install {}", install));
        }
    }
    if let Some(detail) = &item.detail {
        remarks.push(detail.clone());
    }
    if !remarks.is_empty() {
        line.push_str(" (");
        line.push_str(&remarks.join("; "));
        line.push(')');
    }
    line
}

fn tool_line(summary: &Summary) -> String {
    let mut line = format!("Tool: {}", summary.tool_program);
    if let Some(version) = &summary.tool.version {
        line.push(' ');
        line.push_str(version);
    }
    line.push_str(&format!(", {}", summary.tool.state));
    match summary.tool.process_running {
        Some(true) => line.push_str(", server process running"),
        Some(false) => line.push_str(", server process not running"),
        None => {}
    }
    line
}

/// Renders the summary as text, one line per declared item
///
/// Item lines start with a glyph; every other line (headers, platform,
/// tool, notes, totals) does not.
pub fn render_text(summary: &Summary, color: bool) -> String {
    let p = &summary.platform;
    let mut lines = vec![
        "Provisioning summary".to_string(),
        format!(
            "Platform: {}{}, {} via {}",
            p.os_family,
            p.distribution.as_deref().map(|d| format!(" ({})", d)).unwrap_or_default(),
            p.runtime_version,
            p.package_manager
        ),
        format!("Packages ({}):", summary.dependencies.len()),
    ];
    lines.extend(summary.dependencies.iter().map(|item| item_line(item, color)));

    lines.push(format!("Models ({}):", summary.models.len()));
    lines.extend(summary.models.iter().map(|item| item_line(item, color)));

    lines.push(tool_line(summary));

    if !summary.notes.is_empty() {
        lines.push("Notes:".to_string());
        lines.extend(summary.notes.iter().map(|note| format!("  - {}", note)));
    }

    lines.push(format!(
        "Result: {} of {} item(s) present",
        summary.present_count(),
        summary.item_count()
    ));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Renders the summary as pretty-printed JSON
pub fn render_json(summary: &Summary) -> serde_json::Result<String> {
    serde_json::to_string_pretty(summary)
}
