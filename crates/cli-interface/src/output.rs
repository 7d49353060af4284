//! Terminal output
//!
//! The report goes to stdout; fatal errors go to stderr.

use std::io::Write;
use anyhow::{Context, Result};
use console::style;

use orchestrator_core::{render_json, render_text, Summary};

/// Writes the report in the selected format
pub fn write_report<W: Write>(out: &mut W, summary: &Summary, json: bool, color: bool) -> Result<()> {
    let text = if json {
        let mut text = render_json(summary).context("failed to serialize report")?;
        text.push('\n');
        text
    } else {
        render_text(summary, color)
    };
    out.write_all(text.as_bytes()).context("failed to write report")?;
    out.flush().context("failed to write report")?;
    Ok(())
}

/// Prints the report to stdout
pub fn print_report(summary: &Summary, json: bool, color: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    write_report(&mut handle, summary, json, color)
}

/// Prints a fatal error to stderr
pub fn print_fatal(message: &str, color: bool) {
    let label = style("error:").red().bold().force_styling(color);
    eprintln!("{} {}", label, message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::{ToolStatus, Verification};
    use common::types::OsFamily;
    use orchestrator_core::report::{ItemSummary, PlatformSummary};

    fn summary() -> Summary {
        Summary {
            platform: PlatformSummary {
                os_family: OsFamily::MacOs,
                distribution: Some("macOS 14.4".to_string()),
                runtime: "python3".to_string(),
                runtime_version: "Python 3.12.2".to_string(),
                package_manager: "pip3".to_string(),
            },
            dependencies: vec![ItemSummary {
                item: "alpha".to_string(),
                verification: Verification::Present,
                install: None,
                detail: None,
            }],
            models: Vec::new(),
            tool_program: "ollama".to_string(),
            tool: ToolStatus::absent("offline"),
            notes: Vec::new(),
        }
    }

    #[test]
    fn test_text_report() {
        let mut buf = Vec::new();
        write_report(&mut buf, &summary(), false, false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("[ OK ] alpha\n"));
        assert!(text.contains("Platform: macos (macOS 14.4), Python 3.12.2 via pip3"));
    }

    #[test]
    fn test_json_report_is_one_document() {
        let mut buf = Vec::new();
        write_report(&mut buf, &summary(), true, false).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["dependencies"][0]["item"], "alpha");
    }
}
