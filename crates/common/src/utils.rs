//! Utility functions for the provisioner
//!
//! This module provides small helpers used across the provisioning stages.

use std::time::Duration;

/// Formats a duration into a human-readable string
///
/// # Examples
///
/// ```
/// use common::utils::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs == 0 {
        return format!("{}ms", duration.subsec_millis());
    }

    let hours = total_secs / (60 * 60);
    let minutes = (total_secs % (60 * 60)) / 60;
    let seconds = total_secs % 60;

    let mut result = String::new();

    if hours > 0 {
        result.push_str(&format!("{}h ", hours));
    }

    if minutes > 0 || !result.is_empty() {
        result.push_str(&format!("{}m ", minutes));
    }

    result.push_str(&format!("{}s", seconds));

    result
}

/// Truncates a string to a maximum number of characters, adding an ellipsis if truncated
///
/// # Examples
///
/// ```
/// use common::utils::truncate_string;
///
/// assert_eq!(truncate_string("Hello, world!", 5), "Hello...");
/// assert_eq!(truncate_string("Hello", 10), "Hello");
/// ```
pub fn truncate_string(s: &str, max_length: usize) -> String {
    match s.char_indices().nth(max_length) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Parses a string into a boolean flag
///
/// # Examples
///
/// ```
/// use common::utils::parse_bool_flag;
///
/// assert_eq!(parse_bool_flag("yes"), true);
/// assert_eq!(parse_bool_flag("0"), false);
/// ```
pub fn parse_bool_flag(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "true" | "yes" | "y" | "1" | "on" | "enable" | "enabled"
    )
}

/// Returns the last non-empty line of process output, trimmed
pub fn last_line(output: &str) -> Option<&str> {
    output.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}

/// Extracts the distribution name from a pip requirement specifier
///
/// # Examples
///
/// ```
/// use common::utils::requirement_name;
///
/// assert_eq!(requirement_name("torch>=2.0"), "torch");
/// assert_eq!(requirement_name("uvicorn[standard]"), "uvicorn");
/// assert_eq!(requirement_name("pdfplumber"), "pdfplumber");
/// ```
pub fn requirement_name(spec: &str) -> &str {
    let spec = spec.trim();
    let end = spec
        .find(|c: char| matches!(c, '<' | '>' | '=' | '!' | '~' | '[' | '(' | ';' | '@' | ' '))
        .unwrap_or(spec.len());
    spec[..end].trim()
}

/// Returns the name portion of a `<name>:<tag>` model identifier
///
/// # Examples
///
/// ```
/// use common::utils::model_base_name;
///
/// assert_eq!(model_base_name("llama3.1:8b"), "llama3.1");
/// assert_eq!(model_base_name("mistral"), "mistral");
/// ```
pub fn model_base_name(model: &str) -> &str {
    model.split(':').next().unwrap_or(model).trim()
}
