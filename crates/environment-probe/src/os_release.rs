//! OS-release descriptor parsing
//!
//! Reads the `KEY=value` file found at `/etc/os-release` on Linux.

use std::path::Path;

use common::types::Distribution;

/// Standard location of the descriptor
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Fallback location used by some minimal images
pub const OS_RELEASE_FALLBACK_PATH: &str = "/usr/lib/os-release";

/// Parses descriptor text
pub fn parse(text: &str) -> Distribution {
    let mut dist = Distribution::default();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, raw)) = line.split_once('=') else {
            continue;
        };
        let value = unquote(raw.trim());
        match key.trim() {
            "ID" => dist.id = value.to_ascii_lowercase(),
            "ID_LIKE" => {
                dist.id_like = value
                    .split_whitespace()
                    .map(str::to_ascii_lowercase)
                    .collect()
            }
            "VERSION_ID" => dist.version_id = Some(value),
            "PRETTY_NAME" => dist.pretty_name = Some(value),
            _ => {}
        }
    }

    dist
}

/// Reads and parses a descriptor file
pub fn read(path: &Path) -> std::io::Result<Distribution> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse(&text))
}

fn unquote(value: &str) -> String {
    let stripped = match value.as_bytes() {
        [b'"', .., b'"'] | [b'\'', .., b'\''] if value.len() >= 2 => &value[1..value.len() - 1],
        _ => value,
    };
    stripped.replace("\\\"", "\"").replace("\\$", "$").replace("\\\\", "\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    const UBUNTU: &str = r#"
PRETTY_NAME="Ubuntu 22.04.3 LTS"
NAME="Ubuntu"
VERSION_ID="22.04"
ID=ubuntu
ID_LIKE=debian
# comment
"#;

    #[test]
    fn test_parse_ubuntu() {
        let dist = parse(UBUNTU);
        assert_eq!(dist.id, "ubuntu");
        assert_eq!(dist.id_like, vec!["debian"]);
        assert_eq!(dist.version_id.as_deref(), Some("22.04"));
        assert_eq!(dist.pretty_name.as_deref(), Some("Ubuntu 22.04.3 LTS"));
    }

    #[test]
    fn test_parse_multiple_id_like_and_single_quotes() {
        let dist = parse("ID='rocky'\nID_LIKE=\"rhel centos fedora\"\n");
        assert_eq!(dist.id, "rocky");
        assert_eq!(dist.id_like, vec!["rhel", "centos", "fedora"]);
        assert_eq!(dist.version_id, None);
    }

    #[test]
    fn test_parse_garbage_yields_empty_id() {
        let dist = parse("not a descriptor\n=\n");
        assert!(dist.id.is_empty());
    }

    #[test]
    fn test_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("os-release");
        std::fs::write(&path, "ID=alpine\nVERSION_ID=3.19.0\n").unwrap();

        let dist = read(&path).unwrap();
        assert_eq!(dist.id, "alpine");
        assert!(read(&dir.path().join("missing")).is_err());
    }
}
