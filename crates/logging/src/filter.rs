//! Log level selection

use tracing_subscriber::EnvFilter;

/// Maps `-q`/`-v` flags to a filter directive
pub fn directive(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "warn";
    }
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Builds the filter; `RUST_LOG` wins over the flags when set
pub fn build_filter(verbosity: u8, quiet: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive(verbosity, quiet)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive() {
        assert_eq!(directive(0, false), "info");
        assert_eq!(directive(1, false), "debug");
        assert_eq!(directive(5, false), "trace");
        assert_eq!(directive(2, true), "warn");
    }
}
