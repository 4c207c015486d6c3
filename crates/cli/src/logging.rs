//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// SDK targets that stay at `warn` until the highest verbosity
const SDK_TARGETS: [&str; 4] = ["aws_smithy_runtime", "aws_sdk_s3", "aws_config", "hyper"];

/// Filter directives for a `-v` count when `RUST_LOG` is not set
pub fn default_directives(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => return "trace".to_string(),
    };

    let mut directives = vec![level.to_string()];
    directives.extend(SDK_TARGETS.iter().map(|t| format!("{t}=warn")));
    directives.join(",")
}

/// Install the global subscriber. Logs go to stderr.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(
            default_directives(0),
            "warn,aws_smithy_runtime=warn,aws_sdk_s3=warn,aws_config=warn,hyper=warn"
        );
        assert!(default_directives(2).starts_with("debug,"));
        assert_eq!(default_directives(3), "trace");
        assert_eq!(default_directives(9), "trace");
    }
}
