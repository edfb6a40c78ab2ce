//! Error kinds produced while discovering and running fixtures.

use std::path::PathBuf;
use std::time::Duration;

/// A fixture (or the suite) could not be configured.
///
/// Fatal for the registration of the fixture it belongs to, never for the
/// whole suite.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// `options.json` is not valid JSON.
    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// `options.json` parsed, but its top level is not an object.
    #[error("{}: expected a JSON object at the top level", .path.display())]
    NotAnObject { path: PathBuf },
    /// `os` is neither a string nor a list of strings.
    #[error("'os' should be either string or string array: {0}")]
    InvalidOs(String),
    /// A known option has the wrong type.
    #[error("invalid options in {}: {source}", .path.display())]
    Options {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The suite config is not valid YAML.
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// The suite config is not valid TOML.
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    /// Unsupported suite config extension.
    #[error("unsupported file format: {0} (expected .yaml, .yml, or .toml)")]
    UnsupportedFormat(String),
}

/// The binary under test could not be driven to completion.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The child never started.
    #[error("{command_line}: failed to spawn: {source}")]
    Spawn {
        command_line: String,
        source: std::io::Error,
    },
    /// Writing stdin failed.
    #[error("{command_line}: failed to write stdin: {source}")]
    Stdin {
        command_line: String,
        source: std::io::Error,
    },
    /// Reading output or waiting on the child failed.
    #[error("{command_line}: {source}")]
    Io {
        command_line: String,
        source: std::io::Error,
    },
}

/// One or more expectations did not hold.
///
/// Displayed with the full command line first so a failing fixture can be
/// reproduced by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    pub command_line: String,
    pub failures: Vec<String>,
}

impl std::fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.command_line, self.failures.join("\n"))
    }
}

impl std::error::Error for AssertionFailure {}

/// Terminal failure of a single test unit.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    #[error("failed to prepare sandbox: {0}")]
    Sandbox(#[source] std::io::Error),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Assertion(#[from] AssertionFailure),
    #[error("timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),
}

impl TestError {
    /// Failure lines for reporting, one per violated expectation.
    pub fn failures(&self) -> Vec<String> {
        match self {
            TestError::Assertion(failure) => failure
                .failures
                .iter()
                .map(|f| format!("{}: {f}", failure.command_line))
                .collect(),
            other => vec![other.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assertion_failure_is_prefixed_with_command_line() {
        let failure = AssertionFailure {
            command_line: "\"bin/tool\" \"--flag\"".to_string(),
            failures: vec!["unexpected stdout:\nhello".to_string()],
        };
        assert_eq!(
            failure.to_string(),
            "\"bin/tool\" \"--flag\": unexpected stdout:\nhello"
        );
    }

    #[test]
    fn failures_split_per_expectation() {
        let err = TestError::Assertion(AssertionFailure {
            command_line: "\"t\"".to_string(),
            failures: vec!["a".to_string(), "b".to_string()],
        });
        assert_eq!(err.failures(), vec!["\"t\": a", "\"t\": b"]);
    }

    #[test]
    fn timeout_message() {
        let err = TestError::TimedOut(Duration::from_millis(20000));
        assert_eq!(err.to_string(), "timed out after 20000ms");
    }
}
