//! Schema definitions for fixture options and suite configuration.
//!
//! `options.json` files deserialize into [`TestOptions`]; the optional
//! `binfixture.yaml` at the fixtures root deserializes into [`SuiteConfig`].

use crate::error::ConfigError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

/// Relative posix-style path to text content.
pub type FileTree = BTreeMap<String, String>;

/// Default timeout per test in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

/// Default name of the tool-config file seeded into every sandbox.
pub const DEFAULT_TOOL_CONFIG: &str = ".toolrc";

/// Default placeholder substituted for the sandbox path in captured output.
pub const DEFAULT_PLACEHOLDER: &str = "<CWD>";

/// OS-generated marker file that never belongs to a fixture.
pub const DS_STORE: &str = ".DS_Store";

/// Resolved options for a single fixture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct TestOptions {
    /// Arguments appended to the invocation.
    pub args: Vec<String>,

    /// Text written to the process's stdin (nothing is sent when empty).
    pub stdin: String,

    /// Expected stdout. Empty means no output is expected.
    pub stdout: String,

    /// Expected stderr. Empty means no output is expected.
    pub stderr: String,

    /// Match stdout by substring instead of equality.
    pub stdout_contains: bool,

    /// Match stderr by substring instead of equality.
    pub stderr_contains: bool,

    /// Files seeded into the sandbox before the run.
    pub in_files: FileTree,

    /// Files expected in the sandbox after the run.
    pub out_files: FileTree,
}

/// Shape of the `os` field as written in `options.json`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum OsSpec {
    /// A single platform identifier.
    One(String),
    /// Any of several platform identifiers.
    Many(Vec<String>),
}

/// Document shape of `options.json`, used for schema generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct OptionsFile {
    #[serde(flatten)]
    pub options: TestOptions,

    /// Restrict the fixture to these platforms (e.g. "linux", "darwin", "win32").
    #[serde(default)]
    pub os: Option<OsSpec>,
}

/// Set of platforms a fixture is allowed to run on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsFilter(BTreeSet<String>);

impl OsFilter {
    /// Normalize a raw `os` value: a string is a singleton set, an array of
    /// strings is a set, anything else is a [`ConfigError::InvalidOs`].
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ConfigError> {
        let parsed: OsSpec = serde_json::from_value(value.clone())
            .map_err(|_| ConfigError::InvalidOs(value.to_string()))?;
        let names = match parsed {
            OsSpec::One(name) => vec![name],
            OsSpec::Many(names) => names,
        };
        Ok(Self(
            names.iter().map(|name| canonical_platform(name)).collect(),
        ))
    }

    /// Whether `platform` is one of the allowed identifiers.
    pub fn includes(&self, platform: &str) -> bool {
        self.0.contains(canonical_platform(platform).as_str())
    }

    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl std::fmt::Display for OsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.platforms().collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Identifier of the platform the harness is running on.
///
/// Uses the node-style names fixtures are written against (`darwin`,
/// `win32`) rather than Rust's `macos`/`windows`.
pub fn current_platform() -> String {
    canonical_platform(std::env::consts::OS)
}

fn canonical_platform(name: &str) -> String {
    match name {
        "macos" => "darwin".to_string(),
        "windows" => "win32".to_string(),
        other => other.to_string(),
    }
}

/// Suite-level configuration loaded from `binfixture.yaml` in the fixtures root.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SuiteConfig {
    /// Directory holding the binaries under test, relative to the fixtures root.
    pub bin_dir: PathBuf,

    /// Program (and leading arguments) used to launch each binary, e.g. `["node"]`.
    /// Empty means the binary is executed directly.
    pub launcher: Vec<String>,

    /// Flags prepended to every invocation.
    pub default_flags: Vec<DefaultFlag>,

    /// Binaries that do not receive `default_flags`.
    pub default_flags_exempt: Vec<String>,

    /// Timeout per test in milliseconds.
    pub timeout_ms: u64,

    /// Run tests one at a time instead of concurrently.
    pub serial: bool,

    /// Kill the child process when a test times out.
    pub kill_on_timeout: bool,

    /// The tool-config file seeded into every sandbox.
    pub tool_config: ToolConfig,

    /// Extra file or directory names ignored when reading fixture trees.
    pub ignore: Vec<String>,

    /// Token substituted for the sandbox path in captured output.
    pub placeholder: String,

    /// Directory for sandboxes. When not set, each test gets a fresh temp dir
    /// which is deleted afterwards. Use "local" for `.binfixture/<timestamp>/`
    /// under the fixtures root, or specify a path.
    pub sandbox_dir: Option<SandboxDir>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            bin_dir: PathBuf::from("../bin"),
            launcher: Vec::new(),
            default_flags: Vec::new(),
            default_flags_exempt: Vec::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            serial: false,
            kill_on_timeout: true,
            tool_config: ToolConfig::default(),
            ignore: Vec::new(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            sandbox_dir: None,
        }
    }
}

impl SuiteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether a file or directory name should be skipped when reading trees.
    pub fn is_ignored(&self, name: &str) -> bool {
        name == DS_STORE || self.ignore.iter().any(|ignored| ignored == name)
    }
}

/// A flag prepended to invocations, with its values joined by commas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DefaultFlag {
    /// The flag itself, e.g. `--plugins`.
    pub flag: String,

    /// Values passed as a single comma-separated argument.
    #[serde(default)]
    pub values: Vec<String>,
}

/// Conventional configuration file of the binary under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ToolConfig {
    /// File name, both at the fixture root and inside the sandbox.
    pub name: String,

    /// Contents written when the fixture does not supply the file.
    pub default_contents: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_TOOL_CONFIG.to_string(),
            default_contents: "{}".to_string(),
        }
    }
}

/// Directory configuration for test sandboxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(from = "String", into = "String")]
pub enum SandboxDir {
    /// Use `.binfixture/<timestamp>/` in the fixtures root.
    Local,
    /// Use a specific path for sandboxes.
    Path(PathBuf),
}

impl From<String> for SandboxDir {
    fn from(s: String) -> Self {
        if s == "local" {
            SandboxDir::Local
        } else {
            SandboxDir::Path(PathBuf::from(s))
        }
    }
}

impl From<SandboxDir> for String {
    fn from(dir: SandboxDir) -> String {
        match dir {
            SandboxDir::Local => "local".to_string(),
            SandboxDir::Path(p) => p.display().to_string(),
        }
    }
}

/// Generate the JSON Schema for `options.json`.
pub fn generate_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(OptionsFile)
}
