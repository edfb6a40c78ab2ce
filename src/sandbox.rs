//! Per-test scratch directories.
//!
//! A [`Sandbox`] owns the working directory of one test run. Its path is
//! handed to the process launcher explicitly, so the harness never changes
//! its own working directory and tests may run side by side.

use crate::schema::{FileTree, SandboxDir, ToolConfig};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Hidden directory under the fixtures root used by `sandbox_dir: local`.
pub const LOCAL_SANDBOX_DIR: &str = ".binfixture";

/// Where sandboxes are created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SandboxLocation {
    /// A fresh temp directory per test, deleted afterwards.
    #[default]
    Temp,
    /// `<root>/<bin>/<test>`, wiped before each run and kept afterwards.
    Root(PathBuf),
}

impl SandboxLocation {
    /// Resolve the configured sandbox directory against the fixtures root.
    ///
    /// `local` gets a fresh timestamped directory so runs never share state.
    pub fn resolve(dir: Option<&SandboxDir>, fixtures_root: &Path) -> Self {
        match dir {
            None => SandboxLocation::Temp,
            Some(SandboxDir::Local) => {
                let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
                SandboxLocation::Root(
                    fixtures_root
                        .join(LOCAL_SANDBOX_DIR)
                        .join(stamp.to_string()),
                )
            }
            Some(SandboxDir::Path(path)) if path.is_absolute() => {
                SandboxLocation::Root(path.clone())
            }
            Some(SandboxDir::Path(path)) => SandboxLocation::Root(fixtures_root.join(path)),
        }
    }
}

/// An isolated working directory for a single test execution.
#[derive(Debug)]
pub struct Sandbox {
    path: PathBuf,
    _temp_dir: Option<TempDir>,
}

impl Sandbox {
    /// Create an empty scratch directory for `bin`/`test`.
    ///
    /// Any stale contents left by a previous run are removed first.
    pub fn create(location: &SandboxLocation, bin: &str, test: &str) -> std::io::Result<Self> {
        match location {
            SandboxLocation::Temp => {
                let temp = tempfile::Builder::new().prefix("binfixture-").tempdir()?;
                Ok(Self {
                    path: temp.path().to_path_buf(),
                    _temp_dir: Some(temp),
                })
            }
            SandboxLocation::Root(root) => {
                let path = root.join(bin).join(test);
                if path.exists() {
                    std::fs::remove_dir_all(&path)?;
                }
                std::fs::create_dir_all(&path)?;
                Ok(Self {
                    path,
                    _temp_dir: None,
                })
            }
        }
    }

    /// Create a scratch directory and seed it with `in_files`.
    pub fn prepare(
        location: &SandboxLocation,
        bin: &str,
        test: &str,
        in_files: &FileTree,
        tool_config: &ToolConfig,
    ) -> std::io::Result<Self> {
        let sandbox = Self::create(location, bin, test)?;
        sandbox.seed(in_files, tool_config)?;
        tracing::debug!(path = %sandbox.path.display(), files = in_files.len(), "sandbox ready");
        Ok(sandbox)
    }

    /// Write every entry of `in_files`, creating parent directories.
    ///
    /// An empty tool-config file is written unless `in_files` provides one,
    /// so configuration outside the sandbox never leaks into a test.
    pub fn seed(&self, in_files: &FileTree, tool_config: &ToolConfig) -> std::io::Result<()> {
        if !in_files.contains_key(&tool_config.name) {
            self.write_file(&tool_config.name, &tool_config.default_contents)?;
        }
        for (name, contents) in in_files {
            self.write_file(name, contents)?;
        }
        Ok(())
    }

    fn write_file(&self, name: &str, contents: &str) -> std::io::Result<()> {
        let path = self.path.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
    }

    /// Absolute path of the scratch directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
