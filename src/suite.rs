//! Fixture discovery and test registration.
//!
//! Fixtures live at `<root>/<binary>/<test>/`. Each binary becomes a suite
//! named `bin/<binary>`, each test directory one registered test.

use crate::assert::{AssertContext, check_result};
use crate::error::{AssertionFailure, ConfigError, TestError};
use crate::harness::{Registry, SuiteRegistry, TestBody, TestFuture};
use crate::loader::{ResolvedOptions, resolve_options};
use crate::process::{self, Invocation};
use crate::sandbox::{Sandbox, SandboxLocation};
use crate::schema::{SuiteConfig, TestOptions, current_platform};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One discovered test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    /// Name of the binary under test.
    pub bin: String,
    /// Name of the test case.
    pub name: String,
    /// The fixture directory.
    pub dir: PathBuf,
}

impl Fixture {
    /// `<binary>/<test>`, the name filters match against.
    pub fn id(&self) -> String {
        format!("{}/{}", self.bin, self.name)
    }
}

/// A fixture whose options could not be resolved.
#[derive(Debug, thiserror::Error)]
#[error("{fixture}: {error}")]
pub struct DiscoveryError {
    pub fixture: String,
    #[source]
    pub error: ConfigError,
}

/// Everything a registered test needs once it runs.
struct PreparedCase {
    fixture: Fixture,
    options: TestOptions,
    invocation: Invocation,
    location: SandboxLocation,
    config: Arc<SuiteConfig>,
}

/// Discovers fixtures under a root directory and registers them.
pub struct SuiteBuilder {
    root: PathBuf,
    config: Arc<SuiteConfig>,
    location: SandboxLocation,
    filter: Option<String>,
    platform: String,
}

impl SuiteBuilder {
    pub fn new(root: impl Into<PathBuf>, config: SuiteConfig) -> std::io::Result<Self> {
        // The binary path must survive the child's working directory change
        let root = std::path::absolute(root.into())?;
        let location = SandboxLocation::resolve(config.sandbox_dir.as_ref(), &root);
        Ok(Self {
            root,
            config: Arc::new(config),
            location,
            filter: None,
            platform: current_platform(),
        })
    }

    /// Only register fixtures whose `<binary>/<test>` contains `filter`.
    pub fn filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    /// Evaluate `os` filters against `platform` instead of the host.
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Override where sandboxes are created.
    pub fn sandbox_location(mut self, location: SandboxLocation) -> Self {
        self.location = location;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Absolute path of the binary called `bin`.
    pub fn bin_path(&self, bin: &str) -> PathBuf {
        self.root.join(&self.config.bin_dir).join(bin)
    }

    /// List every fixture, grouped by binary, both levels sorted by name.
    ///
    /// Hidden entries and plain files are ignored at both levels, as is a
    /// sandbox directory kept under the fixtures root.
    pub fn discover(&self) -> std::io::Result<Vec<(String, Vec<Fixture>)>> {
        let mut suites = Vec::new();
        for bin in visible_dirs(&self.root)? {
            let bin_dir = self.root.join(&bin);
            if self.holds_sandboxes(&bin_dir) {
                continue;
            }
            let fixtures = visible_dirs(&bin_dir)?
                .into_iter()
                .map(|name| Fixture {
                    dir: bin_dir.join(&name),
                    bin: bin.clone(),
                    name,
                })
                .filter(|fixture| self.matches_filter(fixture))
                .collect();
            suites.push((bin, fixtures));
        }
        Ok(suites)
    }

    fn holds_sandboxes(&self, dir: &Path) -> bool {
        matches!(&self.location, SandboxLocation::Root(root) if root.starts_with(dir))
    }

    fn matches_filter(&self, fixture: &Fixture) -> bool {
        self.filter
            .as_deref()
            .is_none_or(|filter| fixture.id().contains(filter))
    }

    /// Resolve every fixture's options without registering anything.
    pub fn resolve_all(
        &self,
    ) -> std::io::Result<Vec<(Fixture, Result<ResolvedOptions, ConfigError>)>> {
        Ok(self
            .discover()?
            .into_iter()
            .flat_map(|(_, fixtures)| fixtures)
            .map(|fixture| {
                let resolved = resolve_options(&fixture.dir, &self.config);
                (fixture, resolved)
            })
            .collect())
    }

    /// Register one test per fixture with `registry`.
    ///
    /// Fixtures whose `os` filter excludes the platform are registered as
    /// skipped. Fixtures with broken configuration are left out and returned,
    /// the rest of the suite is unaffected.
    pub fn build<R: Registry>(&self, registry: &mut R) -> std::io::Result<Vec<DiscoveryError>> {
        let mut errors = Vec::new();
        let mut registered = 0;

        for (bin, fixtures) in self.discover()? {
            if fixtures.is_empty() {
                continue;
            }
            let suite = registry.register_suite(&format!("bin/{bin}"));
            let bin_path = self.bin_path(&bin);

            for fixture in fixtures {
                let ResolvedOptions { options, os } =
                    match resolve_options(&fixture.dir, &self.config) {
                        Ok(resolved) => resolved,
                        Err(error) => {
                            tracing::error!(fixture = %fixture.id(), "{error}");
                            errors.push(DiscoveryError {
                                fixture: fixture.id(),
                                error,
                            });
                            continue;
                        }
                    };

                if let Some(os) = os
                    && !os.includes(&self.platform)
                {
                    tracing::debug!(fixture = %fixture.id(), platform = %self.platform, "skipping");
                    suite.register_skipped(&fixture.name, &format!("os: {os}"));
                    continue;
                }

                let invocation = Invocation::for_fixture(&bin_path, &bin, &options, &self.config);
                let name = fixture.name.clone();
                let case = Arc::new(PreparedCase {
                    fixture,
                    options,
                    invocation,
                    location: self.location.clone(),
                    config: Arc::clone(&self.config),
                });
                let body: TestBody = Box::new(move || -> TestFuture { Box::pin(run_case(case)) });
                suite.register_test(&name, body, self.config.timeout());
                registered += 1;
            }
        }

        tracing::info!(
            root = %self.root.display(),
            registered,
            errors = errors.len(),
            "fixtures discovered"
        );
        Ok(errors)
    }
}

/// Sandbox, run, assert.
async fn run_case(case: Arc<PreparedCase>) -> Result<(), TestError> {
    let config = &case.config;
    let sandbox = Sandbox::prepare(
        &case.location,
        &case.fixture.bin,
        &case.fixture.name,
        &case.options.in_files,
        &config.tool_config,
    )
    .map_err(TestError::Sandbox)?;

    let result = process::run(&case.invocation, sandbox.path(), &case.options.stdin).await?;

    let ignored = |name: &str| config.is_ignored(name);
    let ctx = AssertContext {
        sandbox: sandbox.path(),
        placeholder: &config.placeholder,
        tool_config: &config.tool_config.name,
        ignored: &ignored,
    };
    check_result(&result, &case.options, &ctx).map_err(|failures| AssertionFailure {
        command_line: case.invocation.command_line(),
        failures,
    })?;
    Ok(())
}

/// Sorted names of the non-hidden subdirectories of `dir`.
fn visible_dirs(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !entry.path().is_dir() {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}
