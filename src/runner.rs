//! Test execution engine.
//!
//! [`SuiteRunner`] collects registered tests and runs them on a tokio
//! runtime, each under its own timeout.

use crate::error::TestError;
use crate::harness::{Registry, SuiteRegistry, TestBody};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Outcome of a single test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    /// Not run on this platform.
    Skipped,
}

/// Result of running a single test.
#[derive(Debug, Serialize)]
pub struct TestResult {
    pub name: String,
    pub outcome: Outcome,
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
    pub failures: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    pub fn failed(&self) -> bool {
        self.outcome == Outcome::Failed
    }

    pub fn skipped(&self) -> bool {
        self.outcome == Outcome::Skipped
    }
}

/// Results of one suite (one binary under test).
#[derive(Debug, Serialize)]
pub struct SuiteResult {
    pub name: String,
    pub tests: Vec<TestResult>,
}

impl SuiteResult {
    pub fn duration(&self) -> Duration {
        self.tests.iter().map(|t| t.duration).sum()
    }
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

enum Unit {
    Run { body: TestBody, timeout: Duration },
    Skip { reason: String },
}

/// A group of registered tests.
pub struct Suite {
    name: String,
    units: Vec<(String, Unit)>,
}

impl Suite {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl SuiteRegistry for Suite {
    fn register_test(&mut self, name: &str, body: TestBody, timeout: Duration) {
        self.units
            .push((name.to_string(), Unit::Run { body, timeout }));
    }

    fn register_skipped(&mut self, name: &str, reason: &str) {
        self.units.push((
            name.to_string(),
            Unit::Skip {
                reason: reason.to_string(),
            },
        ));
    }
}

/// Collects suites and runs them.
#[derive(Default)]
pub struct SuiteRunner {
    suites: Vec<Suite>,
}

impl Registry for SuiteRunner {
    type Suite = Suite;

    fn register_suite(&mut self, name: &str) -> &mut Suite {
        let idx = match self.suites.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.suites.push(Suite {
                    name: name.to_string(),
                    units: Vec::new(),
                });
                self.suites.len() - 1
            }
        };
        &mut self.suites[idx]
    }
}

impl SuiteRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    /// Number of registered tests, skipped ones included.
    pub fn test_count(&self) -> usize {
        self.suites.iter().map(Suite::len).sum()
    }

    /// Run every registered test on a fresh current-thread runtime.
    pub fn run(self, serial: bool) -> std::io::Result<Vec<SuiteResult>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(runtime.block_on(self.run_async(serial)))
    }

    /// Run every registered test.
    ///
    /// Tests run concurrently unless `serial` is set; either way results come
    /// back in registration order.
    pub async fn run_async(self, serial: bool) -> Vec<SuiteResult> {
        let mut names = Vec::with_capacity(self.suites.len());
        let mut indexed_results: Vec<((usize, usize), TestResult)> = Vec::new();
        let mut pending = Vec::new();

        for (suite_idx, suite) in self.suites.into_iter().enumerate() {
            names.push(suite.name);
            for (test_idx, (name, unit)) in suite.units.into_iter().enumerate() {
                let key = (suite_idx, test_idx);
                match unit {
                    Unit::Skip { reason } => {
                        tracing::debug!(test = %name, %reason, "skipped");
                        indexed_results.push((key, skipped(name, reason)));
                    }
                    Unit::Run { body, timeout } => pending.push((key, name, body, timeout)),
                }
            }
        }

        if serial {
            for (key, name, body, timeout) in pending {
                indexed_results.push((key, run_test(name, body, timeout).await));
            }
        } else {
            let mut set = JoinSet::new();
            let mut panicked = Vec::new();
            for (key, name, body, timeout) in pending {
                panicked.push((key, name.clone()));
                set.spawn(async move { (key, run_test(name, body, timeout).await) });
            }
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((key, result)) => {
                        panicked.retain(|(k, _)| *k != key);
                        indexed_results.push((key, result));
                    }
                    Err(e) => tracing::error!("test task failed: {e}"),
                }
            }
            // Whatever never reported back panicked inside its body
            for (key, name) in panicked {
                indexed_results.push((
                    key,
                    TestResult {
                        name,
                        outcome: Outcome::Failed,
                        duration: Duration::ZERO,
                        failures: vec!["test panicked".to_string()],
                        skip_reason: None,
                    },
                ));
            }
        }

        // Sort by registration index to keep declaration order
        indexed_results.sort_by_key(|(key, _)| *key);
        let mut suites: Vec<SuiteResult> = names
            .into_iter()
            .map(|name| SuiteResult {
                name,
                tests: Vec::new(),
            })
            .collect();
        for ((suite_idx, _), result) in indexed_results {
            suites[suite_idx].tests.push(result);
        }
        suites
    }
}

fn skipped(name: String, reason: String) -> TestResult {
    TestResult {
        name,
        outcome: Outcome::Skipped,
        duration: Duration::ZERO,
        failures: Vec::new(),
        skip_reason: Some(reason),
    }
}

async fn run_test(name: String, body: TestBody, timeout: Duration) -> TestResult {
    let start = Instant::now();
    tracing::debug!(test = %name, "running");

    let outcome = match tokio::time::timeout(timeout, body()).await {
        Ok(result) => result,
        Err(_) => Err(TestError::TimedOut(timeout)),
    };

    let failures = match outcome {
        Ok(()) => Vec::new(),
        Err(e) => {
            tracing::debug!(test = %name, error = %e, "failed");
            e.failures()
        }
    };

    TestResult {
        name,
        outcome: if failures.is_empty() {
            Outcome::Passed
        } else {
            Outcome::Failed
        },
        duration: start.elapsed(),
        failures,
        skip_reason: None,
    }
}
