//! The registration capability the suite builder depends on.
//!
//! Anything that can accept named test bodies with a timeout can host the
//! fixtures: the bundled [`SuiteRunner`](crate::runner::SuiteRunner), or an
//! adapter onto another test framework.

use crate::error::TestError;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// The future a registered test evaluates to.
pub type TestFuture = Pin<Box<dyn Future<Output = Result<(), TestError>> + Send + 'static>>;

/// A registered test body. Called at most once, when the test is run.
pub type TestBody = Box<dyn FnOnce() -> TestFuture + Send + 'static>;

/// Accepts groups of tests.
pub trait Registry {
    type Suite: SuiteRegistry;

    /// Open (or create) the group called `name`.
    fn register_suite(&mut self, name: &str) -> &mut Self::Suite;
}

/// Accepts tests within one group.
pub trait SuiteRegistry {
    /// Register a test that must finish within `timeout`.
    fn register_test(&mut self, name: &str, body: TestBody, timeout: Duration);

    /// Register a test that will not run on this platform.
    ///
    /// Skips are reported, but count as neither passed nor failed.
    fn register_skipped(&mut self, name: &str, reason: &str);
}
