//! Fixture-driven acceptance tests for command-line programs.
//!
//! Each directory `<root>/<binary>/<test>/` describes one invocation of a
//! binary: its arguments, stdin, seeded input files, and the stdout, stderr
//! and output files it is expected to produce. [`suite::SuiteBuilder`] turns
//! such a tree into tests registered with any [`harness::Registry`]; the
//! bundled [`runner::SuiteRunner`] runs them.

pub mod assert;
pub mod error;
pub mod harness;
pub mod loader;
pub mod logging;
pub mod process;
pub mod report;
pub mod runner;
pub mod sandbox;
pub mod schema;
pub mod suite;
