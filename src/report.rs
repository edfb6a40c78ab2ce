//! Rendering run results for humans, JSON consumers and CI systems.

use crate::runner::{SuiteResult, TestResult};
use crate::suite::DiscoveryError;
use std::fmt::Write as _;
use std::time::Duration;

/// Totals across a run. Discovery errors count as failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn new(results: &[SuiteResult], errors: &[DiscoveryError]) -> Self {
        let tests = || results.iter().flat_map(|s| &s.tests);
        Self {
            passed: tests().filter(|t| t.passed()).count(),
            failed: tests().filter(|t| t.failed()).count() + errors.len(),
            skipped: tests().filter(|t| t.skipped()).count(),
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Human-readable output with checkmarks.
pub fn format_human(results: &[SuiteResult], errors: &[DiscoveryError], verbose: bool) -> String {
    let mut out = String::new();

    for error in errors {
        let _ = writeln!(out, "✗ Failed to load {}: {}", error.fixture, error.error);
    }

    for suite in results {
        let _ = writeln!(out, "\n{}", suite.name);
        for test in &suite.tests {
            if test.passed() {
                let _ = writeln!(out, "  ✓ {} ({:.2?})", test.name, test.duration);
            } else if test.skipped() {
                let reason = test.skip_reason.as_deref().unwrap_or("skipped");
                let _ = writeln!(out, "  - {} (skipped, {reason})", test.name);
            } else {
                let _ = writeln!(out, "  ✗ {} ({:.2?})", test.name, test.duration);
                for failure in &test.failures {
                    let failure = if verbose {
                        failure.as_str()
                    } else {
                        failure.lines().next().unwrap_or_default()
                    };
                    let _ = writeln!(out, "    {failure}");
                }
            }
        }
    }

    let summary = Summary::new(results, errors);
    let _ = writeln!(
        out,
        "\n{} passed, {} failed, {} skipped",
        summary.passed, summary.failed, summary.skipped
    );
    out
}

/// Machine-readable JSON output.
pub fn format_json(results: &[SuiteResult], errors: &[DiscoveryError]) -> serde_json::Value {
    let summary = Summary::new(results, errors);
    let load_errors: Vec<_> = errors
        .iter()
        .map(|e| {
            serde_json::json!({
                "fixture": e.fixture,
                "error": e.error.to_string(),
            })
        })
        .collect();

    serde_json::json!({
        "passed": summary.passed,
        "failed": summary.failed,
        "skipped": summary.skipped,
        "errors": load_errors,
        "results": results,
    })
}

/// Format test results as JUnit XML.
pub fn format_junit_xml(
    results: &[SuiteResult],
    errors: &[DiscoveryError],
    total_time: Duration,
) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

    let summary = Summary::new(results, errors);
    let total_tests = summary.passed + summary.failed + summary.skipped;

    let _ = writeln!(
        xml,
        "<testsuites tests=\"{total_tests}\" failures=\"{}\" skipped=\"{}\" time=\"{:.3}\">",
        summary.failed,
        summary.skipped,
        total_time.as_secs_f64()
    );

    // For JUnit, each load error becomes a synthetic failed test
    if !errors.is_empty() {
        let _ = writeln!(
            xml,
            "  <testsuite name=\"&lt;load&gt;\" tests=\"{0}\" failures=\"{0}\" skipped=\"0\" time=\"0.000\">",
            errors.len()
        );
        for error in errors {
            let _ = writeln!(
                xml,
                "    <testcase name=\"{}\" time=\"0.000\">",
                escape_xml(&error.fixture)
            );
            let _ = writeln!(
                xml,
                "      <failure message=\"{}\"/>",
                escape_xml(&error.error.to_string())
            );
            xml.push_str("    </testcase>\n");
        }
        xml.push_str("  </testsuite>\n");
    }

    for suite in results {
        let tests = suite.tests.len();
        let failures = suite.tests.iter().filter(|t| t.failed()).count();
        let skipped = suite.tests.iter().filter(|t| t.skipped()).count();

        let _ = writeln!(
            xml,
            "  <testsuite name=\"{}\" tests=\"{tests}\" failures=\"{failures}\" skipped=\"{skipped}\" time=\"{:.3}\">",
            escape_xml(&suite.name),
            suite.duration().as_secs_f64()
        );

        for test in &suite.tests {
            write_testcase(&mut xml, test);
        }

        xml.push_str("  </testsuite>\n");
    }

    xml.push_str("</testsuites>\n");
    xml
}

fn write_testcase(xml: &mut String, test: &TestResult) {
    let _ = writeln!(
        xml,
        "    <testcase name=\"{}\" time=\"{:.3}\">",
        escape_xml(&test.name),
        test.duration.as_secs_f64()
    );

    if test.skipped() {
        let reason = test.skip_reason.as_deref().unwrap_or_default();
        let _ = writeln!(xml, "      <skipped message=\"{}\"/>", escape_xml(reason));
    } else if test.failed() {
        let message = test
            .failures
            .first()
            .and_then(|s| s.lines().next())
            .unwrap_or("Test failed");
        let _ = writeln!(xml, "      <failure message=\"{}\">", escape_xml(message));
        for failure in &test.failures {
            let _ = writeln!(xml, "{}", escape_xml(failure));
        }
        xml.push_str("      </failure>\n");
    }

    xml.push_str("    </testcase>\n");
}

/// Escape special XML characters.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
