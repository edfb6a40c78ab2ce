//! Checking a finished run against a fixture's expectations.

use crate::loader::read_tree;
use crate::process::ProcessResult;
use crate::schema::{FileTree, TestOptions};
use std::path::Path;

/// Everything the assertions need to know about the run environment.
#[derive(Clone, Copy)]
pub struct AssertContext<'a> {
    /// Absolute path of the scratch directory the process ran in.
    pub sandbox: &'a Path,
    /// Token substituted for the sandbox path in captured output.
    pub placeholder: &'a str,
    /// Name of the tool-config file seeded into every sandbox.
    pub tool_config: &'a str,
    /// Names skipped when reading the sandbox back.
    pub ignored: &'a dyn Fn(&str) -> bool,
}

/// Replace every occurrence of `target` in `text` with `placeholder`.
///
/// Replacement repeats until nothing changes, since a path such as `/x/x`
/// can overlap itself. When the placeholder itself contains the target a
/// single pass is all that can terminate.
pub fn redact_paths(text: &str, target: &str, placeholder: &str) -> String {
    if target.is_empty() {
        return text.to_string();
    }

    let mut text = text.replace(target, placeholder);
    if placeholder.contains(target) {
        return text;
    }
    while text.contains(target) {
        text = text.replace(target, placeholder);
    }
    text
}

/// Redact the sandbox path, and its canonical form if that differs (for
/// example `/var` vs `/private/var` on macOS).
fn redact_sandbox(text: &str, sandbox: &Path, placeholder: &str) -> String {
    let mut text = redact_paths(text, &sandbox.display().to_string(), placeholder);
    if let Ok(canonical) = sandbox.canonicalize()
        && canonical != sandbox
    {
        text = redact_paths(&text, &canonical.display().to_string(), placeholder);
    }
    text
}

/// Compare one captured stream against its expectation.
///
/// Both sides are trimmed. An empty expectation means the stream must be
/// empty too.
pub fn check_stream(
    name: &str,
    actual: &str,
    expected: &str,
    contains: bool,
) -> Result<(), String> {
    let actual = actual.trim();
    let expected = expected.trim();

    if expected.is_empty() {
        if actual.is_empty() {
            return Ok(());
        }
        return Err(format!("unexpected {name}:\n{actual}"));
    }

    if contains {
        if !actual.contains(expected) {
            return Err(format!(
                "{name}: expected to contain {expected:?}\n  got: {actual:?}"
            ));
        }
    } else if actual != expected {
        return Err(format!(
            "{name}: expected exact match\n  expected: {expected:?}\n  got: {actual:?}"
        ));
    }
    Ok(())
}

/// Compare the sandbox contents after the run against `out_files`.
///
/// Every file the run produced (anything not seeded from `in_files` and not
/// the tool-config file) must be expected, with matching content when the
/// expectation has any. Every expected file must exist.
pub fn check_tree(
    actual: &FileTree,
    in_files: &FileTree,
    out_files: &FileTree,
    tool_config: &str,
    failures: &mut Vec<String>,
) {
    for (name, contents) in actual {
        if name == tool_config || in_files.contains_key(name) {
            continue;
        }
        match out_files.get(name) {
            None => failures.push(format!("unexpected file: {name}")),
            Some(expected) if !expected.is_empty() && expected != contents => {
                failures.push(format!(
                    "content mismatch in {name}\n  expected: {expected:?}\n  got: {contents:?}"
                ));
            }
            Some(_) => {}
        }
    }

    for name in out_files.keys() {
        if !actual.contains_key(name) {
            failures.push(format!("missing file: {name}"));
        }
    }
}

/// Check a finished run against `options`.
///
/// Returns every violated expectation, stderr first, then stdout, then the
/// output tree.
pub fn check_result(
    result: &ProcessResult,
    options: &TestOptions,
    ctx: &AssertContext<'_>,
) -> Result<(), Vec<String>> {
    let mut failures = Vec::new();

    let stderr = redact_sandbox(&result.stderr, ctx.sandbox, ctx.placeholder);
    if let Err(e) = check_stream(
        "stderr",
        &stderr,
        &options.stderr,
        options.stderr_contains,
    ) {
        failures.push(e);
    }

    let stdout = redact_sandbox(&result.stdout, ctx.sandbox, ctx.placeholder);
    let stdout = stdout.trim().replace('\\', "/");
    if let Err(e) = check_stream(
        "stdout",
        &stdout,
        &options.stdout,
        options.stdout_contains,
    ) {
        failures.push(e);
    }

    if !options.out_files.is_empty() {
        match read_tree(ctx.sandbox, ctx.ignored) {
            Ok(actual) => check_tree(
                &actual,
                &options.in_files,
                &options.out_files,
                ctx.tool_config,
                &mut failures,
            ),
            Err(e) => failures.push(format!("failed to read sandbox: {e}")),
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn tree(entries: &[(&str, &str)]) -> FileTree {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn no_ignore(_: &str) -> bool {
        false
    }

    fn ctx(sandbox: &Path) -> AssertContext<'_> {
        AssertContext {
            sandbox,
            placeholder: "<CWD>",
            tool_config: ".toolrc",
            ignored: &no_ignore,
        }
    }

    // ==================== Redaction ====================

    #[test]
    fn redacts_every_occurrence() {
        let text = "/tmp/x/a.js and /tmp/x/b.js";
        assert_eq!(
            redact_paths(text, "/tmp/x", "<CWD>"),
            "<CWD>/a.js and <CWD>/b.js"
        );
    }

    #[test]
    fn redaction_reaches_fixed_point() {
        // one pass over "/x/x/x/x" leaves a fresh "/x/x" behind
        let text = "/x/x/x/x";
        let redacted = redact_paths(text, "/x/x", "/x");
        assert!(!redacted.contains("/x/x"));
    }

    #[test]
    fn redaction_is_idempotent() {
        let once = redact_paths("/tmp/x/out.js", "/tmp/x", "<CWD>");
        let twice = redact_paths(&once, "/tmp/x", "<CWD>");
        assert_eq!(once, twice);
    }

    #[test]
    fn redaction_terminates_when_placeholder_contains_target() {
        let redacted = redact_paths("a", "a", "aa");
        assert_eq!(redacted, "aa");
    }

    // ==================== Streams ====================

    #[test]
    fn exact_match_after_trim() {
        assert!(check_stream("stdout", "3\n", "3", false).is_ok());
        assert!(check_stream("stdout", "  3  ", "3\n", false).is_ok());
        assert!(check_stream("stdout", "33", "3", false).is_err());
    }

    #[test]
    fn contains_match() {
        let actual = "Trace...\nSyntaxError: bad token\n";
        assert!(check_stream("stderr", actual, "SyntaxError", true).is_ok());
        assert!(check_stream("stderr", actual, "TypeError", true).is_err());
        assert!(check_stream("stderr", actual, "SyntaxError", false).is_err());
    }

    #[test]
    fn unset_expectation_requires_empty_output() {
        assert!(check_stream("stdout", "", "", false).is_ok());
        assert!(check_stream("stdout", " \n", "", false).is_ok());

        let err = check_stream("stdout", "noise", "", false).unwrap_err();
        assert_eq!(err, "unexpected stdout:\nnoise");
    }

    // ==================== Trees ====================

    #[test]
    fn tree_matches() {
        let mut failures = Vec::new();
        check_tree(
            &tree(&[("src/a.js", "a"), (".toolrc", "{}"), ("lib/a.js", "A")]),
            &tree(&[("src/a.js", "a")]),
            &tree(&[("lib/a.js", "A")]),
            ".toolrc",
            &mut failures,
        );
        assert!(failures.is_empty(), "{failures:?}");
    }

    #[test]
    fn tree_content_mismatch() {
        let mut failures = Vec::new();
        check_tree(
            &tree(&[("out.js", "var a=1;")]),
            &FileTree::new(),
            &tree(&[("out.js", "var a = 1;")]),
            ".toolrc",
            &mut failures,
        );
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with("content mismatch in out.js"));
    }

    #[test]
    fn tree_empty_expectation_checks_presence_only() {
        let mut failures = Vec::new();
        check_tree(
            &tree(&[("out.js.map", "{\"version\":3}")]),
            &FileTree::new(),
            &tree(&[("out.js.map", "")]),
            ".toolrc",
            &mut failures,
        );
        assert!(failures.is_empty(), "{failures:?}");
    }

    #[test]
    fn tree_is_symmetric() {
        let mut failures = Vec::new();
        check_tree(
            &tree(&[("extra.js", "x")]),
            &FileTree::new(),
            &tree(&[("wanted.js", "y")]),
            ".toolrc",
            &mut failures,
        );
        assert_eq!(
            failures,
            vec!["unexpected file: extra.js", "missing file: wanted.js"]
        );
    }

    // ==================== Whole results ====================

    #[test]
    fn stdout_paths_are_redacted_and_normalized() {
        let dir = tempdir().unwrap();
        let sandbox = dir.path();
        let result = ProcessResult {
            stdout: format!("{}\\src\\a.js -> lib\\a.js\n", sandbox.display()),
            stderr: String::new(),
        };
        let options = TestOptions {
            stdout: "<CWD>/src/a.js -> lib/a.js".to_string(),
            ..TestOptions::default()
        };
        assert_eq!(check_result(&result, &options, &ctx(sandbox)), Ok(()));
    }

    #[test]
    fn stderr_is_checked_before_stdout() {
        let dir = tempdir().unwrap();
        let result = ProcessResult {
            stdout: "out".to_string(),
            stderr: "err".to_string(),
        };
        let failures = check_result(&result, &TestOptions::default(), &ctx(dir.path())).unwrap_err();
        assert_eq!(failures, vec!["unexpected stderr:\nerr", "unexpected stdout:\nout"]);
    }

    #[test]
    fn out_files_read_back_from_sandbox() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".toolrc"), "{}").unwrap();
        fs::write(dir.path().join("out.js"), "var a=1;\n").unwrap();

        let options = TestOptions {
            out_files: tree(&[("out.js", "var a = 1;")]),
            ..TestOptions::default()
        };
        let failures =
            check_result(&ProcessResult::default(), &options, &ctx(dir.path())).unwrap_err();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("content mismatch in out.js"));
    }

    #[test]
    fn empty_out_files_skip_tree_check() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("stray.js"), "x").unwrap();
        let result = check_result(
            &ProcessResult::default(),
            &TestOptions::default(),
            &ctx(dir.path()),
        );
        assert_eq!(result, Ok(()));
    }
}
