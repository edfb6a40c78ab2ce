//! Integration tests driving the `binfixture` binary against fixture trees.
//!
//! Binaries under test are shell scripts launched through `sh`.
#![cfg(unix)]

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::Instant;
use tempfile::TempDir;

fn binfixture_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_binfixture"))
}

/// A fixtures root at `<tmp>/fixtures` with binaries in `<tmp>/bin`.
struct Layout {
    _dir: TempDir,
    root: PathBuf,
}

impl Layout {
    fn new(suite_config: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("fixtures");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(dir.path().join("bin")).unwrap();
        fs::write(
            root.join("binfixture.yaml"),
            format!("launcher: [sh]\n{suite_config}"),
        )
        .unwrap();
        Self { _dir: dir, root }
    }

    fn bin(&self, name: &str, script: &str) -> &Self {
        fs::write(self.root.join("../bin").join(name), script).unwrap();
        self
    }

    fn file(&self, relative: &str, contents: &str) -> &Self {
        let path = self.root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
        self
    }

    fn run(&self, extra: &[&str]) -> Output {
        binfixture_cmd()
            .arg("run")
            .arg(&self.root)
            .args(extra)
            .output()
            .unwrap()
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn describe(output: &Output) -> String {
    format!(
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

#[test]
fn passing_fixture_exits_zero() {
    let layout = Layout::new("");
    layout
        .bin("calc", "echo 3")
        .file("calc/three/stdout.txt", "3\n");

    let output = layout.run(&[]);
    assert!(output.status.success(), "{}", describe(&output));
    let out = stdout(&output);
    assert!(out.contains("bin/calc"));
    assert!(out.contains("✓ three"));
    assert!(out.contains("1 passed, 0 failed, 0 skipped"));
}

#[test]
fn failing_fixture_exits_one() {
    let layout = Layout::new("");
    layout
        .bin("calc", "echo 4")
        .file("calc/three/stdout.txt", "3");

    let output = layout.run(&[]);
    assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
    let out = stdout(&output);
    assert!(out.contains("✗ three"));
    assert!(out.contains("0 passed, 1 failed, 0 skipped"));
}

#[test]
fn platform_skips_are_not_failures() {
    let layout = Layout::new("");
    layout
        .bin("tool", "echo hi")
        .file("tool/windows-only/options.json", r#"{ "os": "win32" }"#);

    let output = layout.run(&[]);
    assert!(output.status.success(), "{}", describe(&output));
    let out = stdout(&output);
    assert!(out.contains("- windows-only (skipped, os: win32)"));
    assert!(out.contains("0 passed, 0 failed, 1 skipped"));
}

#[test]
fn broken_options_fail_the_run_but_not_the_suite() {
    let layout = Layout::new("");
    layout
        .bin("tool", "echo hi")
        .file("tool/broken/options.json", "{ not json")
        .file("tool/fine/stdout.txt", "hi");

    let output = layout.run(&[]);
    assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
    let out = stdout(&output);
    assert!(out.contains("✗ Failed to load tool/broken"));
    assert!(out.contains("✓ fine"));
    assert!(out.contains("1 passed, 1 failed, 0 skipped"));
}

#[test]
fn json_output() {
    let layout = Layout::new("");
    layout
        .bin("tool", "echo hi")
        .file("tool/a/stdout.txt", "hi")
        .file("tool/b/options.json", r#"{ "os": ["win32"] }"#);

    let output = layout.run(&["--output", "json"]);
    assert!(output.status.success(), "{}", describe(&output));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["passed"], 1);
    assert_eq!(json["failed"], 0);
    assert_eq!(json["skipped"], 1);
    assert_eq!(json["results"][0]["name"], "bin/tool");
    assert_eq!(json["results"][0]["tests"][0]["outcome"], "passed");
    assert_eq!(json["results"][0]["tests"][1]["outcome"], "skipped");
}

#[test]
fn junit_output() {
    let layout = Layout::new("");
    layout
        .bin("tool", "echo hi")
        .file("tool/a/stdout.txt", "bye")
        .file("tool/b/options.json", r#"{ "os": "win32" }"#);

    let output = layout.run(&["-o", "junit"]);
    assert_eq!(output.status.code(), Some(1));
    let xml = stdout(&output);
    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains("<testsuite name=\"bin/tool\" tests=\"2\" failures=\"1\" skipped=\"1\""));
    assert!(xml.contains("<failure message="));
    assert!(xml.contains("<skipped message=\"os: win32\"/>"));
}

#[test]
fn filter_selects_fixtures() {
    let layout = Layout::new("");
    layout
        .bin("tool", "echo hi")
        .file("tool/wanted/stdout.txt", "hi")
        .file("tool/unwanted/stdout.txt", "nope");

    let output = layout.run(&["--filter", "tool/want"]);
    assert!(output.status.success(), "{}", describe(&output));
    let out = stdout(&output);
    assert!(out.contains("✓ wanted"));
    assert!(!out.contains("unwanted"));
}

#[test]
fn fixtures_run_concurrently_by_default() {
    let layout = Layout::new("");
    layout
        .bin("nap", "sleep 0.5")
        .file("nap/one/stdout.txt", "")
        .file("nap/two/stdout.txt", "");

    let start = Instant::now();
    let output = layout.run(&[]);
    let elapsed = start.elapsed();

    assert!(output.status.success(), "{}", describe(&output));
    // Serial would take at least 1s
    assert!(
        elapsed.as_secs_f64() < 0.95,
        "Fixtures took {:.2}s to run (expected < 0.95s for concurrent execution)",
        elapsed.as_secs_f64()
    );
}

#[test]
fn fixtures_run_serially_when_configured() {
    let layout = Layout::new("serial: true\n");
    layout
        .bin("nap", "sleep 0.2")
        .file("nap/one/stdout.txt", "")
        .file("nap/two/stdout.txt", "");

    let start = Instant::now();
    let output = layout.run(&[]);
    let elapsed = start.elapsed();

    assert!(output.status.success(), "{}", describe(&output));
    assert!(
        elapsed.as_secs_f64() >= 0.35,
        "Fixtures took {:.2}s to run (expected >= 0.35s for serial execution)",
        elapsed.as_secs_f64()
    );
}

#[test]
fn timeout_fails_the_fixture() {
    let layout = Layout::new("timeout_ms: 200\n");
    layout.bin("hang", "sleep 5").file("hang/forever/stdout.txt", "");

    let start = Instant::now();
    let output = layout.run(&[]);
    assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
    assert!(stdout(&output).contains("timed out after 200ms"));
    assert!(start.elapsed().as_secs_f64() < 4.0);
}

#[test]
fn local_sandbox_dir_keeps_outputs() {
    let layout = Layout::new("");
    layout
        .bin("emit", "printf done > result.txt")
        .file("emit/writes/out-files/result.txt", "done");

    let output = layout.run(&["--sandbox-dir", "local"]);
    assert!(output.status.success(), "{}", describe(&output));

    let runs: Vec<_> = fs::read_dir(layout.root.join(".binfixture"))
        .unwrap()
        .collect();
    assert_eq!(runs.len(), 1);
    let run_dir = runs[0].as_ref().unwrap().path();
    assert_eq!(
        fs::read_to_string(run_dir.join("emit/writes/result.txt")).unwrap(),
        "done"
    );
}

#[test]
fn malformed_suite_config_is_fatal() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("binfixture.yaml"), "timeout_ms: [not a number]\n").unwrap();

    let output = binfixture_cmd()
        .arg("run")
        .arg(dir.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error loading suite config"));
}

#[test]
fn validate_reports_each_fixture() {
    let layout = Layout::new("");
    layout
        .file("tool/good/options.json", r#"{ "args": ["-x"], "os": "linux" }"#)
        .file("tool/bad/options.json", r#"{ "args": "-x" }"#);

    let output = binfixture_cmd()
        .arg("validate")
        .arg(&layout.root)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("✓ tool/good (os: linux)"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("✗ tool/bad"));
    assert!(stderr.contains("1 fixture(s) failed validation"));
}

#[test]
fn init_scaffolds_and_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let init = || {
        binfixture_cmd()
            .arg("init")
            .arg(dir.path())
            .args(["tool", "first-case"])
            .output()
            .unwrap()
    };

    let output = init();
    assert!(output.status.success(), "{}", describe(&output));
    let case = dir.path().join("tool/first-case");
    let options: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(case.join("options.json")).unwrap()).unwrap();
    assert_eq!(options["args"], serde_json::json!([]));
    assert_eq!(fs::read_to_string(case.join("stdout.txt")).unwrap(), "");

    let output = init();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));
}

#[test]
fn schema_describes_options() {
    let output = binfixture_cmd().arg("schema").output().unwrap();
    assert!(output.status.success());
    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let properties = &schema["properties"];
    assert!(properties.get("args").is_some());
    assert!(properties.get("stdoutContains").is_some());
    assert!(properties.get("os").is_some());
}

#[test]
fn missing_root_is_an_error() {
    let dir = TempDir::new().unwrap();
    let output = binfixture_cmd()
        .arg("run")
        .arg(dir.path().join("nope"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}
