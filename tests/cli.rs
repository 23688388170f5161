//! CLI-level integration tests: exercise the compiled `sbs` binary directly,
//! the same way the teacher's `tests/integration.rs` spawns its compiled
//! binary rather than calling library functions. The teacher asserts on
//! parsed JSON stdout; this crate's CLI output is plain text (spec.md §1
//! places table rendering out of scope for the core, so the default
//! formatting here is deliberately minimal), so assertions here are on
//! exit codes and substring/line matches instead of a JSON schema.

use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Path to the compiled binary, resolved the same way the teacher's
/// `binary()` helper does: from the current test binary's directory.
fn binary() -> PathBuf {
    let mut p = std::env::current_exe().expect("current exe");
    p.pop();
    if p.ends_with("deps") {
        p.pop();
    }
    p.push("sbs");
    if cfg!(windows) {
        p.set_extension("exe");
    }
    p
}

/// Test harness owning an isolated temporary store root, passed to every
/// invocation via `SBSHOME`.
struct TestHarness {
    _tmp: TempDir,
    root: String,
}

impl TestHarness {
    fn new() -> Self {
        let tmp = tempfile::tempdir().expect("create tempdir");
        let root = tmp.path().to_str().expect("tempdir path is utf-8").to_string();
        Self { _tmp: tmp, root }
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(binary())
            .args(args)
            .env("SBSHOME", &self.root)
            .output()
            .expect("run sbs binary")
    }

    fn run_with_stdin(&self, args: &[&str], stdin: &str) -> Output {
        use std::io::Write;
        use std::process::Stdio;

        let mut child = Command::new(binary())
            .args(args)
            .env("SBSHOME", &self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn sbs binary");
        child
            .stdin
            .take()
            .expect("child stdin")
            .write_all(stdin.as_bytes())
            .expect("write stdin");
        child.wait_with_output().expect("wait for sbs binary")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn submit_reads_script_from_stdin_and_prints_allocated_id() {
    let harness = TestHarness::new();
    let output = harness.run_with_stdin(&["submit"], "echo hi\n");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "1");
}

#[test]
fn submit_rejects_empty_script_with_exit_code_one() {
    let harness = TestHarness::new();
    let output = harness.run_with_stdin(&["submit"], "   \n");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("script is empty"));
}

#[test]
fn submit_rejects_missing_afterok_dependency() {
    let harness = TestHarness::new();
    let output = harness.run_with_stdin(&["submit", "--afterok", "999"], "echo hi\n");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("999"));
}

#[test]
fn status_table_lists_submitted_job() {
    let harness = TestHarness::new();
    let submit_out = harness.run_with_stdin(&["submit", "--name", "demo"], "echo hi\n");
    assert!(submit_out.status.success());
    let id = stdout(&submit_out).trim().to_string();

    let status_out = harness.run(&["status"]);
    assert!(status_out.status.success());
    let table = stdout(&status_out);
    assert!(table.contains(&id));
    assert!(table.contains("demo"));
    assert!(table.contains('H'));
}

#[test]
fn hold_then_release_round_trips_through_hold_state() {
    let harness = TestHarness::new();
    let submit_out = harness.run_with_stdin(&["submit"], "echo hi\n");
    let id = stdout(&submit_out).trim().to_string();

    let hold_out = harness.run(&["hold", &id]);
    assert!(hold_out.status.success(), "stderr: {}", stderr(&hold_out));
    let after_hold = stdout(&harness.run(&["status", &id]));
    assert!(after_hold.contains(" U "));

    let release_out = harness.run(&["release", &id]);
    assert!(release_out.status.success());
    let after_release = stdout(&harness.run(&["status", &id]));
    assert!(after_release.contains(" H "));
}

#[test]
fn cancel_unknown_job_fails_with_exit_code_one() {
    let harness = TestHarness::new();
    let output = harness.run(&["cancel", "999"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("999"));
}

#[test]
fn run_drains_a_simple_job_to_success() {
    let harness = TestHarness::new();
    let submit_out = harness.run_with_stdin(&["submit"], "echo hi\nexit 0\n");
    let id = stdout(&submit_out).trim().to_string();

    let run_out = harness.run(&["run"]);
    assert!(run_out.status.success(), "stderr: {}", stderr(&run_out));

    let status_out = stdout(&harness.run(&["status", &id]));
    assert!(status_out.contains(" S "));
}

#[test]
fn cleanup_reports_removed_job() {
    let harness = TestHarness::new();
    let submit_out = harness.run_with_stdin(&["submit"], "exit 0\n");
    let id = stdout(&submit_out).trim().to_string();
    assert!(harness.run(&["run"]).status.success());

    let cleanup_out = harness.run(&["cleanup"]);
    assert!(cleanup_out.status.success());
    assert!(stdout(&cleanup_out).contains(&format!("removed {id}")));

    let status_out = harness.run(&["status", &id]);
    assert_eq!(status_out.status.code(), Some(1));
}
