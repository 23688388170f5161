//! Best-effort mail notification (spec.md §4.3/§6).
//!
//! The mail sender shells out to a local `mail` binary; this is an external
//! collaborator the core only invokes, never formats the body of.
//! Failures are silent (spec.md §7: "Mail notification failures are
//! silent (best-effort)"), mirroring the teacher's treatment of
//! non-essential progress-file updates in `supervise()` — log at `debug`,
//! never fail the caller.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::job::JobId;

/// Notify `address` that `job` was cancelled because `because_of` reached a
/// terminal failure state. Best-effort: errors are logged, never returned.
pub fn notify_dependency_cancelled(address: &str, job: JobId, because_of: JobId) {
    let body = format!(
        "job {job} was cancelled: dependency job {because_of} did not succeed\n"
    );
    send(address, &format!("sbs: job {job} cancelled"), &body);
}

fn send(address: &str, subject: &str, body: &str) {
    let child = Command::new("mail")
        .arg("-s")
        .arg(subject)
        .arg(address)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(e) => {
            debug!(error = %e, "mail notification failed to spawn");
            return;
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(body.as_bytes()) {
            debug!(error = %e, "mail notification failed to write body");
        }
    }
    if let Err(e) = child.wait() {
        debug!(error = %e, "mail notification failed to complete");
    }
}
