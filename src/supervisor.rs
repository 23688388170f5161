//! Job Supervisor (spec.md §4.5).
//!
//! One child process, one job, run to completion on a dedicated OS thread.
//! Directly descended from `agent-exec::run::supervise`: same
//! resolve-paths-then-spawn-then-capture-pid-then-wait shape, same
//! "wait interrupted → exit code 127 → Error" mapping. The combined
//! `full.log` tee the teacher also maintains has no counterpart here —
//! spec.md only names `stdout`/`stderr` as captured streams.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::job::JobId;
use crate::state::JobStatus;
use crate::store::Store;

/// Run `id`'s script to completion, updating the store as it progresses.
/// Intended to be invoked on a dedicated thread, one per concurrently
/// running job (spec.md §4.5: "Supervisors run concurrently with each
/// other and with the dispatcher tick").
pub fn supervise(store: Arc<Store>, id: JobId) {
    if let Err(e) = supervise_inner(&store, id) {
        warn!(job = %id, error = %e, "supervisor failed");
    }
}

fn supervise_inner(store: &Store, id: JobId) -> Result<()> {
    let settings = store.read_settings(id)?;
    let script_path = store.script_path(id);

    let stdout_path = resolve_output_path(store, id, settings.stdout(), "stdout");
    let stderr_path = resolve_output_path(store, id, settings.stderr(), "stderr");
    let stdout_file = File::create(&stdout_path)
        .with_context(|| format!("create stdout log {}", stdout_path.display()))?;
    let stderr_file = File::create(&stderr_path)
        .with_context(|| format!("create stderr log {}", stderr_path.display()))?;

    let wd: PathBuf = match settings.wd() {
        Some(wd) => PathBuf::from(wd),
        None => std::env::current_dir().context("resolve runner working directory")?,
    };

    let mut cmd = Command::new(&script_path);
    cmd.current_dir(&wd)
        .env("JOB_ID", id.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file))
        .stderr(Stdio::from(stderr_file));

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(job = %id, error = %e, "failed to spawn child");
            return finish(store, id, 127);
        }
    };

    let pid = child.id();
    store.write_pid(id, pid)?;
    info!(job = %id, pid, "child process started");

    let exit_code = match child.wait() {
        Ok(status) => status.code().unwrap_or(127),
        Err(e) => {
            debug!(job = %id, error = %e, "supervisor wait interrupted");
            127
        }
    };

    finish(store, id, exit_code)
}

fn finish(store: &Store, id: JobId, exit_code: i32) -> Result<()> {
    store.write_return_code(id, exit_code)?;
    // If the status is already CANCEL (set by an external `cancel` command
    // racing with this child's exit), do not overwrite it with a
    // SUCCESS/ERROR terminal entry (spec.md §4.2, §5).
    if store.read_status(id)? != JobStatus::Cancel {
        let next = if exit_code == 0 {
            JobStatus::Success
        } else {
            JobStatus::Error
        };
        store.append_status(id, next)?;
    }
    info!(job = %id, exit_code, "child process finished");
    Ok(())
}

/// Resolve the stdout/stderr target for a job per spec.md §4.5 step 1: if
/// absent, the default per-job file; if the configured path is an existing
/// directory, write to `<dir>/<id>.std{out,err}`; otherwise write to the
/// path verbatim (truncating).
fn resolve_output_path(store: &Store, id: JobId, setting: Option<&str>, kind: &str) -> PathBuf {
    let default = if kind == "stdout" {
        store.stdout_path(id)
    } else {
        store.stderr_path(id)
    };
    let Some(configured) = setting else {
        return default;
    };
    let path = Path::new(configured);
    if path.is_dir() {
        path.join(format!("{id}.{kind}"))
    } else {
        path.to_path_buf()
    }
}
