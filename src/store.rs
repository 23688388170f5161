//! The Queue Store (spec.md §4.1, §6).
//!
//! Filesystem layout and primitives for reading/writing per-job records and
//! the global next-id counter, plus the directory-based mutual exclusion
//! primitive guarding id allocation and bulk-consistent operations.
//!
//! Grounded on `agent-exec::jobstore::JobDir` for the "one struct per job
//! directory, one method per file" shape; the locking primitive has no
//! teacher counterpart and is modeled directly on spec.md §4.1/§9.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::error::SbsError;
use crate::job::{JobId, Settings};
use crate::resolver::StoreView;
use crate::state::{JobStatus, StatusEntry};

const DEFAULT_LOCK_ATTEMPTS: u32 = 10;
const LOCK_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Resolve the store root: `SBSHOME` environment variable, else `./.sbs`
/// (spec.md §6).
pub fn resolve_root(cli_root: Option<&str>) -> PathBuf {
    if let Some(root) = cli_root {
        return PathBuf::from(root);
    }
    if let Ok(root) = std::env::var("SBSHOME") {
        if !root.is_empty() {
            return PathBuf::from(root);
        }
    }
    PathBuf::from("./.sbs")
}

/// A held directory-mkdir lock. Released on drop, guaranteeing release on
/// all exit paths (including panics unwinding through the guard).
pub struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir(&self.path);
    }
}

/// Acquire a named lock implemented by atomic directory creation. Retries
/// once per second up to `attempts` times; fails with `LockUnavailable` on
/// exhaustion.
fn acquire_lock(path: &Path, attempts: u32) -> Result<LockGuard> {
    for attempt in 0..attempts {
        match fs::create_dir(path) {
            Ok(()) => return Ok(LockGuard { path: path.to_path_buf() }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if attempt + 1 < attempts {
                    std::thread::sleep(LOCK_RETRY_INTERVAL);
                }
            }
            Err(e) => return Err(e).with_context(|| format!("create lock dir {}", path.display())),
        }
    }
    Err(SbsError::LockUnavailable {
        path: path.display().to_string(),
    }
    .into())
}

/// Handle to the on-disk store root.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open (and, on first use, initialize) the store at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).with_context(|| format!("create store root {}", root.display()))?;
        fs::create_dir_all(root.join("running"))
            .with_context(|| "create running/ subdirectory")?;
        let counter_path = root.join("next_job_id");
        if !counter_path.exists() {
            fs::write(&counter_path, "1\n").context("initialize next_job_id")?;
        }
        Ok(Store { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join("lock")
    }

    fn run_lock_path(&self) -> PathBuf {
        self.root.join("run.lock")
    }

    /// Acquire the default lock guarding id allocation and bulk-consistent
    /// operations such as `cleanup`.
    pub fn acquire_lock(&self) -> Result<LockGuard> {
        acquire_lock(&self.lock_path(), DEFAULT_LOCK_ATTEMPTS)
    }

    /// Acquire the `run` lock; fails if a dispatcher is already active for
    /// this store.
    pub fn acquire_run_lock(&self) -> Result<LockGuard> {
        acquire_lock(&self.run_lock_path(), 1)
    }

    fn job_dir(&self, id: JobId) -> PathBuf {
        self.root.join(format!("sbs.{id}"))
    }

    fn running_marker(&self, id: JobId) -> PathBuf {
        self.root.join("running").join(format!("sbs.{id}"))
    }

    /// Allocate the next job id under the default lock.
    fn next_id(&self) -> Result<JobId> {
        let _guard = self.acquire_lock()?;
        let counter_path = self.root.join("next_job_id");
        let raw = fs::read_to_string(&counter_path).context("read next_job_id")?;
        let current: u64 = raw.trim().parse().context("parse next_job_id")?;
        fs::write(&counter_path, format!("{}\n", current + 1)).context("write next_job_id")?;
        Ok(JobId(current))
    }

    /// Allocate an id, write the script (with executable bits set),
    /// settings, and an initial status entry.
    pub fn create_job(
        &self,
        script: &str,
        settings: &Settings,
        initial_state: JobStatus,
    ) -> Result<JobId> {
        let id = self.next_id()?;
        let dir = self.job_dir(id);
        fs::create_dir_all(&dir).with_context(|| format!("create job dir {}", dir.display()))?;

        let script_path = dir.join("script");
        fs::write(&script_path, script).context("write script")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&script_path)?.permissions();
            perms.set_mode(0o700);
            fs::set_permissions(&script_path, perms).context("chmod script")?;
        }

        let mut settings_file =
            fs::File::create(dir.join("settings")).context("create settings file")?;
        for (key, value) in settings.iter() {
            writeln!(settings_file, "{key}\t{value}")?;
        }

        self.append_status(id, initial_state)?;
        Ok(id)
    }

    pub fn read_script(&self, id: JobId) -> Result<String> {
        let path = self.job_dir(id).join("script");
        fs::read_to_string(&path).map_err(|_| SbsError::JobNotFound { id }.into())
    }

    pub fn read_settings(&self, id: JobId) -> Result<Settings> {
        let path = self.job_dir(id).join("settings");
        let raw = fs::read_to_string(&path).map_err(|_| SbsError::JobNotFound { id })?;
        let mut settings = Settings::new();
        for line in raw.lines() {
            if let Some((key, value)) = line.split_once('\t') {
                settings.set(key, value);
            }
        }
        Ok(settings)
    }

    pub fn read_setting(&self, id: JobId, key: &str) -> Result<Option<String>> {
        Ok(self.read_settings(id)?.get(key).map(str::to_string))
    }

    /// Append one line to the status history. Individually atomic (a single
    /// short `O_APPEND` write), so concurrent appends from the dispatcher and
    /// an external mutator do not corrupt history, though their relative
    /// order is unspecified (spec.md §4.1).
    pub fn append_status(&self, id: JobId, state: JobStatus) -> Result<()> {
        let path = self.job_dir(id).join("state");
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open state file for job {id}"))?;
        file.write_all(StatusEntry::now(state).to_line().as_bytes())?;
        Ok(())
    }

    pub fn read_history(&self, id: JobId) -> Result<Vec<StatusEntry>> {
        let path = self.job_dir(id).join("state");
        let raw = fs::read_to_string(&path).map_err(|_| SbsError::JobNotFound { id })?;
        Ok(raw.lines().filter_map(StatusEntry::parse_line).collect())
    }

    pub fn read_status(&self, id: JobId) -> Result<JobStatus> {
        let history = self.read_history(id)?;
        history
            .last()
            .map(|entry| entry.state)
            .ok_or_else(|| SbsError::JobNotFound { id }.into())
    }

    /// Record which predecessor triggered a dependency-cascade cancellation
    /// (spec.md §4.3: "the mail notification... cites the dependent job
    /// id"; spec.md §8 scenario 3 checks `because_of_jobid`).
    pub fn write_because_of(&self, id: JobId, predecessor: JobId) -> Result<()> {
        fs::write(self.job_dir(id).join("because_of"), format!("{predecessor}\n"))
            .with_context(|| format!("write because_of for job {id}"))
    }

    pub fn read_because_of(&self, id: JobId) -> Option<JobId> {
        fs::read_to_string(self.job_dir(id).join("because_of"))
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
            .map(JobId)
    }

    pub fn list_ids(&self) -> Result<Vec<JobId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root).context("read store root")? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(rest) = name.strip_prefix("sbs.") {
                if let Ok(n) = rest.parse::<u64>() {
                    ids.push(JobId(n));
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn mark_running(&self, id: JobId) -> Result<()> {
        fs::File::create(self.running_marker(id)).context("create running marker")?;
        Ok(())
    }

    pub fn unmark_running(&self, id: JobId) -> Result<()> {
        match fs::remove_file(self.running_marker(id)) {
            Ok(()) | Err(_) => Ok(()),
        }
    }

    pub fn list_running(&self) -> Result<Vec<JobId>> {
        let mut ids = Vec::new();
        let running_dir = self.root.join("running");
        for entry in fs::read_dir(&running_dir).context("read running/ directory")? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(rest) = name.strip_prefix("sbs.") {
                if let Ok(n) = rest.parse::<u64>() {
                    ids.push(JobId(n));
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn write_pid(&self, id: JobId, pid: u32) -> Result<()> {
        fs::write(self.job_dir(id).join("pid"), format!("{pid}\n"))
            .with_context(|| format!("write pid for job {id}"))
    }

    pub fn read_pid(&self, id: JobId) -> Option<u32> {
        fs::read_to_string(self.job_dir(id).join("pid"))
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
    }

    pub fn write_return_code(&self, id: JobId, rc: i32) -> Result<()> {
        fs::write(self.job_dir(id).join("returncode"), format!("{rc}\n"))
            .with_context(|| format!("write return code for job {id}"))
    }

    pub fn read_return_code(&self, id: JobId) -> Option<i32> {
        fs::read_to_string(self.job_dir(id).join("returncode"))
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
    }

    pub fn script_path(&self, id: JobId) -> PathBuf {
        self.job_dir(id).join("script")
    }

    pub fn stdout_path(&self, id: JobId) -> PathBuf {
        self.job_dir(id).join("stdout")
    }

    pub fn stderr_path(&self, id: JobId) -> PathBuf {
        self.job_dir(id).join("stderr")
    }

    pub fn delete_job(&self, id: JobId) -> Result<()> {
        let dir = self.job_dir(id);
        fs::remove_dir_all(&dir).with_context(|| format!("remove job dir {}", dir.display()))
    }

    pub fn write_shutdown_sentinel(&self, kill: bool) -> Result<()> {
        let contents = if kill { "kill\n" } else { "" };
        fs::write(self.root.join("shutdown"), contents).context("write shutdown sentinel")
    }

    /// Read and remove the shutdown sentinel if present. Returns `Some(kill)`
    /// when a shutdown was requested.
    pub fn take_shutdown_request(&self) -> Result<Option<bool>> {
        let path = self.root.join("shutdown");
        match fs::read_to_string(&path) {
            Ok(raw) => {
                fs::remove_file(&path).ok();
                Ok(Some(raw.trim() == "kill"))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("read shutdown sentinel"),
        }
    }
}

impl StoreView for Store {
    fn status(&self, id: JobId) -> Option<JobStatus> {
        self.read_status(id).ok()
    }

    fn afterok(&self, id: JobId) -> Vec<JobId> {
        self.read_settings(id).map(|s| s.afterok()).unwrap_or_default()
    }

    fn hold_ids(&self) -> Vec<JobId> {
        let Ok(ids) = self.list_ids() else {
            return Vec::new();
        };
        ids.into_iter()
            .filter(|&id| matches!(self.status(id), Some(JobStatus::Hold)))
            .collect()
    }
}
