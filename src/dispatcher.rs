//! The Dispatcher Loop (spec.md §4.4).
//!
//! Bounded-capacity, FIFO-by-id admission of `QUEUED` jobs to `RUNNING`.
//! No direct teacher analogue — `agent-exec` runs exactly one job per
//! invocation, not a capacity-aware multi-job loop — so this module is new
//! code grounded directly on spec.md §4.4, using the same `tracing`
//! span-per-phase style the teacher applies around `supervise()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info};

use crate::job::JobId;
use crate::mail;
use crate::resolver::{self, ResolverAction};
use crate::state::JobStatus;
use crate::store::Store;
use crate::supervisor;

/// Fixed idle-tick interval (spec.md §4.4: "sleep for a fixed interval (10
/// seconds)" — not a backoff curve, the spec pins this value).
const IDLE_SLEEP: Duration = Duration::from_secs(10);
const IDLE_SLEEP_CHUNK: Duration = Duration::from_millis(200);

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_sigint(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
fn install_sigint_handler() {
    unsafe {
        libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_sigint_handler() {}

/// Dispatcher configuration (spec.md §4.4).
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    pub max_procs: u32,
    /// `-1` encodes "unlimited" (spec.md §4.4).
    pub max_mem_mb: i64,
    pub forever: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            max_procs: std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(1),
            max_mem_mb: -1,
            forever: false,
        }
    }
}

/// Run the dispatcher loop until shutdown or (when not `forever`) until no
/// non-terminal jobs remain. Acquires the `run` lock for the duration,
/// guaranteeing at most one dispatcher per store.
pub fn run(store: Arc<Store>, config: DispatcherConfig) -> Result<()> {
    let _run_lock = store.acquire_run_lock()?;
    install_sigint_handler();

    let mut avail_procs = config.max_procs;
    let mut avail_mem = config.max_mem_mb;

    // Resume after a prior crashed dispatcher: the running set reflects
    // jobs that were RUNNING when this process last exited unexpectedly.
    for id in store.list_running()? {
        if let Ok(settings) = store.read_settings(id) {
            avail_procs = avail_procs.saturating_sub(settings.procs());
            deduct_mem(&mut avail_mem, settings.mem_mb());
        }
    }

    // Supervisor threads spawned by this dispatcher. Joined before a clean
    // (non-kill) exit so in-flight jobs "continue to completion" rather than
    // being abandoned when this process exits (spec.md §5).
    let mut supervisor_handles: Vec<JoinHandle<()>> = Vec::new();

    loop {
        if INTERRUPTED.load(Ordering::SeqCst) {
            info!("dispatcher interrupted, releasing run lock");
            join_supervisors(supervisor_handles);
            return Ok(());
        }

        supervisor_handles.retain(|h| !h.is_finished());

        let mut changed = false;

        // 1. Shutdown check.
        if let Some(kill) = store.take_shutdown_request()? {
            if kill {
                for id in store.list_running()? {
                    if let Some(pid) = store.read_pid(id) {
                        let _ = crate::signal::kill(pid);
                    }
                }
                info!("shutdown (kill) requested, exiting dispatcher without waiting");
                // Every running pid was just signalled; don't wait on the
                // supervisor threads to notice (spec.md §5).
                return Ok(());
            }
            info!("shutdown requested, exiting dispatcher once in-flight jobs finish");
            join_supervisors(supervisor_handles);
            return Ok(());
        }

        // 2. Reap: a running-set entry is done once its status has reached a
        // terminal state (the supervisor, or an external `cancel`, appended
        // SUCCESS/ERROR/CANCEL). Anything else — including QUEUED in the
        // brief window between admission and the RUNNING append — is still
        // active and must keep holding its procs/mem budget.
        for id in store.list_running()? {
            let status = store.read_status(id)?;
            if status.is_terminal() {
                if let Ok(settings) = store.read_settings(id) {
                    avail_procs += settings.procs();
                    restore_mem(&mut avail_mem, settings.mem_mb());
                }
                store.unmark_running(id)?;
                changed = true;
                debug!(job = %id, ?status, "reaped");
            }
        }

        // 3. Exit check.
        if !config.forever && !any_non_terminal(&store)? {
            info!("no non-terminal jobs remain, exiting dispatcher");
            join_supervisors(supervisor_handles);
            return Ok(());
        }

        // 4. Dependency resolution.
        for action in resolver::resolve(&*store) {
            apply_resolver_action(&store, action)?;
            changed = true;
        }

        // 5. Admission loop.
        while let Some(id) = select_next_runnable(&store, avail_procs, avail_mem)? {
            if avail_procs == 0 {
                break;
            }
            let settings = store.read_settings(id)?;
            avail_procs -= settings.procs();
            deduct_mem(&mut avail_mem, settings.mem_mb());

            // Status must move to RUNNING (and the running-set marker must
            // exist) before the supervisor thread is spawned: the next tick's
            // reap step and `select_next_runnable` both key off this status
            // to decide whether the job is still active (spec.md §3: "while
            // a job is in RUNNING, a corresponding marker in the running set
            // exists; the two are synchronized within one dispatcher tick").
            store.append_status(id, JobStatus::Running)?;
            store.mark_running(id)?;

            let supervised_store = Arc::clone(&store);
            supervisor_handles
                .push(std::thread::spawn(move || supervisor::supervise(supervised_store, id)));
            changed = true;
            info!(job = %id, "admitted");
        }

        // 6. Idle sleep, interruptible in small chunks so SIGINT / a
        // shutdown sentinel written mid-sleep is noticed promptly.
        if !changed {
            let mut slept = Duration::ZERO;
            while slept < IDLE_SLEEP {
                if INTERRUPTED.load(Ordering::SeqCst) {
                    break;
                }
                std::thread::sleep(IDLE_SLEEP_CHUNK);
                slept += IDLE_SLEEP_CHUNK;
            }
        }
    }
}

/// Wait for every still-running supervisor thread before a clean exit, so an
/// in-flight job finishes (updates its terminal status and pid/returncode)
/// instead of being abandoned mid-`child.wait()` (spec.md §5).
fn join_supervisors(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.join();
    }
}

fn apply_resolver_action(store: &Store, action: ResolverAction) -> Result<()> {
    match action {
        ResolverAction::Promote(id) => {
            store.append_status(id, JobStatus::Queued)?;
        }
        ResolverAction::Cancel { id, because_of } => {
            store.append_status(id, JobStatus::Cancel)?;
            store.write_because_of(id, because_of)?;
            if let Ok(settings) = store.read_settings(id) {
                if let Some(address) = settings.mail() {
                    mail::notify_dependency_cancelled(address, id, because_of);
                }
            }
        }
    }
    Ok(())
}

fn any_non_terminal(store: &Store) -> Result<bool> {
    for id in store.list_ids()? {
        if !store.read_status(id)?.is_terminal() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Scan all jobs by ascending id; the first `QUEUED` job whose resources fit
/// is admissible (spec.md §4.4 step 5). Memory uses strict less-than
/// (`job_mem < avail_mem`) — a job exactly equal to the remaining budget is
/// *not* admitted. This is preserved intentionally (spec.md §4.4, §9).
fn select_next_runnable(store: &Store, avail_procs: u32, avail_mem: i64) -> Result<Option<JobId>> {
    for id in store.list_ids()? {
        if store.read_status(id)? != JobStatus::Queued {
            continue;
        }
        let settings = store.read_settings(id)?;
        if settings.procs() > avail_procs {
            continue;
        }
        let mem_fits = match settings.mem_mb() {
            None => true,
            Some(job_mem) => avail_mem < 0 || (job_mem as i64) < avail_mem,
        };
        if mem_fits {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

fn deduct_mem(avail_mem: &mut i64, job_mem: Option<u64>) {
    if *avail_mem >= 0 {
        if let Some(mem) = job_mem {
            *avail_mem -= mem as i64;
        }
    }
}

fn restore_mem(avail_mem: &mut i64, job_mem: Option<u64>) {
    if *avail_mem >= 0 {
        if let Some(mem) = job_mem {
            *avail_mem += mem as i64;
        }
    }
}
