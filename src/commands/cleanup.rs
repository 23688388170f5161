//! `cleanup` (spec.md §4.6): delete terminal jobs that no non-terminal job
//! still lists in `afterok`.

use anyhow::Result;

use crate::job::JobId;
use crate::store::Store;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<JobId>,
    /// Terminal jobs kept because a non-terminal job still depends on them.
    pub kept: Vec<JobId>,
}

/// Run cleanup. `only` restricts consideration to a single job id; `None`
/// considers every job in the store. Held under the default lock so a
/// concurrent `submit` cannot observe a half-removed dependency graph
/// (spec.md §5: cleanup is a "bulk-consistent operation").
pub fn execute(store: &Store, only: Option<JobId>) -> Result<CleanupReport> {
    let _guard = store.acquire_lock()?;

    let ids = store.list_ids()?;
    let mut still_referenced = std::collections::HashSet::new();
    for &id in &ids {
        if let Ok(status) = store.read_status(id) {
            if !status.is_terminal() {
                if let Ok(settings) = store.read_settings(id) {
                    still_referenced.extend(settings.afterok());
                }
            }
        }
    }

    let mut report = CleanupReport::default();
    for id in ids {
        if let Some(target) = only {
            if id != target {
                continue;
            }
        }
        let Ok(status) = store.read_status(id) else {
            continue;
        };
        if !status.is_terminal() {
            continue;
        }
        if still_referenced.contains(&id) {
            report.kept.push(id);
        } else {
            store.delete_job(id)?;
            report.removed.push(id);
        }
    }
    Ok(report)
}
