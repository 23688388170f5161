//! `cancel` (spec.md §4.6): append `CANCEL`; kill the child if the job was
//! `RUNNING`.

use anyhow::Result;

use crate::job::JobId;
use crate::signal;
use crate::state::JobStatus;
use crate::store::Store;

/// Cancel is only a legal transition from a non-terminal state (spec.md
/// §4.2's transition table: "any non-terminal | cancel | C"). A job already
/// in `SUCCESS`/`ERROR`/`CANCEL` is left untouched: terminal states are
/// absorbing (spec.md §3, §8) and must not gain a further status entry.
pub fn execute(store: &Store, ids: &[JobId]) -> Result<()> {
    for &id in ids {
        let status = store.read_status(id)?;
        if status.is_terminal() {
            continue;
        }
        store.append_status(id, JobStatus::Cancel)?;
        if status == JobStatus::Running {
            if let Some(pid) = store.read_pid(id) {
                signal::kill(pid)?;
            }
        }
    }
    Ok(())
}
