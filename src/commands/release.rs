//! `release` (spec.md §4.6): append `HOLD`; the dependency resolver
//! re-evaluates on the dispatcher's next tick.

use anyhow::Result;

use crate::job::JobId;
use crate::state::JobStatus;
use crate::store::Store;

/// `release` is only a legal transition from `USERHOLD` (spec.md §4.2's
/// transition table: "U | release | H"). Jobs not currently held by the
/// user are left untouched.
pub fn execute(store: &Store, ids: &[JobId]) -> Result<()> {
    for &id in ids {
        let status = store.read_status(id)?;
        if status == JobStatus::UserHold {
            store.append_status(id, JobStatus::Hold)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Settings;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = Store::open(tmp.path()).expect("open store");
        (tmp, store)
    }

    #[test]
    fn release_from_userhold_preserves_history() {
        let (_tmp, store) = temp_store();
        let id = store
            .create_job("echo hi", &Settings::new(), JobStatus::UserHold)
            .unwrap();
        execute(&store, &[id]).unwrap();
        assert_eq!(store.read_status(id).unwrap(), JobStatus::Hold);
        assert_eq!(store.read_history(id).unwrap().len(), 2);
    }

    #[test]
    fn release_from_hold_is_a_no_op() {
        let (_tmp, store) = temp_store();
        let id = store.create_job("echo hi", &Settings::new(), JobStatus::Hold).unwrap();
        execute(&store, &[id]).unwrap();
        assert_eq!(store.read_status(id).unwrap(), JobStatus::Hold);
        assert_eq!(store.read_history(id).unwrap().len(), 1);
    }

    #[test]
    fn release_from_terminal_is_a_no_op() {
        let (_tmp, store) = temp_store();
        let id = store.create_job("echo hi", &Settings::new(), JobStatus::Cancel).unwrap();
        execute(&store, &[id]).unwrap();
        assert_eq!(store.read_status(id).unwrap(), JobStatus::Cancel);
        assert_eq!(store.read_history(id).unwrap().len(), 1);
    }
}
