//! `hold` (spec.md §4.6): append `USERHOLD` to one or more jobs.

use anyhow::Result;

use crate::job::JobId;
use crate::state::JobStatus;
use crate::store::Store;

/// `hold` is only a legal transition from `HOLD` or `QUEUED` (spec.md §4.2's
/// transition table: "H,Q | hold | U"). Jobs already `RUNNING`, already
/// `USERHOLD`, or in a terminal state are left untouched.
pub fn execute(store: &Store, ids: &[JobId]) -> Result<()> {
    for &id in ids {
        let status = store.read_status(id)?;
        if matches!(status, JobStatus::Hold | JobStatus::Queued) {
            store.append_status(id, JobStatus::UserHold)?;
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
    fn hold_appends_userhold() {
        let (_tmp, store) = temp_store();
        let id = store.create_job("echo hi", &Settings::new(), JobStatus::Hold).unwrap();
        execute(&store, &[id]).unwrap();
        assert_eq!(store.read_status(id).unwrap(), JobStatus::UserHold);
        assert_eq!(store.read_history(id).unwrap().len(), 2);
    }

    #[test]
    fn hold_unknown_job_fails() {
        let (_tmp, store) = temp_store();
        assert!(execute(&store, &[JobId(999)]).is_err());
    }

    #[test]
    fn hold_queued_job_promotes_to_userhold() {
        let (_tmp, store) = temp_store();
        let id = store.create_job("echo hi", &Settings::new(), JobStatus::Queued).unwrap();
        execute(&store, &[id]).unwrap();
        assert_eq!(store.read_status(id).unwrap(), JobStatus::UserHold);
    }

    #[test]
    fn hold_terminal_job_is_a_no_op() {
        let (_tmp, store) = temp_store();
        let id = store.create_job("echo hi", &Settings::new(), JobStatus::Success).unwrap();
        execute(&store, &[id]).unwrap();
        assert_eq!(store.read_status(id).unwrap(), JobStatus::Success);
        assert_eq!(store.read_history(id).unwrap().len(), 1);
    }

    #[test]
    fn hold_running_job_is_a_no_op() {
        let (_tmp, store) = temp_store();
        let id = store.create_job("echo hi", &Settings::new(), JobStatus::Running).unwrap();
        execute(&store, &[id]).unwrap();
        assert_eq!(store.read_status(id).unwrap(), JobStatus::Running);
        assert_eq!(store.read_history(id).unwrap().len(), 1);
    }
}
