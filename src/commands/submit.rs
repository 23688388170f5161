//! `submit` (spec.md §4.6).

use anyhow::{bail, Result};

use crate::error::SbsError;
use crate::job::{self, JobId, Settings};
use crate::state::JobStatus;
use crate::store::Store;

/// Command-line overrides, applied on top of whatever `#SBS` directives the
/// script itself declares. `None` leaves the directive-parsed (or default)
/// value untouched.
#[derive(Debug, Default)]
pub struct SubmitOpts {
    pub name: Option<String>,
    pub mem: Option<String>,
    pub mail: Option<String>,
    pub procs: Option<String>,
    pub afterok: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub wd: Option<String>,
    pub hold: bool,
}

/// Submit `script` as a new job. Returns the allocated id.
///
/// Order of precedence: `#SBS` directives parsed from the script, then CLI
/// overrides (spec.md §4.6: "command-line options override").
pub fn execute(store: &Store, script: &str, opts: SubmitOpts) -> Result<JobId> {
    if script.trim().is_empty() {
        bail!(SbsError::ScriptMissing);
    }

    let directives = job::parse_directives(script);
    let mut settings = directives.settings;
    let hold = directives.hold || opts.hold;

    if let Some(v) = opts.name {
        settings.set("name", v);
    }
    if let Some(v) = opts.mem {
        settings.set("mem", v);
    }
    if let Some(v) = opts.mail {
        settings.set("mail", v);
    }
    if let Some(v) = opts.procs {
        settings.set("procs", v);
    }
    if let Some(v) = opts.afterok {
        settings.set("afterok", v);
    }
    if let Some(v) = opts.stdout {
        settings.set("stdout", v);
    }
    if let Some(v) = opts.stderr {
        settings.set("stderr", v);
    }
    if let Some(v) = opts.wd {
        settings.set("wd", v);
    }

    for predecessor in settings.afterok() {
        if store.read_status(predecessor).is_err() {
            bail!(SbsError::DependencyMissing { id: predecessor });
        }
    }

    let body = job::with_shebang(script);
    let initial_state = if hold { JobStatus::UserHold } else { JobStatus::Hold };
    store.create_job(&body, &settings, initial_state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = Store::open(tmp.path()).expect("open store");
        (tmp, store)
    }

    #[test]
    fn submit_normal_job_starts_in_hold() {
        let (_tmp, store) = temp_store();
        let id = execute(&store, "#!/bin/sh\necho hi", SubmitOpts::default()).unwrap();
        assert_eq!(store.read_status(id).unwrap(), JobStatus::Hold);
    }

    #[test]
    fn submit_with_hold_directive_starts_in_userhold() {
        let (_tmp, store) = temp_store();
        let id = execute(&store, "#!/bin/sh\n#SBS -hold\necho hi", SubmitOpts::default()).unwrap();
        assert_eq!(store.read_status(id).unwrap(), JobStatus::UserHold);
    }

    #[test]
    fn submit_with_hold_opt_starts_in_userhold() {
        let (_tmp, store) = temp_store();
        let opts = SubmitOpts { hold: true, ..Default::default() };
        let id = execute(&store, "#!/bin/sh\necho hi", opts).unwrap();
        assert_eq!(store.read_status(id).unwrap(), JobStatus::UserHold);
    }

    #[test]
    fn submit_rejects_missing_script() {
        let (_tmp, store) = temp_store();
        let err = execute(&store, "   \n", SubmitOpts::default()).unwrap_err();
        assert!(err.downcast_ref::<SbsError>().is_some());
    }

    #[test]
    fn submit_rejects_missing_dependency() {
        let (_tmp, store) = temp_store();
        let opts = SubmitOpts { afterok: Some("999".to_string()), ..Default::default() };
        let err = execute(&store, "#!/bin/sh\necho hi", opts).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SbsError>(),
            Some(SbsError::DependencyMissing { id }) if *id == JobId(999)
        ));
    }

    #[test]
    fn submit_cli_override_wins_over_directive() {
        let (_tmp, store) = temp_store();
        let opts = SubmitOpts { procs: Some("3".to_string()), ..Default::default() };
        let id = execute(&store, "#!/bin/sh\n#SBS -procs 1\necho hi", opts).unwrap();
        assert_eq!(store.read_settings(id).unwrap().procs(), 3);
    }

    #[test]
    fn submit_injects_shebang() {
        let (_tmp, store) = temp_store();
        let id = execute(&store, "echo hi", SubmitOpts::default()).unwrap();
        assert_eq!(store.read_script(id).unwrap(), "#!/bin/sh\necho hi");
    }
}
