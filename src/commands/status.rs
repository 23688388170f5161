//! `status` (spec.md §4.6): read-only job listing.
//!
//! Table rendering itself is out of scope for the core (spec.md §1); this
//! module hands back structured rows and `main.rs` does the printing, the
//! same split the teacher draws between `jobstore`/`status` (data) and the
//! CLI (`println!`) layer.

use anyhow::Result;

use crate::job::JobId;
use crate::state::JobStatus;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub id: JobId,
    pub status: JobStatus,
    pub name: Option<String>,
    pub return_code: Option<i32>,
    pub because_of: Option<JobId>,
}

/// List rows for `ids`, or every job in the store when `ids` is empty.
pub fn execute(store: &Store, ids: &[JobId]) -> Result<Vec<StatusRow>> {
    let targets = if ids.is_empty() {
        store.list_ids()?
    } else {
        ids.to_vec()
    };

    let mut rows = Vec::with_capacity(targets.len());
    for id in targets {
        let status = store.read_status(id)?;
        let name = store.read_settings(id).ok().and_then(|s| s.name());
        let because_of = if status == JobStatus::Cancel {
            store.read_because_of(id)
        } else {
            None
        };
        rows.push(StatusRow {
            id,
            status,
            name,
            return_code: store.read_return_code(id),
            because_of,
        });
    }
    Ok(rows)
}
