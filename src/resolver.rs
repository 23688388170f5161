//! Dependency Resolver (spec.md §4.3).
//!
//! Advances jobs out of `HOLD` based on `afterok` predecessor outcomes.
//! Kept side-effect-free (reads through the `StoreView` trait, returns a
//! list of actions for the caller to apply) so it is unit-testable without
//! a filesystem, matching the "keep IO at the edges" shape the teacher
//! applies by separating `JobDir` (IO) from `schema` (pure types).

use crate::job::JobId;
use crate::state::JobStatus;

/// Read-only view of job status/dependencies the resolver needs. Implemented
/// by `Store`; a plain in-memory map implementation backs unit tests.
pub trait StoreView {
    fn status(&self, id: JobId) -> Option<JobStatus>;
    fn afterok(&self, id: JobId) -> Vec<JobId>;
    /// All jobs currently in `HOLD`, ascending by id.
    fn hold_ids(&self) -> Vec<JobId>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverAction {
    /// Promote this `HOLD` job to `QUEUED`: all predecessors are terminal
    /// and none errored or were cancelled.
    Promote(JobId),
    /// Cancel this `HOLD` job because `because_of` (a predecessor) reached
    /// `ERROR` or `CANCEL`.
    Cancel { id: JobId, because_of: JobId },
}

/// Evaluate every job in `HOLD`, in ascending id order, per spec.md §4.3.
///
/// A missing predecessor (`NotFound`) is treated as `SUCCESS` — it is
/// assumed to have completed successfully and been cleaned up already.
pub fn resolve(store: &impl StoreView) -> Vec<ResolverAction> {
    let mut actions = Vec::new();
    for id in store.hold_ids() {
        let predecessors = store.afterok(id);
        let mut pending = false;
        let mut errored: Option<JobId> = None;
        let mut cancelled: Option<JobId> = None;

        // Collect every predecessor's outcome first: spec.md §4.3 step 3
        // ranks ERROR over CANCEL ("if any predecessor is ERROR... else if
        // any is CANCEL..."), so the whole list must be scanned for an ERROR
        // before falling back to a CANCEL found earlier in iteration order.
        for pred in predecessors {
            let status = store.status(pred).unwrap_or(JobStatus::Success);
            match status {
                JobStatus::Error => {
                    errored.get_or_insert(pred);
                }
                JobStatus::Cancel => {
                    cancelled.get_or_insert(pred);
                }
                JobStatus::Success => {}
                _ => pending = true,
            }
        }

        if let Some(because_of) = errored.or(cancelled) {
            actions.push(ResolverAction::Cancel { id, because_of });
        } else if !pending {
            actions.push(ResolverAction::Promote(id));
        }
    }
    actions
}
