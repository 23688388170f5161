//! Typed error kinds raised by the core (spec.md §7).
//!
//! Command-layer code returns `anyhow::Result` for context-rich propagation,
//! but wraps one of these variants at the point of failure so `main.rs` can
//! `downcast_ref` to pick the right process exit behavior, the same way
//! `agent-exec`'s `main.rs` downcasts its single `JobNotFound` struct.

use thiserror::Error;

use crate::job::JobId;

#[derive(Debug, Error)]
pub enum SbsError {
    /// A lock could not be acquired within the bounded retry budget.
    #[error("lock unavailable: {path}")]
    LockUnavailable { path: String },

    /// A job id was referenced by a user command but does not exist.
    ///
    /// Fatal when raised from a user-facing command (cancel/hold/release on
    /// a bad id). When encountered as an `afterok` predecessor during
    /// dependency resolution this is *not* raised — missing predecessors
    /// are treated as already-succeeded, per spec.md §3.
    #[error("job not found: {id}")]
    JobNotFound { id: JobId },

    /// `submit` referenced an `afterok` id that does not exist in the store.
    #[error("afterok dependency does not exist: {id}")]
    DependencyMissing { id: JobId },

    /// `submit` was given an empty script.
    #[error("script is empty")]
    ScriptMissing,

    /// The supervisor's wait on the child was interrupted; treated as exit
    /// code 127 and mapped to `Error` rather than propagated further up.
    #[error("child process wait interrupted")]
    ChildInterrupted,
}
