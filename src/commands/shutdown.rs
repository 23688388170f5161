//! `shutdown` (spec.md §4.6): write the shutdown sentinel the dispatcher's
//! next tick reads and removes.

use anyhow::Result;

use crate::store::Store;

pub fn execute(store: &Store, kill: bool) -> Result<()> {
    store.write_shutdown_sentinel(kill)
}
