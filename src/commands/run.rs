//! `run` (spec.md §4.6): start the dispatcher loop against a store.

use std::sync::Arc;

use anyhow::Result;

use crate::dispatcher::{self, DispatcherConfig};
use crate::store::Store;

pub fn execute(store: Arc<Store>, config: DispatcherConfig) -> Result<()> {
    dispatcher::run(store, config)
}
