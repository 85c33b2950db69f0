//! Fixtures shared by `conv-core`, `conv-store`, and `conv-dispatcher`
//! integration tests: an in-memory SQLite store and a ready-to-use
//! dispatcher wired to the deterministic oracle double.

use std::sync::Arc;

use conv_core::ThreadId;
use conv_dispatcher::{Dispatcher, DispatcherConfig};
use conv_error::Result;
use conv_oracle::DummyOracle;
use conv_store::{SqliteStore, Store};

/// Installs a best-effort `tracing` subscriber so `tracing::debug!`/`trace!`
/// output from the crates under test is visible with `--nocapture`.
/// Safe to call from every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// A fresh in-memory store with one thread already created, ready to seed
/// messages into.
pub async fn seeded_thread() -> Result<(Arc<SqliteStore>, ThreadId)> {
    let store = Arc::new(SqliteStore::in_memory().await?);
    let thread_id = store.insert_thread(None, None).await?;
    Ok((store, thread_id))
}

/// A dispatcher over a fresh in-memory store and the `DummyOracle`, plus
/// the thread id it was seeded with.
pub async fn dispatcher_with_capacity(cache_capacity: usize) -> Result<(Dispatcher, Arc<SqliteStore>, ThreadId)> {
    let (store, thread_id) = seeded_thread().await?;
    let dispatcher = Dispatcher::new(
        store.clone(),
        Arc::new(DummyOracle),
        DispatcherConfig { cache_capacity },
    )?;
    Ok((dispatcher, store, thread_id))
}
