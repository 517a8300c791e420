//! Key-value persistence port used by the event store.
//!
//! `set` never reports failure to the caller; failures surface later through
//! `take_write_error`. Whether it blocks is up to the adapter: the SQLite
//! adapter queues the write and returns, the file adapter writes to disk
//! before returning. Implementations must apply writes in the order `set`
//! was called, and a later `get` must observe every earlier `set`.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: String);

    /// Resolves once every write enqueued before the call has been applied.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Most recent write failure since the last call, if any.
    fn take_write_error(&self) -> Option<String> {
        None
    }
}
