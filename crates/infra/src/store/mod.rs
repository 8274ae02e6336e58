//! Store facade implementations.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

use licensehub_core::{StoreError, StoreResult};

/// Parse the textual device threshold every store receives.
pub(crate) fn parse_min_devices(raw: &str) -> StoreResult<u32> {
    raw.parse::<u32>()
        .map_err(|e| StoreError::backend(format!("invalid device filter {raw:?}: {e}")))
}
