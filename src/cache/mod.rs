//! Time-based cache of rendered commit message lines.
//!
//! One entry per (workspace, formatted ID), stored as a JSON string on disk. The
//! file modification time is the freshness clock.

mod layer;
mod storage;
mod traits;

pub use layer::LookupCache;
pub use storage::FileStorage;
pub use traits::{CacheSource, CacheStorage};
