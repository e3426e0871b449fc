//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};

use crate::error::HookError;

/// A single cached message line.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  pub message: String,
  /// Last modification time of the backing entry
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
pub trait CacheStorage {
  /// Get the entry for an ID within a workspace, if one exists.
  fn get_entry(&self, workspace: &str, id: &str) -> Result<Option<CachedEntry>, HookError>;

  /// Create or overwrite the entry for an ID within a workspace.
  fn store_entry(&self, workspace: &str, id: &str, message: &str) -> Result<(), HookError>;
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched from Rally during this run
  Network,
  /// Served from a fresh cache entry
  Cache,
}
