//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use tracing::{debug, warn};

use super::storage::FileStorage;
use super::traits::{CacheResult, CacheStorage};
use crate::error::HookError;
use crate::rally::types::WorkItemId;

/// Directory used when no workspace is configured
const DEFAULT_WORKSPACE: &str = "default";

/// Cache-first lookup of rendered message lines, scoped to one workspace.
pub struct LookupCache<S: CacheStorage = FileStorage> {
  storage: S,
  workspace: String,
  /// How long before cached data is considered stale
  stale_time: Duration,
}

impl<S: CacheStorage> LookupCache<S> {
  pub fn new(storage: S, workspace: Option<&str>) -> Self {
    Self {
      storage,
      workspace: workspace.unwrap_or(DEFAULT_WORKSPACE).to_string(),
      stale_time: Duration::hours(24),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  fn is_stale(&self, cached_at: DateTime<Utc>) -> bool {
    Utc::now() - cached_at >= self.stale_time
  }

  /// Get the rendered line for an ID.
  ///
  /// 1. Fresh cache entry: returned verbatim, the fetcher is never called
  /// 2. Missing or stale: the fetcher runs once and its line replaces the entry
  /// 3. Fetch failure: returned as-is, the cache is left untouched
  pub async fn get_details<F, Fut>(
    &self,
    id: &WorkItemId,
    fetcher: F,
  ) -> Result<CacheResult<String>, HookError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<String, HookError>>,
  {
    match self.storage.get_entry(&self.workspace, id.as_str()) {
      Ok(Some(cached)) if !self.is_stale(cached.cached_at) => {
        debug!(%id, cached_at = %cached.cached_at, "Cache hit");
        return Ok(CacheResult::from_cache(cached.message, cached.cached_at));
      }
      Ok(Some(_)) => debug!(%id, "Cache entry expired"),
      Ok(None) => debug!(%id, "Cache miss"),
      Err(e) => warn!("Failed to read cache entry for {}: {}", id, e),
    }

    let message = fetcher().await?;

    // A failed write only costs a refetch next time.
    if let Err(e) = self
      .storage
      .store_entry(&self.workspace, id.as_str(), &message)
    {
      warn!("Failed to write cache entry for {}: {}", id, e);
    }

    Ok(CacheResult::from_network(message))
  }
}
