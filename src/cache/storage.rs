//! File-per-entry cache storage.

use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::warn;

use super::traits::{CacheStorage, CachedEntry};
use crate::error::HookError;

/// Stores each entry at `<root>/<workspace>/<id>`.
pub struct FileStorage {
  root: PathBuf,
}

impl FileStorage {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn entry_path(&self, workspace: &str, id: &str) -> PathBuf {
    self.root.join(workspace).join(id)
  }
}

impl CacheStorage for FileStorage {
  fn get_entry(&self, workspace: &str, id: &str) -> Result<Option<CachedEntry>, HookError> {
    let path = self.entry_path(workspace, id);

    let metadata = match std::fs::metadata(&path) {
      Ok(m) => m,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(e.into()),
    };
    let cached_at: DateTime<Utc> = metadata.modified()?.into();

    let contents = std::fs::read_to_string(&path)?;
    // A stored null marks a lookup that never produced a line.
    match serde_json::from_str::<Option<String>>(&contents) {
      Ok(Some(message)) => Ok(Some(CachedEntry { message, cached_at })),
      Ok(None) => Ok(None),
      Err(e) => {
        warn!("Ignoring unreadable cache entry {}: {}", path.display(), e);
        Ok(None)
      }
    }
  }

  fn store_entry(&self, workspace: &str, id: &str, message: &str) -> Result<(), HookError> {
    let path = self.entry_path(workspace, id);

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let data = serde_json::to_string(message)?;
    std::fs::write(&path, data)?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_missing_entry() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path());
    assert!(storage.get_entry("Acme", "US1").unwrap().is_none());
  }

  #[test]
  fn test_store_creates_directories() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path().join("nested"));

    storage.store_entry("Acme", "US1", "feat: line").unwrap();

    let path = dir.path().join("nested").join("Acme").join("US1");
    assert_eq!(std::fs::read_to_string(path).unwrap(), "\"feat: line\"");

    let entry = storage.get_entry("Acme", "US1").unwrap().unwrap();
    assert_eq!(entry.message, "feat: line");
  }

  #[test]
  fn test_store_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path());

    storage.store_entry("Acme", "US1", "old").unwrap();
    storage.store_entry("Acme", "US1", "new").unwrap();

    assert_eq!(storage.get_entry("Acme", "US1").unwrap().unwrap().message, "new");
  }

  #[test]
  fn test_workspaces_are_separate() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path());

    storage.store_entry("Acme", "US1", "acme").unwrap();
    assert!(storage.get_entry("Other", "US1").unwrap().is_none());
  }

  #[test]
  fn test_null_entry_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path());
    let path = storage.entry_path("Acme", "US1");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "null").unwrap();

    assert!(storage.get_entry("Acme", "US1").unwrap().is_none());
  }

  #[test]
  fn test_garbage_entry_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path());
    let path = storage.entry_path("Acme", "US1");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "feat: not json").unwrap();

    assert!(storage.get_entry("Acme", "US1").unwrap().is_none());
  }
}
