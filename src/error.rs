//! Error types for the commit-msg hook.

use thiserror::Error;

/// Failures that can occur while resolving or looking up a work item.
///
/// `NoLinkedItem`, `MissingCommitMessageFile` and `MixedModes` end the run. The rest are scoped
/// to a single ID: the orchestrator logs them and moves on to the next one.
#[derive(Error, Debug)]
pub enum HookError {
  #[error("no valid user story or defect ID in branch name '{branch}'")]
  NoLinkedItem { branch: String },

  #[error("no commit message file given")]
  MissingCommitMessageFile,

  #[error("commit message file '{0}' cannot be combined with explicit IDs after --")]
  MixedModes(String),

  #[error("unrecognized work item ID '{0}': expected US or DE followed by digits")]
  UnrecognizedIdKind(String),

  #[error("request could not be serviced for {id}: {message}")]
  RemoteLookup { id: String, message: String },

  #[error("no item found for {0}")]
  NotFound(String),

  #[error("missing configuration: {0}")]
  MissingConfig(&'static str),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

impl HookError {
  /// Wrap any displayable transport/session failure for a given ID.
  pub fn remote(id: impl Into<String>, err: impl std::fmt::Display) -> Self {
    Self::RemoteLookup {
      id: id.into(),
      message: err.to_string(),
    }
  }
}
