//! Work item ID resolution from the command line or the current git branch.

use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::error::HookError;

// Branch type, a slash, then a US/DE ID with at least two digits (case-insensitive)
static BRANCH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)(feature|defect|hotfix)/(US[0-9]{2,}|DE[0-9]{2,})")
    .expect("branch pattern is a valid regex")
});

/// Where rendered lines should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  /// Print each line to stdout
  Direct,
  /// Prepend lines to the pending commit message
  Hook { commit_msg_file: PathBuf },
}

/// IDs to look up, uppercased and deduplicated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
  pub ids: BTreeSet<String>,
  pub mode: Mode,
}

impl Resolution {
  pub fn is_direct(&self) -> bool {
    matches!(self.mode, Mode::Direct)
  }
}

/// Resolve the IDs for this invocation.
///
/// With the `--` separator the explicit IDs are used as given and no commit
/// message file may be passed; otherwise the single ID is taken from the
/// current branch via `current_branch`.
pub fn resolve<B>(
  separator: bool,
  explicit_ids: &[String],
  commit_msg_file: Option<&Path>,
  current_branch: B,
) -> Result<Resolution, HookError>
where
  B: FnOnce() -> Result<String, HookError>,
{
  if separator {
    if let Some(file) = commit_msg_file {
      return Err(HookError::MixedModes(file.display().to_string()));
    }
    let ids = explicit_ids
      .iter()
      .map(|id| id.trim().to_uppercase())
      .filter(|id| !id.is_empty())
      .collect();
    return Ok(Resolution {
      ids,
      mode: Mode::Direct,
    });
  }

  let commit_msg_file = commit_msg_file.ok_or(HookError::MissingCommitMessageFile)?;

  let branch = current_branch().unwrap_or_else(|e| {
    warn!("Could not determine current branch: {}", e);
    String::new()
  });
  debug!(%branch, "Resolving work item from branch");

  let id = id_from_branch(&branch).ok_or(HookError::NoLinkedItem { branch })?;

  Ok(Resolution {
    ids: BTreeSet::from([id]),
    mode: Mode::Hook {
      commit_msg_file: commit_msg_file.to_path_buf(),
    },
  })
}

/// Extract the uppercased work item ID from a branch name, if it links one.
pub fn id_from_branch(branch: &str) -> Option<String> {
  BRANCH_PATTERN
    .captures(branch.trim())
    .and_then(|caps| caps.get(2))
    .map(|m| m.as_str().to_uppercase())
}

/// Name of the checked-out branch, as reported by `git rev-parse --abbrev-ref HEAD`.
pub fn current_branch() -> Result<String, HookError> {
  let output = Command::new("git")
    .args(["rev-parse", "--abbrev-ref", "HEAD"])
    .output()?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    return Err(HookError::Io(std::io::Error::other(format!(
      "git rev-parse failed: {}",
      stderr.trim()
    ))));
  }

  Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
