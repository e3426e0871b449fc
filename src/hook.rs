//! Runs the lookups for a resolved invocation and delivers the rendered lines.

use std::future::Future;
use std::io::Write;
use tracing::{debug, error, info};

use crate::cache::{CacheSource, CacheStorage, LookupCache};
use crate::error::HookError;
use crate::rally::render::render;
use crate::rally::types::{WorkItemId, WorkItemRecord};
use crate::resolver::{Mode, Resolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  /// Every ID was attempted; `rendered` of them produced a line
  Completed { rendered: usize },
  /// Nothing to look up
  NoIds,
}

/// Exit status reported by a successful run
pub const EXIT_SUCCESS: u8 = 0;
/// Exit status when nothing could be linked
pub const EXIT_FAILURE: u8 = 1;

impl Outcome {
  pub fn exit_status(self) -> u8 {
    match self {
      Self::Completed { .. } => EXIT_SUCCESS,
      Self::NoIds => EXIT_FAILURE,
    }
  }
}

/// Tell the user the branch links no work item. The commit message is left as is.
pub fn report_no_link(out: &mut impl Write) -> std::io::Result<u8> {
  let rule = "-".repeat(83);
  writeln!(out, "{}", rule)?;
  writeln!(
    out,
    "No valid user story or defect ID in the branch name, changelog will not be amended."
  )?;
  writeln!(out, "{}", rule)?;
  Ok(EXIT_FAILURE)
}

/// Look up every resolved ID and print or prepend the results.
///
/// Failures are per ID: they are logged and the remaining IDs still run. In hook
/// mode all lines are prepended in one write, and the file is left alone when no
/// line was produced.
pub async fn run<S, L, Fut>(
  resolution: &Resolution,
  cache: &LookupCache<S>,
  lookup: L,
  out: &mut impl Write,
) -> Result<Outcome, HookError>
where
  S: CacheStorage,
  L: Fn(WorkItemId) -> Fut,
  Fut: Future<Output = Result<WorkItemRecord, HookError>>,
{
  if resolution.ids.is_empty() {
    writeln!(out, "no valid ID's specified on the command line")?;
    return Ok(Outcome::NoIds);
  }

  // Read before anything is written back.
  let original = match &resolution.mode {
    Mode::Hook { commit_msg_file } => Some(std::fs::read_to_string(commit_msg_file)?),
    Mode::Direct => None,
  };

  let mut lines = Vec::new();
  let mut rendered = 0;
  for raw in &resolution.ids {
    match line_for(raw, cache, &lookup).await {
      Ok(line) => {
        rendered += 1;
        if resolution.is_direct() {
          writeln!(out, "{}", line)?;
        } else {
          lines.push(line);
        }
      }
      Err(e) => error!("Skipping {}: {}", raw, e),
    }
  }

  if let (Mode::Hook { commit_msg_file }, Some(original)) = (&resolution.mode, original) {
    if !lines.is_empty() {
      let mut contents = lines.join("\n");
      contents.push('\n');
      contents.push_str(&original);
      std::fs::write(commit_msg_file, contents)?;
      info!("Prepended {} line(s) to {}", lines.len(), commit_msg_file.display());
    }
  }

  Ok(Outcome::Completed { rendered })
}

async fn line_for<S, L, Fut>(
  raw: &str,
  cache: &LookupCache<S>,
  lookup: &L,
) -> Result<String, HookError>
where
  S: CacheStorage,
  L: Fn(WorkItemId) -> Fut,
  Fut: Future<Output = Result<WorkItemRecord, HookError>>,
{
  let id: WorkItemId = raw.parse()?;

  let result = cache
    .get_details(&id, || {
      let fetch = lookup(id.clone());
      async move { fetch.await.map(|record| render(&record)) }
    })
    .await?;

  match (result.source, result.cached_at) {
    (CacheSource::Cache, Some(cached_at)) => debug!("Using line for {} cached at {}", id, cached_at),
    _ => info!("Fetched {} from Rally", id),
  }

  Ok(result.data)
}
