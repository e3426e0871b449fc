mod cache;
mod config;
mod error;
mod hook;
mod rally;
mod resolver;

use chrono::Duration;
use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cache::{FileStorage, LookupCache};
use crate::error::HookError;
use crate::rally::LazySession;

#[derive(Parser, Debug)]
#[command(name = "feature-defect-rally")]
#[command(about = "Link the Rally user story or defect of the current branch in the commit message")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./rally-hook.yaml or $XDG_CONFIG_HOME/rally-hook/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Log lookups and cache decisions to stderr
  #[arg(short, long)]
  verbose: bool,

  /// Ignore cached entries and query Rally again
  #[arg(long)]
  refresh: bool,

  /// Commit message file passed in by git
  commit_msg_file: Option<PathBuf>,

  /// Work item IDs to print instead of amending a commit message
  #[arg(last = true)]
  ids: Vec<String>,
}

/// Logs go to stderr so stdout stays reserved for printed lines.
fn init_logging(verbose: bool) -> tracing_appender::non_blocking::WorkerGuard {
  let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
  let default_directive = if verbose {
    "feature_defect_rally=debug"
  } else {
    "feature_defect_rally=warn"
  };
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(writer).with_target(false))
    .with(filter)
    .init();

  guard
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
  color_eyre::install()?;

  // clap swallows the separator itself, so look for it in the raw arguments.
  // A commit message file alongside it is rejected by the resolver.
  let separator = std::env::args_os().skip(1).any(|arg| arg == "--");
  let args = Args::parse();
  let _guard = init_logging(args.verbose);

  let config = config::Config::load(args.config.as_deref())?;

  let resolution = match resolver::resolve(
    separator,
    &args.ids,
    args.commit_msg_file.as_deref(),
    resolver::current_branch,
  ) {
    Ok(resolution) => resolution,
    Err(HookError::NoLinkedItem { branch }) => {
      warn!(%branch, "Branch does not link a work item");
      let status = hook::report_no_link(&mut std::io::stdout())?;
      return Ok(ExitCode::from(status));
    }
    Err(e) => return Err(e.into()),
  };

  let stale_time = if args.refresh {
    Duration::zero()
  } else {
    Duration::hours(config.cache.max_age_hours)
  };
  let cache = LookupCache::new(
    FileStorage::new(config.cache_dir()?),
    config.rally.workspace.as_deref(),
  )
  .with_stale_time(stale_time);

  // Authenticates on the first cache miss only.
  let session = LazySession::new(&config);
  let session = &session;

  let outcome = hook::run(
    &resolution,
    &cache,
    |id| async move { session.client().await?.find_work_item(&id).await },
    &mut std::io::stdout(),
  )
  .await?;

  Ok(ExitCode::from(outcome.exit_status()))
}
