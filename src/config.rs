use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::HookError;

pub const DEFAULT_SERVER: &str = "rally1.rallydev.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_AGE_HOURS: i64 = 24;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub rally: RallyConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RallyConfig {
  /// Host name of the Rally server
  #[serde(default = "default_server")]
  pub server: String,
  /// Login for username/password authentication (ignored when an API key is set)
  pub user: Option<String>,
  /// Workspace name; also scopes the on-disk cache
  pub workspace: Option<String>,
  /// Project name to scope queries to
  pub project: Option<String>,
  /// Request timeout in seconds
  #[serde(default = "default_timeout")]
  pub timeout_secs: u64,
}

impl Default for RallyConfig {
  fn default() -> Self {
    Self {
      server: default_server(),
      user: None,
      workspace: None,
      project: None,
      timeout_secs: DEFAULT_TIMEOUT_SECS,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Cache root (default: ~/.git-log-rally-cache)
  pub dir: Option<PathBuf>,
  /// Entries older than this are refetched
  #[serde(default = "default_max_age")]
  pub max_age_hours: i64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      dir: None,
      max_age_hours: DEFAULT_MAX_AGE_HOURS,
    }
  }
}

fn default_server() -> String {
  DEFAULT_SERVER.to_string()
}

fn default_timeout() -> u64 {
  DEFAULT_TIMEOUT_SECS
}

fn default_max_age() -> i64 {
  DEFAULT_MAX_AGE_HOURS
}

/// How the hook authenticates against Rally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
  ApiKey(String),
  Basic { user: String, password: String },
}

impl Config {
  /// Load configuration from file, then apply environment overrides.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./rally-hook.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/rally-hook/config.yaml
  ///
  /// Unlike the explicit path, a missing file in the search locations is not an
  /// error: the hook is usually configured through the environment alone.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };
    config.apply_env(|key| std::env::var(key).ok());

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("rally-hook.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("rally-hook").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Overlay RALLY_* variables on top of file values.
  fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(server) = non_empty("RALLY_SERVER") {
      self.rally.server = server;
    }
    if let Some(user) = non_empty("RALLY_USER") {
      self.rally.user = Some(user);
    }
    if let Some(workspace) = non_empty("RALLY_WORKSPACE") {
      self.rally.workspace = Some(workspace);
    }
    if let Some(project) = non_empty("RALLY_PROJECT") {
      self.rally.project = Some(project);
    }
  }

  /// Cache root directory.
  pub fn cache_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.cache.dir {
      return Ok(dir.clone());
    }
    dirs::home_dir()
      .map(|home| home.join(".git-log-rally-cache"))
      .ok_or_else(|| eyre!("Could not determine home directory for the cache"))
  }

  /// Resolve credentials from the environment.
  ///
  /// RALLY_APIKEY wins; otherwise RALLY_PASSWORD is paired with the configured user.
  pub fn credentials(&self) -> std::result::Result<Credentials, HookError> {
    resolve_credentials(self.rally.user.as_deref(), |key| std::env::var(key).ok())
  }
}

fn resolve_credentials(
  user: Option<&str>,
  lookup: impl Fn(&str) -> Option<String>,
) -> std::result::Result<Credentials, HookError> {
  if let Some(key) = lookup("RALLY_APIKEY").filter(|k| !k.is_empty()) {
    return Ok(Credentials::ApiKey(key));
  }

  let user = user.ok_or(HookError::MissingConfig(
    "set RALLY_APIKEY, or RALLY_USER and RALLY_PASSWORD",
  ))?;
  let password = lookup("RALLY_PASSWORD")
    .ok_or(HookError::MissingConfig("RALLY_PASSWORD is not set"))?;

  Ok(Credentials::Basic {
    user: user.to_string(),
    password,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    move |key: &str| map.get(key).cloned()
  }

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.rally.server, DEFAULT_SERVER);
    assert_eq!(config.rally.timeout_secs, 30);
    assert_eq!(config.cache.max_age_hours, 24);
  }

  #[test]
  fn test_parse_partial_yaml() {
    let config: Config = serde_yaml::from_str("rally:\n  workspace: Acme\n").unwrap();
    assert_eq!(config.rally.workspace.as_deref(), Some("Acme"));
    assert_eq!(config.rally.server, DEFAULT_SERVER);
    assert_eq!(config.cache.max_age_hours, 24);
  }

  #[test]
  fn test_env_overrides_file() {
    let mut config: Config =
      serde_yaml::from_str("rally:\n  workspace: FromFile\n  project: Keep\n").unwrap();
    config.apply_env(env(&[
      ("RALLY_WORKSPACE", "FromEnv"),
      ("RALLY_SERVER", "rally.example.com"),
      ("RALLY_PROJECT", " "),
    ]));

    assert_eq!(config.rally.workspace.as_deref(), Some("FromEnv"));
    assert_eq!(config.rally.server, "rally.example.com");
    assert_eq!(config.rally.project.as_deref(), Some("Keep"));
  }

  #[test]
  fn test_api_key_wins() {
    let creds = resolve_credentials(
      Some("me@example.com"),
      env(&[("RALLY_APIKEY", "_abc"), ("RALLY_PASSWORD", "pw")]),
    )
    .unwrap();
    assert_eq!(creds, Credentials::ApiKey("_abc".to_string()));
  }

  #[test]
  fn test_basic_credentials() {
    let creds = resolve_credentials(Some("me@example.com"), env(&[("RALLY_PASSWORD", "pw")]))
      .unwrap();
    assert_eq!(
      creds,
      Credentials::Basic {
        user: "me@example.com".to_string(),
        password: "pw".to_string()
      }
    );
  }

  #[test]
  fn test_missing_credentials() {
    let err = resolve_credentials(None, env(&[])).unwrap_err();
    assert!(matches!(err, HookError::MissingConfig(_)));
  }
}
