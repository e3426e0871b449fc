use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::HookError;

// Two-letter type prefix followed by digits only
static ID_PATTERN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^(US|DE)[0-9]+$").expect("ID pattern is a valid regex"));

/// Kind of Rally artifact a formatted ID points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
  UserStory,
  Defect,
}

/// Conventional-commit type used at the start of the message line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePrefix {
  Feat,
  Fix,
}

impl MessagePrefix {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Feat => "feat",
      Self::Fix => "fix",
    }
  }
}

impl fmt::Display for MessagePrefix {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl EntityKind {
  /// Classify a formatted ID by its two-letter prefix.
  pub fn classify(id: &str) -> Result<Self, HookError> {
    let upper = id.to_uppercase();
    if upper.starts_with("US") {
      Ok(Self::UserStory)
    } else if upper.starts_with("DE") {
      Ok(Self::Defect)
    } else {
      Err(HookError::UnrecognizedIdKind(id.to_string()))
    }
  }

  pub fn prefix(self) -> MessagePrefix {
    match self {
      Self::UserStory => MessagePrefix::Feat,
      Self::Defect => MessagePrefix::Fix,
    }
  }

  /// WSAPI type name used in query URLs
  pub fn api_type(self) -> &'static str {
    match self {
      Self::UserStory => "hierarchicalrequirement",
      Self::Defect => "defect",
    }
  }

  /// Path segment used by the dashboard deep-link
  pub fn detail_path(self) -> &'static str {
    match self {
      Self::UserStory => "userstory",
      Self::Defect => "defect",
    }
  }

  /// Only user stories carry a parent story.
  pub fn has_parent(self) -> bool {
    matches!(self, Self::UserStory)
  }
}

/// An uppercase formatted ID like `US12345`, with its kind already decided.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkItemId(String);

impl WorkItemId {
  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn kind(&self) -> EntityKind {
    // Construction guarantees a US or DE prefix.
    if self.0.starts_with("US") {
      EntityKind::UserStory
    } else {
      EntityKind::Defect
    }
  }
}

impl FromStr for WorkItemId {
  type Err = HookError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let normalized = s.trim().to_uppercase();
    EntityKind::classify(&normalized)?;
    // The ID ends up in a cache path and in query text.
    if !ID_PATTERN.is_match(&normalized) {
      return Err(HookError::UnrecognizedIdKind(s.to_string()));
    }
    Ok(Self(normalized))
  }
}

impl fmt::Display for WorkItemId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Parent story reference shown after the item name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
  pub formatted_id: String,
  pub name: String,
}

/// Attributes of a single work item, as needed to render a message line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItemRecord {
  pub kind: EntityKind,
  pub formatted_id: String,
  pub name: String,
  pub object_id: String,
  pub project_object_id: String,
  pub parent: Option<ParentRef>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_user_story_is_feat() {
    let kind = EntityKind::classify("US12345").unwrap();
    assert_eq!(kind, EntityKind::UserStory);
    assert_eq!(kind.prefix().as_str(), "feat");
  }

  #[test]
  fn test_defect_is_fix() {
    let kind = EntityKind::classify("DE42").unwrap();
    assert_eq!(kind, EntityKind::Defect);
    assert_eq!(kind.prefix().as_str(), "fix");
  }

  #[test]
  fn test_unknown_prefix_is_error() {
    let err = EntityKind::classify("TA100").unwrap_err();
    assert!(matches!(err, HookError::UnrecognizedIdKind(id) if id == "TA100"));
  }

  #[test]
  fn test_id_is_uppercased() {
    let id: WorkItemId = "us999".parse().unwrap();
    assert_eq!(id.as_str(), "US999");
    assert_eq!(id.kind(), EntityKind::UserStory);

    let id: WorkItemId = "de42".parse().unwrap();
    assert_eq!(id.kind(), EntityKind::Defect);
  }

  #[test]
  fn test_id_rejects_unknown_prefix() {
    assert!("F123".parse::<WorkItemId>().is_err());
    assert!("".parse::<WorkItemId>().is_err());
  }

  #[test]
  fn test_id_requires_numeric_suffix() {
    for bad in [
      "USER",
      "DEFAULT",
      "US",
      "US1X",
      "US/../x",
      "us/../../../escaped",
      "US1\") OR (Name != \"x",
    ] {
      let err = bad.parse::<WorkItemId>().unwrap_err();
      assert!(
        matches!(err, HookError::UnrecognizedIdKind(_)),
        "{} should be rejected",
        bad
      );
    }
    assert_eq!(" de07 ".parse::<WorkItemId>().unwrap().as_str(), "DE07");
  }
}
