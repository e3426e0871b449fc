//! Serde-deserializable types matching Rally WSAPI v2.0 query responses.
//!
//! These types are separate from domain types so the raw tracker response never
//! leaves the client module.

use serde::{Deserialize, Deserializer};

use super::types::{EntityKind, ParentRef, WorkItemRecord};

/// Accept ObjectIDs as either JSON numbers or strings.
fn deserialize_object_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  let value = serde_json::Value::deserialize(deserializer)?;
  match value {
    serde_json::Value::String(s) => Ok(s),
    serde_json::Value::Number(n) => Ok(n.to_string()),
    other => Err(serde::de::Error::custom(format!(
      "expected ObjectID, got {}",
      other
    ))),
  }
}

// ============================================================================
// Query envelope
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiQueryResponse<T> {
  #[serde(rename = "QueryResult")]
  pub query_result: ApiQueryResult<T>,
}

#[derive(Debug, Deserialize)]
pub struct ApiQueryResult<T> {
  #[serde(rename = "Errors", default)]
  pub errors: Vec<String>,
  #[serde(rename = "Warnings", default)]
  pub warnings: Vec<String>,
  #[serde(rename = "TotalResultCount", default)]
  pub total_result_count: u64,
  #[serde(rename = "Results", default = "Vec::new")]
  pub results: Vec<T>,
}

// ============================================================================
// Workspace / project lookups
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiScopeObject {
  #[serde(rename = "_ref")]
  pub reference: String,
  #[serde(rename = "Name", default)]
  pub name: String,
}

// ============================================================================
// Work items
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiProjectRef {
  #[serde(rename = "ObjectID", deserialize_with = "deserialize_object_id")]
  pub object_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiParentRef {
  #[serde(rename = "FormattedID")]
  pub formatted_id: String,
  #[serde(rename = "Name", default)]
  pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiWorkItem {
  #[serde(rename = "FormattedID")]
  pub formatted_id: String,
  #[serde(rename = "Name", default)]
  pub name: String,
  #[serde(rename = "ObjectID", deserialize_with = "deserialize_object_id")]
  pub object_id: String,
  #[serde(rename = "Project")]
  pub project: ApiProjectRef,
  #[serde(rename = "Parent", default)]
  pub parent: Option<ApiParentRef>,
}

impl ApiWorkItem {
  pub fn into_record(self, kind: EntityKind) -> WorkItemRecord {
    let parent = if kind.has_parent() {
      self.parent.map(|p| ParentRef {
        formatted_id: p.formatted_id,
        name: p.name,
      })
    } else {
      None
    };

    WorkItemRecord {
      kind,
      formatted_id: self.formatted_id,
      name: self.name,
      object_id: self.object_id,
      project_object_id: self.project.object_id,
      parent,
    }
  }
}
