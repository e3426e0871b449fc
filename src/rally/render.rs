//! Commit message line formatting.

use super::types::{EntityKind, WorkItemRecord};

const DASHBOARD_BASE: &str = "https://rally1.rallydev.com/#";

/// Dashboard deep-link for a work item.
pub fn detail_url(kind: EntityKind, project_id: &str, object_id: &str) -> String {
  format!(
    "{}/{}/dashboard?detail=%2F{}%2F{}",
    DASHBOARD_BASE,
    project_id,
    kind.detail_path(),
    object_id
  )
}

/// Render a record as `<prefix>: [<ID>](<url>) CONTEXT <Name>`, with the parent
/// story appended in parentheses when there is one.
pub fn render(record: &WorkItemRecord) -> String {
  let url = detail_url(record.kind, &record.project_object_id, &record.object_id);
  let mut line = format!(
    "{}: [{}]({}) CONTEXT {}",
    record.kind.prefix(),
    record.formatted_id,
    url,
    record.name
  );

  if let Some(parent) = record.parent.as_ref().filter(|_| record.kind.has_parent()) {
    line.push_str(&format!(" ({} - {})", parent.formatted_id, parent.name));
  }

  line
}
