use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};
use url::Url;

use crate::config::{Config, Credentials};
use crate::error::HookError;
use crate::rally::api_types::{ApiQueryResponse, ApiQueryResult, ApiScopeObject, ApiWorkItem};
use crate::rally::types::{WorkItemId, WorkItemRecord};

const WSAPI_PATH: &str = "/slm/webservice/v2.0/";
// API keys travel in this header instead of basic auth.
const API_KEY_HEADER: &str = "zsessionid";
const WORK_ITEM_FETCH: &str = "FormattedID,Name,ObjectID,Project,Parent";

/// A named workspace or project together with its WSAPI ref
#[derive(Debug, Clone)]
struct Scope {
  name: String,
  reference: String,
}

/// Authenticated Rally session scoped to one workspace and project
pub struct RallyClient {
  http: reqwest::Client,
  base: Url,
  basic_auth: Option<(String, String)>,
  workspace: Option<Scope>,
  project: Option<Scope>,
}

impl RallyClient {
  /// Authenticate and resolve the configured workspace and project.
  pub async fn connect(config: &Config) -> Result<Self, HookError> {
    let credentials = config.credentials()?;
    let mut client = Self::new(config, credentials)?;

    if let Some(name) = &config.rally.workspace {
      client.workspace = Some(client.resolve_scope("workspace", name).await?);
    }
    if let Some(name) = &config.rally.project {
      client.project = Some(client.resolve_scope("project", name).await?);
    }

    info!(
      server = %config.rally.server,
      workspace = client.workspace.as_ref().map(|s| s.name.as_str()).unwrap_or("<default>"),
      project = client.project.as_ref().map(|s| s.name.as_str()).unwrap_or("<default>"),
      "Connected to Rally"
    );

    Ok(client)
  }

  fn new(config: &Config, credentials: Credentials) -> Result<Self, HookError> {
    let base = Url::parse(&format!("https://{}{}", config.rally.server, WSAPI_PATH))
      .map_err(|e| HookError::remote("session", format!("invalid server address: {}", e)))?;

    let mut headers = HeaderMap::new();
    let basic_auth = match credentials {
      Credentials::ApiKey(key) => {
        let value = HeaderValue::from_str(&key)
          .map_err(|e| HookError::remote("session", format!("invalid API key: {}", e)))?;
        headers.insert(HeaderName::from_static(API_KEY_HEADER), value);
        None
      }
      Credentials::Basic { user, password } => Some((user, password)),
    };

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .timeout(Duration::from_secs(config.rally.timeout_secs))
      .build()
      .map_err(|e| HookError::remote("session", format!("failed to create HTTP client: {}", e)))?;

    Ok(Self {
      http,
      base,
      basic_auth,
      workspace: None,
      project: None,
    })
  }

  fn get(&self, url: Url) -> RequestBuilder {
    let request = self.http.get(url);
    match &self.basic_auth {
      Some((user, password)) => request.basic_auth(user, Some(password)),
      None => request,
    }
  }

  /// Build a query URL for a WSAPI type, scoped to the session's workspace/project.
  fn query_url(&self, api_type: &str, query: &str, fetch: &str) -> Result<Url, HookError> {
    let mut url = self
      .base
      .join(api_type)
      .map_err(|e| HookError::remote(api_type, e))?;

    {
      let mut pairs = url.query_pairs_mut();
      pairs.append_pair("query", query);
      pairs.append_pair("fetch", fetch);
      if let Some(ws) = &self.workspace {
        pairs.append_pair("workspace", &ws.reference);
      }
      if let Some(project) = &self.project {
        pairs.append_pair("project", &project.reference);
      }
    }

    Ok(url)
  }

  async fn run_query<T: DeserializeOwned>(
    &self,
    label: &str,
    url: Url,
  ) -> Result<(StatusCode, ApiQueryResult<T>), HookError> {
    debug!(%url, "Querying Rally");

    let response = self
      .get(url)
      .send()
      .await
      .map_err(|e| HookError::remote(label, e))?;
    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| HookError::remote(label, e))?;

    let parsed: ApiQueryResponse<T> = serde_json::from_str(&body).map_err(|e| {
      HookError::remote(label, format!("error code: {}, unreadable response: {}", status, e))
    })?;

    for warning in &parsed.query_result.warnings {
      debug!(label, "Rally warning: {}", warning);
    }

    Ok((status, parsed.query_result))
  }

  async fn resolve_scope(&self, api_type: &str, name: &str) -> Result<Scope, HookError> {
    let url = self.query_url(api_type, &format!("(Name = \"{}\")", name), "Name,ObjectID")?;
    let (status, result) = self.run_query::<ApiScopeObject>(name, url).await?;

    if !result.errors.is_empty() {
      return Err(HookError::remote(
        name,
        format!("error code: {}, {}", status, result.errors.join("; ")),
      ));
    }

    result
      .results
      .into_iter()
      .next()
      .map(|obj| Scope {
        name: if obj.name.is_empty() {
          name.to_string()
        } else {
          obj.name
        },
        reference: obj.reference,
      })
      .ok_or_else(|| HookError::remote(name, format!("{} not found", api_type)))
  }

  /// Look up a work item by its formatted ID.
  pub async fn find_work_item(&self, id: &WorkItemId) -> Result<WorkItemRecord, HookError> {
    let kind = id.kind();
    let url = self.query_url(
      kind.api_type(),
      &format!("(FormattedID = \"{}\")", id),
      WORK_ITEM_FETCH,
    )?;

    let (status, result) = self.run_query::<ApiWorkItem>(id.as_str(), url).await?;
    pick_record(id, status, result)
  }
}

/// Reduce a query result to one record.
///
/// Errors and unexpected result counts are logged; when several rows match the
/// last one wins.
fn pick_record(
  id: &WorkItemId,
  status: StatusCode,
  result: ApiQueryResult<ApiWorkItem>,
) -> Result<WorkItemRecord, HookError> {
  if !result.errors.is_empty() {
    error!(
      "request could not be successfully serviced for {}, error code: {}",
      id,
      status.as_u16()
    );
    error!("{}", result.errors.join("\n"));
  }

  debug!(
    %id,
    total = result.total_result_count,
    "Rally query returned"
  );

  let count = result.results.len();
  if count == 0 {
    error!("no item found for {}", id);
  } else if count > 1 {
    error!(
      "more than 1 item returned matching your criteria for {}",
      id
    );
  }

  result
    .results
    .into_iter()
    .last()
    .map(|row| row.into_record(id.kind()))
    .ok_or_else(|| HookError::NotFound(id.to_string()))
}

/// Session that authenticates on first use and is then shared by every lookup.
pub struct LazySession<'a> {
  config: &'a Config,
  client: OnceCell<RallyClient>,
}

impl<'a> LazySession<'a> {
  pub fn new(config: &'a Config) -> Self {
    Self {
      config,
      client: OnceCell::new(),
    }
  }

  pub async fn client(&self) -> Result<&RallyClient, HookError> {
    self
      .client
      .get_or_try_init(|| RallyClient::connect(self.config))
      .await
  }

  #[cfg(test)]
  pub fn is_connected(&self) -> bool {
    self.client.initialized()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::RallyConfig;

  fn item(formatted_id: &str, name: &str) -> ApiWorkItem {
    serde_json::from_value(serde_json::json!({
      "FormattedID": formatted_id,
      "Name": name,
      "ObjectID": 10,
      "Project": { "ObjectID": 20 },
    }))
    .unwrap()
  }

  fn result(rows: Vec<ApiWorkItem>, errors: Vec<String>) -> ApiQueryResult<ApiWorkItem> {
    ApiQueryResult {
      errors,
      warnings: Vec::new(),
      total_result_count: rows.len() as u64,
      results: rows,
    }
  }

  #[test]
  fn test_pick_single() {
    let id: WorkItemId = "US1".parse().unwrap();
    let record = pick_record(&id, StatusCode::OK, result(vec![item("US1", "One")], vec![])).unwrap();
    assert_eq!(record.name, "One");
    assert_eq!(record.object_id, "10");
    assert_eq!(record.project_object_id, "20");
  }

  #[test]
  fn test_pick_last_of_many() {
    let id: WorkItemId = "US1".parse().unwrap();
    let rows = vec![item("US1", "First"), item("US1", "Second")];
    let record = pick_record(&id, StatusCode::OK, result(rows, vec![])).unwrap();
    assert_eq!(record.name, "Second");
  }

  #[test]
  fn test_pick_none_is_not_found() {
    let id: WorkItemId = "DE9".parse().unwrap();
    let err = pick_record(&id, StatusCode::OK, result(vec![], vec![])).unwrap_err();
    assert!(matches!(err, HookError::NotFound(ref s) if s == "DE9"));
  }

  #[test]
  fn test_errors_still_use_rows() {
    let id: WorkItemId = "US1".parse().unwrap();
    let record = pick_record(
      &id,
      StatusCode::OK,
      result(vec![item("US1", "One")], vec!["partial".to_string()]),
    )
    .unwrap();
    assert_eq!(record.formatted_id, "US1");
  }

  fn test_config() -> Config {
    Config {
      rally: RallyConfig {
        workspace: Some("Acme".to_string()),
        ..RallyConfig::default()
      },
      ..Config::default()
    }
  }

  #[test]
  fn test_query_url_is_scoped() {
    let mut client = RallyClient::new(
      &test_config(),
      Credentials::ApiKey("_key".to_string()),
    )
    .unwrap();
    client.workspace = Some(Scope {
      name: "Acme".to_string(),
      reference: "/workspace/123".to_string(),
    });

    let url = client
      .query_url("defect", "(FormattedID = \"DE42\")", WORK_ITEM_FETCH)
      .unwrap();
    assert_eq!(url.host_str(), Some("rally1.rallydev.com"));
    assert_eq!(url.path(), "/slm/webservice/v2.0/defect");

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert!(pairs.contains(&("query".to_string(), "(FormattedID = \"DE42\")".to_string())));
    assert!(pairs.contains(&("workspace".to_string(), "/workspace/123".to_string())));
    assert!(!pairs.iter().any(|(k, _)| k == "project"));
  }

  #[test]
  fn test_session_starts_unconnected() {
    let config = test_config();
    let session = LazySession::new(&config);
    assert!(!session.is_connected());
  }
}
