use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use async_trait::async_trait;

use crate::error::{SyncError, SyncResult};
use crate::types::RecordId;
use crate::wire::{WirePatch, WireRecord};

use super::RemoteGateway;

/// HTTP client for the tasks service
#[derive(Clone)]
pub struct HttpGateway {
  client: Client,
  collection: Url,
}

impl HttpGateway {
  /// `base_url` is the API root (e.g. `http://localhost:8000/api/`),
  /// `resource` the collection name under it (e.g. `tasks`).
  pub fn new(base_url: &str, resource: &str) -> SyncResult<Self> {
    let collection = collection_url(base_url, resource)?;
    Ok(Self {
      client: Client::new(),
      collection,
    })
  }

  /// URL of the collection, always with a trailing slash
  pub fn collection_url(&self) -> &Url {
    &self.collection
  }

  fn item_url(&self, id: RecordId) -> SyncResult<Url> {
    // The collection URL ends in '/', so joining a relative segment appends to it
    self
      .collection
      .join(&format!("{}/", id))
      .map_err(|e| SyncError::InvalidInput {
        field: "url",
        reason: format!("cannot address record {} under {}: {}", id, self.collection, e),
      })
  }

  fn request(&self, method: Method, url: &Url) -> RequestBuilder {
    debug!("{} {}", method, url);
    self.client.request(method, url.clone())
  }

  async fn send(&self, request: RequestBuilder, target: &Url) -> SyncResult<Response> {
    let response = request.send().await.map_err(|e| SyncError::Connectivity {
      target: target.to_string(),
      message: e.to_string(),
    })?;

    let status = response.status();
    debug!("{} <- {}", status, target);
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(SyncError::from_status(
      status.as_u16(),
      target.to_string(),
      error_detail(status, &body),
    ))
  }

  async fn send_json<T: DeserializeOwned>(
    &self,
    request: RequestBuilder,
    target: &Url,
  ) -> SyncResult<T> {
    let response = self.send(request, target).await?;
    response.json::<T>().await.map_err(|e| {
      if e.is_decode() {
        SyncError::Mapping(format!("unexpected response from {}: {}", target, e))
      } else {
        SyncError::Connectivity {
          target: target.to_string(),
          message: e.to_string(),
        }
      }
    })
  }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
  async fn list(&self) -> SyncResult<Vec<WireRecord>> {
    let url = &self.collection;
    self.send_json(self.request(Method::GET, url), url).await
  }

  async fn get(&self, id: RecordId) -> SyncResult<WireRecord> {
    let url = self.item_url(id)?;
    self.send_json(self.request(Method::GET, &url), &url).await
  }

  async fn create(&self, body: &WirePatch) -> SyncResult<WireRecord> {
    let url = &self.collection;
    let request = self.request(Method::POST, url).json(body);
    self.send_json(request, url).await
  }

  async fn replace(&self, id: RecordId, body: &WirePatch) -> SyncResult<WireRecord> {
    let url = self.item_url(id)?;
    let request = self.request(Method::PUT, &url).json(body);
    self.send_json(request, &url).await
  }

  async fn partial_update(&self, id: RecordId, body: &WirePatch) -> SyncResult<WireRecord> {
    let url = self.item_url(id)?;
    let request = self.request(Method::PATCH, &url).json(body);
    self.send_json(request, &url).await
  }

  async fn delete(&self, id: RecordId) -> SyncResult<()> {
    let url = self.item_url(id)?;
    self.send(self.request(Method::DELETE, &url), &url).await?;
    Ok(())
  }
}

/// Resolve `<base>/<resource>/`, normalising slashes on both parts.
fn collection_url(base_url: &str, resource: &str) -> SyncResult<Url> {
  let invalid = |reason: String| SyncError::InvalidInput {
    field: "url",
    reason,
  };

  let mut base = base_url.trim().to_string();
  if !base.ends_with('/') {
    base.push('/');
  }
  let base = Url::parse(&base).map_err(|e| invalid(format!("{:?}: {}", base_url, e)))?;
  if base.cannot_be_a_base() {
    return Err(invalid(format!("{:?} cannot be a base URL", base_url)));
  }

  let resource = resource.trim_matches('/');
  if resource.is_empty() {
    return Ok(base);
  }
  base
    .join(&format!("{}/", resource))
    .map_err(|e| invalid(format!("resource {:?}: {}", resource, e)))
}

/// Pull a readable message out of an error response.
///
/// The service reports errors as `{"detail": "..."}`; anything else is passed
/// through, and an empty body falls back to the status reason.
fn error_detail(status: StatusCode, body: &str) -> String {
  if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
    if let Some(detail) = map.get("detail").and_then(|v| v.as_str()) {
      return detail.to_string();
    }
  }

  let body = body.trim();
  if !body.is_empty() {
    return body.to_string();
  }

  status
    .canonical_reason()
    .unwrap_or("unknown error")
    .to_string()
}
