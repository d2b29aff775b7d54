//! Access to the remote task collection.
//!
//! The cache only talks to the server through [`RemoteGateway`], so the HTTP
//! client can be swapped for an in-memory one in tests.

mod http;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::types::RecordId;
use crate::wire::{WirePatch, WireRecord};

pub use http::HttpGateway;

/// The six operations the tasks service exposes on its collection resource.
///
/// Failures must already be classified into [`crate::SyncError`].
#[async_trait]
pub trait RemoteGateway: Send + Sync + 'static {
  /// `GET /resource/`
  async fn list(&self) -> SyncResult<Vec<WireRecord>>;

  /// `GET /resource/{id}/`
  async fn get(&self, id: RecordId) -> SyncResult<WireRecord>;

  /// `POST /resource/`
  async fn create(&self, body: &WirePatch) -> SyncResult<WireRecord>;

  /// `PUT /resource/{id}/`
  async fn replace(&self, id: RecordId, body: &WirePatch) -> SyncResult<WireRecord>;

  /// `PATCH /resource/{id}/`
  async fn partial_update(&self, id: RecordId, body: &WirePatch) -> SyncResult<WireRecord>;

  /// `DELETE /resource/{id}/`
  async fn delete(&self, id: RecordId) -> SyncResult<()>;
}

#[async_trait]
impl<T: RemoteGateway + ?Sized> RemoteGateway for std::sync::Arc<T> {
  async fn list(&self) -> SyncResult<Vec<WireRecord>> {
    (**self).list().await
  }

  async fn get(&self, id: RecordId) -> SyncResult<WireRecord> {
    (**self).get(id).await
  }

  async fn create(&self, body: &WirePatch) -> SyncResult<WireRecord> {
    (**self).create(body).await
  }

  async fn replace(&self, id: RecordId, body: &WirePatch) -> SyncResult<WireRecord> {
    (**self).replace(id, body).await
  }

  async fn partial_update(&self, id: RecordId, body: &WirePatch) -> SyncResult<WireRecord> {
    (**self).partial_update(id, body).await
  }

  async fn delete(&self, id: RecordId) -> SyncResult<()> {
    (**self).delete(id).await
  }
}
