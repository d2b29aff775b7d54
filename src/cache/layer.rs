//! Cache layer that keeps the local snapshot in step with the server.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteGateway;
use crate::types::{NewRecord, Patch, Record, RecordId};
use crate::wire;

use super::broadcast::{SnapshotBroadcast, SnapshotStream};
use super::snapshot::Snapshot;

/// Outcome of one refresh, shared by every caller that joined it.
type RefreshCompletion = Shared<BoxFuture<'static, SyncResult<Snapshot>>>;

/// The synchronized cache.
///
/// Owns the current snapshot, a single-flight full refresh, and a replay-latest
/// broadcast of snapshots. Writes go to the server first:
///
/// - create and both kinds of update return the server's response and schedule
///   a refresh, so order and timestamps always come from the server;
/// - remove publishes a snapshot without the record once the server confirms.
///
/// A mutation's own result and the broadcast that reflects it are not ordered
/// relative to each other. The broadcast is eventually consistent: a refresh
/// that was already in flight when a mutation was confirmed is followed by one
/// more, and a stale list never brings back a record removed after it was
/// requested.
///
/// Clones share the same state. Construct one per process and hand it around.
pub struct SyncCache<G: RemoteGateway> {
  inner: Arc<Inner<G>>,
}

struct Inner<G> {
  gateway: G,
  snapshots: SnapshotBroadcast,
  state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
  /// Bumped by every confirmed mutation
  epoch: u64,
  /// Removed ids and the epoch of their removal, kept while an older refresh can still land
  tombstones: HashMap<RecordId, u64>,
  in_flight: Option<InFlight>,
  refresh_seq: u64,
  last_refresh_error: Option<SyncError>,
}

struct InFlight {
  id: u64,
  /// Epoch read when the list request went out, `None` while still queued
  issued_at: Option<u64>,
  completion: RefreshCompletion,
}

impl<G> Inner<G> {
  fn lock_state(&self) -> MutexGuard<'_, CacheState> {
    // No code panics while holding the lock, so the data is intact even if poisoned
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }
}

/// Clears the in-flight slot when a refresh task ends, including by panic or abort.
struct InFlightGuard<G> {
  inner: Arc<Inner<G>>,
  id: u64,
}

impl<G> Drop for InFlightGuard<G> {
  fn drop(&mut self) {
    let mut state = self.inner.lock_state();
    if state.in_flight.as_ref().map(|f| f.id) == Some(self.id) {
      state.in_flight = None;
    }
  }
}

impl<G: RemoteGateway> SyncCache<G> {
  /// Create an empty cache. No request is made until [`SyncCache::refresh`].
  pub fn new(gateway: G) -> Self {
    Self {
      inner: Arc::new(Inner {
        gateway,
        snapshots: SnapshotBroadcast::new(),
        state: Mutex::new(CacheState::default()),
      }),
    }
  }

  /// Create the cache and start the initial refresh in the background.
  ///
  /// Must be called from within a tokio runtime.
  pub fn connect(gateway: G) -> Self {
    let cache = Self::new(gateway);
    cache.schedule_refresh();
    cache
  }

  /// Receive the current snapshot (if there is one) and then every later one.
  pub fn subscribe(&self) -> SnapshotStream {
    self.inner.snapshots.subscribe()
  }

  /// The latest published snapshot.
  pub fn snapshot(&self) -> Option<Snapshot> {
    self.inner.snapshots.latest()
  }

  /// The most recent refresh failure, cleared by the next successful refresh.
  ///
  /// Refreshes scheduled by mutations report failures only here and in the log.
  pub fn last_refresh_error(&self) -> Option<SyncError> {
    self.inner.lock_state().last_refresh_error.clone()
  }

  /// Reload the whole collection and publish it.
  ///
  /// The request starts immediately, whether or not the returned future is
  /// awaited, and is never cancelled by dropping it. If a refresh is already in
  /// flight and nothing was written since its list request went out, or it is
  /// still queued, no new request is made and the returned future resolves with
  /// that refresh's outcome. If a write was confirmed since the list went out, a
  /// follow-up refresh is queued behind it. At most one list request is
  /// outstanding and at most one more is queued.
  pub fn refresh(&self) -> impl Future<Output = SyncResult<Snapshot>> + Send + 'static {
    self.begin_refresh()
  }

  /// Fetch one record from the server. The cache is not touched.
  pub async fn get(&self, id: RecordId) -> SyncResult<Record> {
    let raw = self.inner.gateway.get(id).await?;
    wire::to_domain(raw)
  }

  /// Create a record. Returns the server's copy and schedules a refresh.
  pub async fn create(&self, fields: NewRecord) -> SyncResult<Record> {
    let patch = Patch::from(fields);
    patch.validate()?;

    let raw = self.inner.gateway.create(&wire::to_wire(&patch)).await?;
    self.mutation_confirmed();
    let record = wire::to_domain(raw)?;
    debug!("Created record {}", record.id);
    Ok(record)
  }

  /// Replace a record (PUT). Returns the server's copy and schedules a refresh.
  pub async fn update(&self, id: RecordId, patch: Patch) -> SyncResult<Record> {
    patch.validate()?;

    let raw = self
      .inner
      .gateway
      .replace(id, &wire::to_wire(&patch))
      .await?;
    self.mutation_confirmed();
    wire::to_domain(raw)
  }

  /// Change only the fields present in `patch` (PATCH). Returns the server's
  /// copy and schedules a refresh.
  pub async fn partial_update(&self, id: RecordId, patch: Patch) -> SyncResult<Record> {
    patch.validate()?;

    let raw = self
      .inner
      .gateway
      .partial_update(id, &wire::to_wire(&patch))
      .await?;
    self.mutation_confirmed();
    wire::to_domain(raw)
  }

  /// Flip `completed` based on the cached snapshot.
  ///
  /// Fails with `NotFound` without any request if `id` is not in the current
  /// snapshot, even if the server has it.
  pub async fn toggle(&self, id: RecordId) -> SyncResult<Record> {
    let completed = self
      .snapshot()
      .and_then(|s| s.get(id).map(|r| r.completed))
      .ok_or_else(|| SyncError::not_cached(id))?;

    self
      .partial_update(id, Patch::new().completed(!completed))
      .await
  }

  /// Delete a record, then publish a snapshot without it.
  ///
  /// Nothing is published unless the server confirms, and no refresh is made.
  pub async fn remove(&self, id: RecordId) -> SyncResult<()> {
    self.inner.gateway.delete(id).await?;

    let mut state = self.inner.lock_state();
    state.epoch += 1;
    if state.in_flight.is_some() {
      let epoch = state.epoch;
      state.tombstones.insert(id, epoch);
    }

    match self.inner.snapshots.latest() {
      Some(current) => {
        let next = current.without(id);
        info!("Removed record {}, publishing {} records", id, next.len());
        self.inner.snapshots.publish(next);
      }
      None => debug!("Removed record {} before the first load", id),
    }
    Ok(())
  }

  /// Wait until no refresh is in flight or queued. Failures are ignored.
  pub async fn wait_idle(&self) {
    loop {
      let completion = match &self.inner.lock_state().in_flight {
        Some(in_flight) => in_flight.completion.clone(),
        None => return,
      };
      let _ = completion.await;
    }
  }

  fn mutation_confirmed(&self) {
    self.inner.lock_state().epoch += 1;
    self.schedule_refresh();
  }

  /// Start (or join) a refresh without waiting for it.
  fn schedule_refresh(&self) {
    drop(self.begin_refresh());
  }

  fn begin_refresh(&self) -> RefreshCompletion {
    let mut state = self.inner.lock_state();

    // A queued refresh reads the epoch when it starts, so it covers every write so far
    let previous = match &state.in_flight {
      Some(in_flight) if in_flight.issued_at.map_or(true, |e| e == state.epoch) => {
        debug!("Joining refresh #{}", in_flight.id);
        return in_flight.completion.clone();
      }
      Some(in_flight) => Some(in_flight.completion.clone()),
      None => None,
    };

    state.refresh_seq += 1;
    let id = state.refresh_seq;

    let cache = self.clone();
    let task = tokio::spawn(async move {
      let _guard = InFlightGuard {
        inner: Arc::clone(&cache.inner),
        id,
      };
      if let Some(previous) = previous {
        debug!("Refresh #{} queued behind the one in flight", id);
        let _ = previous.await;
      }
      cache.run_refresh(id).await
    });

    let completion = async move {
      task
        .await
        .unwrap_or_else(|e| Err(SyncError::TaskFailed(e.to_string())))
    }
    .boxed()
    .shared();

    state.in_flight = Some(InFlight {
      id,
      issued_at: None,
      completion: completion.clone(),
    });
    completion
  }

  async fn run_refresh(&self, id: u64) -> SyncResult<Snapshot> {
    let issued_at = {
      let mut state = self.inner.lock_state();
      let epoch = state.epoch;
      if let Some(in_flight) = state.in_flight.as_mut().filter(|f| f.id == id) {
        in_flight.issued_at = Some(epoch);
      }
      epoch
    };
    debug!("Refresh #{} listing records", id);

    let result = match self.inner.gateway.list().await {
      Ok(raw) => wire::to_domain_list(raw),
      Err(e) => Err(e),
    };

    let mut state = self.inner.lock_state();
    match result {
      Ok(records) => {
        // Records removed after this list was requested must not come back
        let tombstones = &state.tombstones;
        let records: Vec<Record> = records
          .into_iter()
          .filter(|r| {
            !tombstones
              .get(&r.id)
              .is_some_and(|&removed_at| removed_at > issued_at)
          })
          .collect();
        state
          .tombstones
          .retain(|_, removed_at| *removed_at > issued_at);
        state.last_refresh_error = None;

        let snapshot = Snapshot::new(records);
        info!("Refresh #{} publishing {} records", id, snapshot.len());
        self.inner.snapshots.publish(snapshot.clone());
        Ok(snapshot)
      }
      Err(e) => {
        warn!("Refresh #{} failed: {}", id, e);
        state.last_refresh_error = Some(e.clone());
        Err(e)
      }
    }
  }
}

impl<G: RemoteGateway> Clone for SyncCache<G> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}
