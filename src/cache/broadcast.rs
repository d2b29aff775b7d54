//! Replay-latest broadcast of snapshots.

use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::snapshot::Snapshot;

/// Multicast channel that remembers the last published snapshot.
///
/// A new subscriber first receives the remembered snapshot (if any), then every
/// later publication in order. Each subscriber has its own unbounded queue, so a
/// slow consumer never loses snapshots and never holds up the publisher.
#[derive(Default)]
pub struct SnapshotBroadcast {
  state: Mutex<BroadcastState>,
}

#[derive(Default)]
struct BroadcastState {
  latest: Option<Snapshot>,
  subscribers: Vec<mpsc::UnboundedSender<Snapshot>>,
}

impl SnapshotBroadcast {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a subscriber. Registration and replay happen under the same lock
  /// as publication, so no snapshot is missed or delivered twice.
  pub fn subscribe(&self) -> SnapshotStream {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut state = self.lock();
    if let Some(latest) = &state.latest {
      let _ = tx.send(latest.clone());
    }
    state.subscribers.push(tx);
    SnapshotStream { rx }
  }

  /// Make `snapshot` the latest and deliver it to every live subscriber.
  pub fn publish(&self, snapshot: Snapshot) {
    let mut state = self.lock();
    state
      .subscribers
      .retain(|tx| tx.send(snapshot.clone()).is_ok());
    state.latest = Some(snapshot);
  }

  pub fn latest(&self) -> Option<Snapshot> {
    self.lock().latest.clone()
  }

  pub fn subscriber_count(&self) -> usize {
    let mut state = self.lock();
    state.subscribers.retain(|tx| !tx.is_closed());
    state.subscribers.len()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, BroadcastState> {
    // Nothing panics while holding this lock, so a poisoned state is still consistent
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }
}

/// Snapshots delivered to one subscriber, oldest first.
///
/// Dropping the stream unsubscribes. It ends only when the cache is gone.
pub struct SnapshotStream {
  rx: mpsc::UnboundedReceiver<Snapshot>,
}

impl SnapshotStream {
  /// Wait for the next snapshot.
  pub async fn next(&mut self) -> Option<Snapshot> {
    self.rx.recv().await
  }

  /// The next snapshot if one is already queued.
  pub fn try_next(&mut self) -> Option<Snapshot> {
    self.rx.try_recv().ok()
  }

  /// Stop delivery. Work already in flight is not affected.
  pub fn unsubscribe(mut self) {
    self.rx.close();
  }
}

impl Stream for SnapshotStream {
  type Item = Snapshot;

  fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Snapshot>> {
    self.rx.poll_recv(cx)
  }
}
