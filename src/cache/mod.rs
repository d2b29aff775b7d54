//! Synchronized in-memory cache of the remote task collection.
//!
//! This module provides:
//! - An immutable, ordered `Snapshot` of the collection
//! - A replay-latest broadcast of snapshots to any number of subscribers
//! - `SyncCache`, which decides when to reload from the server and how each
//!   write is reconciled with the local snapshot

mod broadcast;
mod layer;
mod snapshot;

pub use broadcast::{SnapshotBroadcast, SnapshotStream};
pub use layer::SyncCache;
pub use snapshot::Snapshot;
