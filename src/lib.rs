//! Client-side cache that mirrors a remote task collection.
//!
//! [`SyncCache`] owns the current [`Snapshot`], reloads it from the server
//! through a [`RemoteGateway`], and broadcasts every new snapshot to its
//! subscribers. [`HttpGateway`] talks to the tasks service over HTTP.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod remote;
pub mod types;
pub mod wire;

pub use cache::{Snapshot, SnapshotStream, SyncCache};
pub use error::{SyncError, SyncResult};
pub use remote::{HttpGateway, RemoteGateway};
pub use types::{NewRecord, Patch, Record, RecordId};
