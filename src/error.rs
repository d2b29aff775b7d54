//! Error types for the task cache.

use thiserror::Error;

use crate::types::RecordId;

/// Result type for cache and gateway operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the gateway, the wire adapter and the cache.
///
/// The first four variants are derived from the status the gateway reports.
/// `Clone` lets one refresh outcome be handed to every coalesced caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
  /// No response reached us from the server.
  #[error("connection error: could not reach {target}: {message}")]
  Connectivity {
    /// URL of the resource that was targeted.
    target: String,
    /// Transport-level description.
    message: String,
  },

  /// 404 from the server, or a miss in the local snapshot.
  #[error("not found{}: {target}", not_found_origin(.local))]
  NotFound {
    /// URL of the resource, or a description of the local lookup.
    target: String,
    /// Set when no request was made.
    local: bool,
  },

  /// 5xx from the server.
  #[error("server error ({status}): {target}: {detail}")]
  ServerFault {
    status: u16,
    target: String,
    detail: String,
  },

  /// Any other non-success status.
  #[error("error {status}: {target}: {detail}")]
  Generic {
    status: u16,
    target: String,
    detail: String,
  },

  /// A wire record could not be turned into a domain record.
  #[error("mapping error: {0}")]
  Mapping(String),

  /// A field was rejected before any request was sent.
  #[error("invalid {field}: {reason}")]
  InvalidInput { field: &'static str, reason: String },

  /// The background refresh task panicked or was aborted.
  #[error("refresh task failed: {0}")]
  TaskFailed(String),
}

impl SyncError {
  /// Classify a gateway-reported status. Status 0 means no response arrived.
  pub fn from_status(status: u16, target: impl Into<String>, detail: impl Into<String>) -> Self {
    let target = target.into();
    let detail = detail.into();
    match status {
      0 => Self::Connectivity {
        target,
        message: detail,
      },
      404 => Self::NotFound {
        target,
        local: false,
      },
      500..=599 => Self::ServerFault {
        status,
        target,
        detail,
      },
      _ => Self::Generic {
        status,
        target,
        detail,
      },
    }
  }

  /// A lookup miss in the cached snapshot. No request was made.
  pub fn not_cached(id: RecordId) -> Self {
    Self::NotFound {
      target: format!("record {}", id),
      local: true,
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound { .. })
  }
}

fn not_found_origin(local: &bool) -> &'static str {
  if *local {
    " in cache"
  } else {
    " (404)"
  }
}
