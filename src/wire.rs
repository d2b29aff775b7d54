//! Serde types matching the tasks service's JSON, and the mapping to domain types.
//!
//! These types are separate from domain types so responses with slightly
//! different shapes still deserialize, while `Record` stays strict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::types::{Patch, Record, RecordId};

// ============================================================================
// Response shape
// ============================================================================

/// A record as the server sends it.
///
/// Timestamps normally arrive as `created_at`/`updated_at`; some responses
/// use `createdAt`/`updatedAt` instead, so both spellings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRecord {
  pub id: Option<RecordId>,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub completed: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<String>,
  #[serde(default, rename = "createdAt", skip_serializing_if = "Option::is_none")]
  pub created_at_alt: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<String>,
  #[serde(default, rename = "updatedAt", skip_serializing_if = "Option::is_none")]
  pub updated_at_alt: Option<String>,
}

// ============================================================================
// Request shape
// ============================================================================

/// Request body for create, replace and partial update.
/// Absent fields are omitted from the JSON, not sent as null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub completed: Option<bool>,
}

// ============================================================================
// Mapping
// ============================================================================

/// Convert a wire record into a domain record.
pub fn to_domain(raw: WireRecord) -> SyncResult<Record> {
  let id = raw
    .id
    .ok_or_else(|| SyncError::Mapping("record has no id".to_string()))?;

  let created_at = pick_timestamp(id, "created_at", raw.created_at, raw.created_at_alt)?;
  let updated_at = pick_timestamp(id, "updated_at", raw.updated_at, raw.updated_at_alt)?;

  Ok(Record {
    id,
    title: raw.title,
    description: raw.description,
    completed: raw.completed,
    created_at,
    updated_at,
  })
}

/// Convert a list response. Fails as a whole if any element fails.
pub fn to_domain_list(raw: Vec<WireRecord>) -> SyncResult<Vec<Record>> {
  raw.into_iter().map(to_domain).collect()
}

/// Build the request body for a patch. Only present fields are emitted.
pub fn to_wire(patch: &Patch) -> WirePatch {
  WirePatch {
    title: patch.title.clone(),
    description: patch.description.clone(),
    completed: patch.completed,
  }
}

/// Read a timestamp from the primary field, falling back to the secondary one.
fn pick_timestamp(
  id: RecordId,
  field: &str,
  primary: Option<String>,
  secondary: Option<String>,
) -> SyncResult<DateTime<Utc>> {
  let value = primary
    .filter(|s| !s.is_empty())
    .or(secondary.filter(|s| !s.is_empty()))
    .ok_or_else(|| SyncError::Mapping(format!("record {} has no {}", id, field)))?;

  DateTime::parse_from_rfc3339(&value)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| SyncError::Mapping(format!("record {} has invalid {} {:?}: {}", id, field, value, e)))
}
