use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{SyncError, SyncResult};

/// Server-assigned record identifier
pub type RecordId = u64;

/// Longest title the tasks service accepts
pub const MAX_TITLE_LEN: usize = 255;

/// A task as held by the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
  pub id: RecordId,
  pub title: String,
  pub description: String,
  pub completed: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Fields for a record that does not exist yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
  pub title: String,
  pub description: String,
  pub completed: bool,
}

impl NewRecord {
  pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      description: description.into(),
      completed: false,
    }
  }

  pub fn completed(mut self, completed: bool) -> Self {
    self.completed = completed;
    self
  }
}

/// A requested change. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
  pub title: Option<String>,
  pub description: Option<String>,
  pub completed: Option<bool>,
}

impl Patch {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn title(mut self, title: impl Into<String>) -> Self {
    self.title = Some(title.into());
    self
  }

  pub fn description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn completed(mut self, completed: bool) -> Self {
    self.completed = Some(completed);
    self
  }

  pub fn is_empty(&self) -> bool {
    self.title.is_none() && self.description.is_none() && self.completed.is_none()
  }

  /// Check the fields that are present against the service's constraints.
  pub fn validate(&self) -> SyncResult<()> {
    if let Some(title) = &self.title {
      validate_title(title)?;
    }
    Ok(())
  }
}

impl From<NewRecord> for Patch {
  fn from(fields: NewRecord) -> Self {
    Self {
      title: Some(fields.title),
      description: Some(fields.description),
      completed: Some(fields.completed),
    }
  }
}

fn validate_title(title: &str) -> SyncResult<()> {
  if title.trim().is_empty() {
    return Err(SyncError::InvalidInput {
      field: "title",
      reason: "must not be blank".to_string(),
    });
  }
  let len = title.chars().count();
  if len > MAX_TITLE_LEN {
    return Err(SyncError::InvalidInput {
      field: "title",
      reason: format!("{} characters, at most {} allowed", len, MAX_TITLE_LEN),
    });
  }
  Ok(())
}
