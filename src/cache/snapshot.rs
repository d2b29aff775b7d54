use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Arc;

use tracing::warn;

use crate::types::{Record, RecordId};

/// An immutable, ordered view of the collection.
///
/// Cloning is cheap and never copies records. A published snapshot is never
/// changed; every update builds a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
  records: Arc<[Record]>,
}

impl Snapshot {
  /// Build a snapshot from records in server order.
  ///
  /// Ids are unique within a snapshot: a repeated id keeps its first
  /// occurrence and later ones are dropped.
  pub fn new(records: Vec<Record>) -> Self {
    let mut seen = HashSet::with_capacity(records.len());
    let mut unique = Vec::with_capacity(records.len());
    for record in records {
      if seen.insert(record.id) {
        unique.push(record);
      } else {
        warn!("Dropping duplicate record id {} from snapshot", record.id);
      }
    }
    Self {
      records: unique.into(),
    }
  }

  pub fn records(&self) -> &[Record] {
    &self.records
  }

  pub fn get(&self, id: RecordId) -> Option<&Record> {
    self.records.iter().find(|r| r.id == id)
  }

  pub fn contains(&self, id: RecordId) -> bool {
    self.get(id).is_some()
  }

  pub fn ids(&self) -> Vec<RecordId> {
    self.records.iter().map(|r| r.id).collect()
  }

  pub fn completed_count(&self) -> usize {
    self.records.iter().filter(|r| r.completed).count()
  }

  pub fn pending_count(&self) -> usize {
    self.records.iter().filter(|r| !r.completed).count()
  }

  /// A new snapshot without `id`, order otherwise unchanged.
  pub(crate) fn without(&self, id: RecordId) -> Self {
    Self {
      records: self.records.iter().filter(|r| r.id != id).cloned().collect(),
    }
  }
}

impl Deref for Snapshot {
  type Target = [Record];

  fn deref(&self) -> &[Record] {
    &self.records
  }
}

impl<'a> IntoIterator for &'a Snapshot {
  type Item = &'a Record;
  type IntoIter = std::slice::Iter<'a, Record>;

  fn into_iter(self) -> Self::IntoIter {
    self.records.iter()
  }
}
