//! In-memory gateway for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, TimeZone, Utc};
use tokio::sync::Semaphore;

use crate::error::{SyncError, SyncResult};
use crate::types::RecordId;
use crate::wire::{WirePatch, WireRecord};

use super::RemoteGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
  List,
  Get,
  Create,
  Replace,
  PartialUpdate,
  Delete,
}

/// One request as seen by the mock server
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
  pub op: Op,
  pub id: Option<RecordId>,
  pub body: Option<WirePatch>,
}

struct ServerState {
  records: Vec<WireRecord>,
  next_id: RecordId,
  tick: i64,
}

impl ServerState {
  fn now(&mut self) -> String {
    self.tick += 1;
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (base + Duration::seconds(self.tick)).to_rfc3339_opts(SecondsFormat::Secs, true)
  }

  fn position(&self, id: RecordId) -> SyncResult<usize> {
    self
      .records
      .iter()
      .position(|r| r.id == Some(id))
      .ok_or_else(|| SyncError::from_status(404, item_path(id), "Not found."))
  }
}

/// A tasks service held in memory.
///
/// List responses reflect the server state when the request was issued. List
/// and delete responses can be held back with [`MockGateway::hold`] to make
/// requests overlap with other work.
pub struct MockGateway {
  state: Mutex<ServerState>,
  calls: Mutex<Vec<Call>>,
  failures: Mutex<HashMap<Op, u16>>,
  gates: Mutex<HashMap<Op, Arc<Semaphore>>>,
}

impl MockGateway {
  pub fn new() -> Self {
    Self {
      state: Mutex::new(ServerState {
        records: Vec::new(),
        next_id: 1,
        tick: 0,
      }),
      calls: Mutex::new(Vec::new()),
      failures: Mutex::new(HashMap::new()),
      gates: Mutex::new(HashMap::new()),
    }
  }

  pub fn with_records(records: Vec<WireRecord>) -> Self {
    let gateway = Self::new();
    {
      let mut state = gateway.state.lock().unwrap();
      state.next_id = records.iter().filter_map(|r| r.id).max().unwrap_or(0) + 1;
      state.records = records;
    }
    gateway
  }

  /// Make responses to `op` wait until released. Only lists and deletes wait.
  pub fn hold(&self, op: Op) {
    self
      .gates
      .lock()
      .unwrap()
      .insert(op, Arc::new(Semaphore::new(0)));
  }

  /// Let `n` held `op` requests complete.
  pub fn release(&self, op: Op, n: usize) {
    if let Some(gate) = self.gates.lock().unwrap().get(&op) {
      gate.add_permits(n);
    }
  }

  /// Stop holding `op` requests, releasing any that wait.
  pub fn open(&self, op: Op) {
    if let Some(gate) = self.gates.lock().unwrap().remove(&op) {
      gate.close();
    }
  }

  /// Make the next call of `op` fail with `status`.
  pub fn fail_next(&self, op: Op, status: u16) {
    self.failures.lock().unwrap().insert(op, status);
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  pub fn count(&self, op: Op) -> usize {
    self.calls.lock().unwrap().iter().filter(|c| c.op == op).count()
  }

  pub fn total_calls(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  /// Change a record behind the cache's back.
  pub fn set_completed(&self, id: RecordId, completed: bool) {
    let mut state = self.state.lock().unwrap();
    if let Ok(pos) = state.position(id) {
      state.records[pos].completed = completed;
    }
  }

  fn record_call(&self, op: Op, id: Option<RecordId>, body: Option<&WirePatch>) -> SyncResult<()> {
    self.calls.lock().unwrap().push(Call {
      op,
      id,
      body: body.cloned(),
    });

    match self.failures.lock().unwrap().remove(&op) {
      Some(status) => {
        let path = id.map(item_path).unwrap_or_else(|| COLLECTION.to_string());
        Err(SyncError::from_status(status, path, "injected failure"))
      }
      None => Ok(()),
    }
  }

  async fn respond(&self, op: Op) {
    let gate = self.gates.lock().unwrap().get(&op).cloned();
    if let Some(gate) = gate {
      // A closed gate returns Err, which means "let everything through"
      if let Ok(permit) = gate.acquire().await {
        permit.forget();
      }
    }
  }
}

const COLLECTION: &str = "/tasks/";

fn item_path(id: RecordId) -> String {
  format!("{}{}/", COLLECTION, id)
}

/// A wire record with fixed timestamps.
pub fn wire(id: RecordId, title: &str, completed: bool) -> WireRecord {
  WireRecord {
    id: Some(id),
    title: title.to_string(),
    description: String::new(),
    completed,
    created_at: Some("2024-01-01T00:00:00Z".to_string()),
    updated_at: Some("2024-01-01T00:00:00Z".to_string()),
    ..Default::default()
  }
}

fn apply(record: &mut WireRecord, body: &WirePatch) {
  if let Some(title) = &body.title {
    record.title = title.clone();
  }
  if let Some(description) = &body.description {
    record.description = description.clone();
  }
  if let Some(completed) = body.completed {
    record.completed = completed;
  }
}

#[async_trait]
impl RemoteGateway for MockGateway {
  async fn list(&self) -> SyncResult<Vec<WireRecord>> {
    self.record_call(Op::List, None, None)?;
    let records = self.state.lock().unwrap().records.clone();
    self.respond(Op::List).await;
    Ok(records)
  }

  async fn get(&self, id: RecordId) -> SyncResult<WireRecord> {
    self.record_call(Op::Get, Some(id), None)?;
    let state = self.state.lock().unwrap();
    let pos = state.position(id)?;
    Ok(state.records[pos].clone())
  }

  async fn create(&self, body: &WirePatch) -> SyncResult<WireRecord> {
    self.record_call(Op::Create, None, Some(body))?;
    let mut state = self.state.lock().unwrap();
    let id = state.next_id;
    state.next_id += 1;
    let now = state.now();

    let mut record = WireRecord {
      id: Some(id),
      created_at: Some(now.clone()),
      updated_at: Some(now),
      ..Default::default()
    };
    apply(&mut record, body);
    state.records.push(record.clone());
    Ok(record)
  }

  async fn replace(&self, id: RecordId, body: &WirePatch) -> SyncResult<WireRecord> {
    self.record_call(Op::Replace, Some(id), Some(body))?;
    if body.title.is_none() || body.description.is_none() {
      return Err(SyncError::from_status(400, item_path(id), "This field is required."));
    }
    let mut state = self.state.lock().unwrap();
    let pos = state.position(id)?;
    let now = state.now();
    let record = &mut state.records[pos];
    apply(record, body);
    record.updated_at = Some(now);
    Ok(record.clone())
  }

  async fn partial_update(&self, id: RecordId, body: &WirePatch) -> SyncResult<WireRecord> {
    self.record_call(Op::PartialUpdate, Some(id), Some(body))?;
    let mut state = self.state.lock().unwrap();
    let pos = state.position(id)?;
    let now = state.now();
    let record = &mut state.records[pos];
    apply(record, body);
    record.updated_at = Some(now);
    Ok(record.clone())
  }

  async fn delete(&self, id: RecordId) -> SyncResult<()> {
    self.record_call(Op::Delete, Some(id), None)?;
    {
      let mut state = self.state.lock().unwrap();
      let pos = state.position(id)?;
      state.records.remove(pos);
    }
    self.respond(Op::Delete).await;
    Ok(())
  }
}
