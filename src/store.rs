use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
  Transport,
  InvalidResponse,
  Denied,
}

#[derive(Debug, Clone)]
pub struct StoreError {
  pub kind: StoreErrorKind,
  pub message: String,
}

impl StoreError {
  pub fn transport(message: impl Into<String>) -> StoreError {
    StoreError {
      kind: StoreErrorKind::Transport,
      message: message.into(),
    }
  }

  pub fn invalid_response(message: impl Into<String>) -> StoreError {
    StoreError {
      kind: StoreErrorKind::InvalidResponse,
      message: message.into(),
    }
  }

  pub fn denied(message: impl Into<String>) -> StoreError {
    StoreError {
      kind: StoreErrorKind::Denied,
      message: message.into(),
    }
  }
}

impl std::fmt::Display for StoreError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self.kind {
      StoreErrorKind::Transport => write!(f, "store transport error: {}", self.message),
      StoreErrorKind::InvalidResponse => write!(f, "store returned invalid response: {}", self.message),
      StoreErrorKind::Denied => write!(f, "store access denied: {}", self.message),
    }
  }
}

impl std::error::Error for StoreError {}

// Read-only view of the document store. A missing document is a normal
// outcome (`Ok(None)` / empty vec), never an error; `Err` is reserved for
// transport-level failure.
#[async_trait]
pub trait DocumentStore: Send + Sync {
  async fn get_aggregate(
    &self,
    collection: &str,
    doc_id: &str,
    sub_path: Option<(&str, &str)>,
  ) -> Result<Option<Value>, StoreError>;

  async fn query_recent(
    &self,
    collection: &str,
    doc_id: &str,
    subcollection: &str,
    order_by: &str,
    descending: bool,
    limit: usize,
  ) -> Result<Vec<Value>, StoreError>;

  async fn list_documents(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError>;
}

pub fn doc_path(collection: &str, doc_id: &str, sub_path: Option<(&str, &str)>) -> String {
  match sub_path {
    Some((subcollection, sub_doc)) => format!("{collection}/{doc_id}/{subcollection}/{sub_doc}"),
    None => format!("{collection}/{doc_id}"),
  }
}

// Read-through cache scoped to one build/request. Entries are written once
// and never mutated afterwards; concurrent writers racing on the same key
// settle on the first value.
#[derive(Default)]
pub struct FetchCache {
  inner: Mutex<HashMap<String, Arc<Option<Value>>>>,
  hits: AtomicUsize,
}

impl FetchCache {
  pub fn new() -> FetchCache {
    FetchCache::default()
  }

  pub fn get(&self, key: &str) -> Option<Arc<Option<Value>>> {
    let guard = self.inner.lock().expect("fetch cache poisoned");
    let found = guard.get(key).cloned();
    if found.is_some() {
      self.hits.fetch_add(1, Ordering::Relaxed);
    }
    found
  }

  pub fn insert_if_absent(&self, key: &str, value: Option<Value>) -> Arc<Option<Value>> {
    let mut guard = self.inner.lock().expect("fetch cache poisoned");
    guard
      .entry(key.to_string())
      .or_insert_with(|| Arc::new(value))
      .clone()
  }

  pub fn hit_count(&self) -> usize {
    self.hits.load(Ordering::Relaxed)
  }
}

// In-memory store used by unit tests across the crate.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
  docs: HashMap<String, Value>,
  recent: HashMap<String, Vec<Value>>,
  fail_transport: bool,
  fail_doc_id: Option<String>,
}

#[cfg(test)]
impl MemoryStore {
  pub fn new() -> MemoryStore {
    MemoryStore::default()
  }

  pub fn with_doc(mut self, path: &str, doc: Value) -> MemoryStore {
    self.docs.insert(path.to_string(), doc);
    self
  }

  pub fn with_recent(mut self, path: &str, docs: Vec<Value>) -> MemoryStore {
    self.recent.insert(path.to_string(), docs);
    self
  }

  pub fn failing() -> MemoryStore {
    MemoryStore {
      fail_transport: true,
      ..MemoryStore::default()
    }
  }

  // Fail transport only for one document id; everything else keeps working.
  pub fn failing_for(mut self, doc_id: &str) -> MemoryStore {
    self.fail_doc_id = Some(doc_id.to_string());
    self
  }

  fn check(&self, doc_id: &str) -> Result<(), StoreError> {
    if self.fail_transport {
      return Err(StoreError::transport("connection refused"));
    }
    if self.fail_doc_id.as_deref() == Some(doc_id) {
      return Err(StoreError::transport(format!("connection reset reading {doc_id}")));
    }
    Ok(())
  }
}

#[cfg(test)]
#[async_trait]
impl DocumentStore for MemoryStore {
  async fn get_aggregate(
    &self,
    collection: &str,
    doc_id: &str,
    sub_path: Option<(&str, &str)>,
  ) -> Result<Option<Value>, StoreError> {
    self.check(doc_id)?;
    Ok(self.docs.get(&doc_path(collection, doc_id, sub_path)).cloned())
  }

  async fn query_recent(
    &self,
    collection: &str,
    doc_id: &str,
    subcollection: &str,
    _order_by: &str,
    _descending: bool,
    limit: usize,
  ) -> Result<Vec<Value>, StoreError> {
    self.check(doc_id)?;
    let key = format!("{collection}/{doc_id}/{subcollection}");
    let docs = self.recent.get(&key).cloned().unwrap_or_default();
    Ok(docs.into_iter().take(limit).collect())
  }

  async fn list_documents(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
    self.check("")?;
    let prefix = format!("{collection}/");
    let mut out: Vec<(String, Value)> = self
      .docs
      .iter()
      .filter_map(|(path, doc)| {
        let rest = path.strip_prefix(&prefix)?;
        if rest.contains('/') {
          return None;
        }
        Some((rest.to_string(), doc.clone()))
      })
      .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
  }
}
