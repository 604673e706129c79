use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use url::Url;

/// Canonical stored shape of one sensor reading, decoded once at the store
/// boundary. Sources disagree on layout: some nest per-location metric maps
/// under named sensor groups, others put metric values at the top level.
/// Both survive here; store bookkeeping attributes do not.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub id: String,
    pub partition_key: String,
    pub name: String,
    /// Unix timestamp in the configured unit. Optional: documents without
    /// one are storable but excluded from reshaping.
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub groups: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected document: {0}")]
    Rejected(String),
}

/// Document persistence seam. Upserts key on `id` (last write wins); reads
/// return the full collection in storage order. Both calls may be slow and
/// remote, and both are fallible.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn upsert(&self, doc: StoredDocument) -> Result<(), StoreError>;
    async fn read_all(&self) -> Result<Vec<StoredDocument>, StoreError>;
}

/// In-process store used by tests and standalone demo mode. Replacing a
/// document keeps its original position so storage order stays stable
/// across rewrites of the same id.
#[derive(Clone, Default)]
pub struct MemoryStore {
    docs: Arc<Mutex<Vec<StoredDocument>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert(&self, doc: StoredDocument) -> Result<(), StoreError> {
        let mut docs = self
            .docs
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".to_string()))?;
        match docs.iter_mut().find(|existing| existing.id == doc.id) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<StoredDocument>, StoreError> {
        let docs = self
            .docs
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".to_string()))?;
        Ok(docs.clone())
    }
}

/// HTTP adapter for the remote document store: `PUT {base}/docs/{id}` to
/// upsert, `GET {base}/docs` for a full scan.
#[derive(Clone)]
pub struct HttpDocStore {
    client: reqwest::Client,
    base: Url,
}

impl HttpDocStore {
    pub fn new(base: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base,
        }
    }

    fn docs_url(&self, id: Option<&str>) -> Result<Url, StoreError> {
        let path = match id {
            Some(id) => format!("docs/{id}"),
            None => "docs".to_string(),
        };
        self.base
            .join(&path)
            .map_err(|err| StoreError::Rejected(err.to_string()))
    }
}

fn map_transport_error(err: reqwest::Error) -> StoreError {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Rejected(err.to_string())
    }
}

#[async_trait]
impl DocumentStore for HttpDocStore {
    async fn upsert(&self, doc: StoredDocument) -> Result<(), StoreError> {
        let url = self.docs_url(Some(&doc.id))?;
        let response = self
            .client
            .put(url)
            .json(&doc)
            .send()
            .await
            .map_err(map_transport_error)?;
        if response.status().is_server_error() {
            return Err(StoreError::Unavailable(format!(
                "upsert returned {}",
                response.status()
            )));
        }
        if !response.status().is_success() {
            return Err(StoreError::Rejected(format!(
                "upsert returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<StoredDocument>, StoreError> {
        let url = self.docs_url(None)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_transport_error)?;
        if !response.status().is_success() {
            return Err(StoreError::Unavailable(format!(
                "read_all returned {}",
                response.status()
            )));
        }
        response
            .json::<Vec<StoredDocument>>()
            .await
            .map_err(|err| StoreError::Rejected(err.to_string()))
    }
}
