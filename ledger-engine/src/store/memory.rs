//! In-memory document store
//!
//! Versioned documents under one lock. Transactional commits validate the
//! scope's pinned read versions and bump versions on write, mirroring the
//! optimistic concurrency contract of the hosted document database.

use super::{Document, DocumentStore, StoreTxn};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct StoredDoc {
    data: Value,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

// collection name -> document id -> document; absent documents have
// implicit version 0, first write lands at version 1
type Shelf = HashMap<String, HashMap<String, StoredDoc>>;

/// In-memory implementation of [`DocumentStore`]
#[derive(Clone, Default)]
pub struct MemoryStore {
    shelf: Arc<RwLock<Shelf>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a document directly, outside any transaction.
    ///
    /// Seeding for tests and local bootstrapping; engine mutations always go
    /// through transactional scopes.
    pub fn insert(&self, collection: &str, id: &str, data: Value) {
        let mut shelf = self.shelf.write();
        let now = Utc::now();
        let coll = shelf.entry(collection.to_string()).or_default();
        match coll.get_mut(id) {
            Some(doc) => {
                doc.data = data;
                doc.version += 1;
                doc.updated_at = now;
            }
            None => {
                coll.insert(
                    id.to_string(),
                    StoredDoc {
                        data,
                        version: 1,
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
        }
    }
}

/// Transactional scope over [`MemoryStore`]
pub struct MemoryTxn {
    shelf: Arc<RwLock<Shelf>>,
    // first read of each document pins (version, data) for repeatable reads
    reads: HashMap<(String, String), (u64, Option<Value>)>,
    staged: HashMap<(String, String), Value>,
}

#[async_trait]
impl StoreTxn for MemoryTxn {
    async fn get(&mut self, collection: &str, id: &str) -> Result<Option<Value>> {
        let key = (collection.to_string(), id.to_string());

        if let Some(staged) = self.staged.get(&key) {
            return Ok(Some(staged.clone()));
        }
        if let Some((_, pinned)) = self.reads.get(&key) {
            return Ok(pinned.clone());
        }

        let (version, data) = {
            let shelf = self.shelf.read();
            let current = shelf.get(collection).and_then(|coll| coll.get(id));
            (
                current.map(|doc| doc.version).unwrap_or(0),
                current.map(|doc| doc.data.clone()),
            )
        };
        self.reads.insert(key, (version, data.clone()));
        Ok(data)
    }

    fn set(&mut self, collection: &str, id: &str, data: Value) {
        self.staged
            .insert((collection.to_string(), id.to_string()), data);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    type Txn = MemoryTxn;

    async fn begin(&self) -> Result<MemoryTxn> {
        Ok(MemoryTxn {
            shelf: Arc::clone(&self.shelf),
            reads: HashMap::new(),
            staged: HashMap::new(),
        })
    }

    async fn commit(&self, txn: MemoryTxn) -> Result<()> {
        let mut shelf = self.shelf.write();

        for ((collection, id), (version, _)) in &txn.reads {
            let current = shelf
                .get(collection)
                .and_then(|coll| coll.get(id))
                .map(|doc| doc.version)
                .unwrap_or(0);
            if current != *version {
                return Err(Error::TxnConflict(format!(
                    "{}/{} changed during transaction",
                    collection, id
                )));
            }
        }

        let now = Utc::now();
        for ((collection, id), data) in txn.staged {
            let coll = shelf.entry(collection).or_default();
            match coll.get_mut(&id) {
                Some(doc) => {
                    doc.data = data;
                    doc.version += 1;
                    doc.updated_at = now;
                }
                None => {
                    coll.insert(
                        id,
                        StoredDoc {
                            data,
                            version: 1,
                            created_at: now,
                            updated_at: now,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let shelf = self.shelf.read();
        Ok(shelf
            .get(collection)
            .and_then(|coll| coll.get(id))
            .map(|doc| Document {
                data: doc.data.clone(),
                version: doc.version,
                created_at: doc.created_at,
                updated_at: doc.updated_at,
            }))
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Document)>> {
        let shelf = self.shelf.read();
        let mut results = Vec::new();
        if let Some(coll) = shelf.get(collection) {
            for (id, doc) in coll {
                if doc.data.get(field) == Some(value) {
                    results.push((
                        id.clone(),
                        Document {
                            data: doc.data.clone(),
                            version: doc.version,
                            created_at: doc.created_at,
                            updated_at: doc.updated_at,
                        },
                    ));
                }
            }
        }
        // stable order so chunked runs are deterministic
        results.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(results)
    }
}
