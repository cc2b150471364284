//! Document store abstraction
//!
//! The backing store is an external document database. The engine needs
//! point reads, one equality query, and transactional scopes with optimistic
//! commit validation, so that is the whole seam. [`memory::MemoryStore`]
//! implements it in-process for tests and single-node runs.

pub mod memory;

use crate::error::{Error, Result};
use crate::types::Amount;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Collection names in the backing document store
pub mod collections {
    /// Wallet user documents, keyed by uid
    pub const USERS: &str = "users";
    /// Deposit audit records, keyed by gateway reference
    pub const TRANSACTIONS: &str = "transactions";
    /// Task submissions awaiting review
    pub const TASK_SUBMISSIONS: &str = "task-submissions";
    /// Withdrawal requests
    pub const WITHDRAWALS: &str = "withdrawals";
    /// Investment positions
    pub const USER_INVESTMENTS: &str = "userinvestments";
}

/// A stored document with store-maintained metadata
#[derive(Debug, Clone)]
pub struct Document {
    /// Document payload
    pub data: Value,
    /// Write version, bumped on every commit that touches the document
    pub version: u64,
    /// When the document was first written
    pub created_at: DateTime<Utc>,
    /// When the document was last written
    pub updated_at: DateTime<Utc>,
}

/// Transactional scope: reads are recorded and validated at commit, writes
/// are staged and visible to later reads in the same scope.
#[async_trait]
pub trait StoreTxn: Send {
    /// Read a document inside the scope. The first read of each document
    /// pins it; commit fails with [`Error::TxnConflict`] if a pinned
    /// document changed underneath the scope.
    async fn get(&mut self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Stage a full-document write, visible to later `get`s in this scope.
    fn set(&mut self, collection: &str, id: &str, data: Value);
}

/// The document store seam
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Transactional scope type
    type Txn: StoreTxn;

    /// Open a transactional scope.
    async fn begin(&self) -> Result<Self::Txn>;

    /// Validate the scope's reads and apply its writes atomically.
    async fn commit(&self, txn: Self::Txn) -> Result<()>;

    /// Point read outside any transaction.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Equality query on a top-level field.
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Document)>>;
}

/// Read a minor-unit amount field from a raw document.
///
/// Absent and null fields read as zero (documents created before the field
/// existed). Fractional or negative values are corruption and error out;
/// whole-number floats are accepted because JSON writers disagree on number
/// representation.
pub fn doc_amount(doc: &Value, field: &str) -> Result<Amount> {
    let value = match doc.get(field) {
        None | Some(Value::Null) => return Ok(Amount::ZERO),
        Some(value) => value,
    };

    let minor = if let Some(minor) = value.as_i64() {
        Some(minor)
    } else {
        value.as_f64().and_then(|f| {
            // from 2^63 upward the cast saturates instead of converting
            if f.fract() == 0.0 && f >= 0.0 && f < 9_223_372_036_854_775_808.0 {
                Some(f as i64)
            } else {
                None
            }
        })
    };

    match minor {
        Some(minor) if minor >= 0 => Ok(Amount::from_minor(minor)),
        _ => Err(Error::Store(format!(
            "Field {} is not a non-negative integer amount: {}",
            field, value
        ))),
    }
}
