//! Atomic claim-and-record idempotency guard
//!
//! A claim is a create-if-absent on a deterministic key inside an open
//! transactional scope. The absence read is pinned, so two racing claims
//! cannot both commit: the loser conflicts, retries, re-reads the key as
//! present, and reports a duplicate.

use crate::error::Result;
use crate::store::StoreTxn;
use serde_json::Value;

/// Claim `collection/{key}` inside an open transactional scope.
///
/// Returns `false` when the key already exists. On `true` the claim record
/// is staged; it only becomes durable when the surrounding scope commits, so
/// a claim and the mutation it protects land together or not at all.
pub async fn claim<T: StoreTxn>(
    txn: &mut T,
    collection: &str,
    key: &str,
    record: Value,
) -> Result<bool> {
    if txn.get(collection, key).await?.is_some() {
        return Ok(false);
    }
    txn.set(collection, key, record);
    Ok(true)
}
