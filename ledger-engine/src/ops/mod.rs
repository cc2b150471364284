//! Ledger mutation operations

pub mod accrual;
pub mod deposit;
pub mod reward;
pub mod withdrawal;

pub use accrual::AccrualRunner;
pub use deposit::DepositVerifier;
pub use reward::RewardSettler;
pub use withdrawal::WithdrawalProcessor;

use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::retry::RetryConfig;
use crate::store::DocumentStore;
use std::future::Future;
use tracing::warn;

/// Run a transaction body with bounded conflict retries.
///
/// The body receives a fresh scope each attempt and returns it for commit.
/// Contention, whether detected during reads or at commit, re-runs the body
/// after a backoff; any other error aborts immediately and the scope is
/// discarded unapplied.
pub(crate) async fn run_txn<S, T, F, Fut>(
    store: &S,
    retry: &RetryConfig,
    metrics: &Metrics,
    operation: &str,
    mut body: F,
) -> Result<T>
where
    S: DocumentStore,
    F: FnMut(S::Txn) -> Fut,
    Fut: Future<Output = Result<(S::Txn, T)>>,
{
    let mut attempt: u32 = 0;
    loop {
        let txn = store.begin().await?;
        let result = match body(txn).await {
            Ok((txn, value)) => store.commit(txn).await.map(|_| value),
            Err(e) => Err(e),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_contention() => {
                attempt += 1;
                metrics.record_txn_conflict();
                if attempt > retry.max_retries {
                    return Err(Error::Contention {
                        attempts: attempt,
                        last: e.to_string(),
                    });
                }
                warn!("{} lost a commit race (attempt {}), retrying", operation, attempt);
                tokio::time::sleep(retry.delay_for(attempt)).await;
            }
            Err(e) => return Err(e),
        }
    }
}
