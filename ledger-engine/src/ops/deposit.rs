//! Deposit verification and crediting
//!
//! A deposit only becomes a balance credit after the gateway confirms the
//! charge succeeded. The audit record under `transactions/{reference}` is
//! written in the same transactional scope as the credit and doubles as the
//! idempotency claim, so one reference can never credit twice.

use crate::error::{Error, Result};
use crate::guard;
use crate::metrics::Metrics;
use crate::ops::run_txn;
use crate::retry::RetryConfig;
use crate::store::{collections, doc_amount, DocumentStore, StoreTxn};
use crate::types::{Amount, DepositReceipt, TransactionRecord, UserId};
use chrono::Utc;
use gateway_client::PaymentGateway;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Verifies gateway charges and credits balances exactly once per reference.
pub struct DepositVerifier<S> {
    store: Arc<S>,
    gateway: Arc<dyn PaymentGateway>,
    retry: RetryConfig,
    metrics: Arc<Metrics>,
}

impl<S: DocumentStore> DepositVerifier<S> {
    /// Create a verifier over the given collaborators.
    pub fn new(
        store: Arc<S>,
        gateway: Arc<dyn PaymentGateway>,
        retry: RetryConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            gateway,
            retry,
            metrics,
        }
    }

    /// Verify `reference` with the gateway and credit `uid` with the
    /// gateway-reported amount.
    pub async fn verify(&self, reference: &str, uid: &UserId) -> Result<DepositReceipt> {
        if reference.trim().is_empty() {
            return Err(Error::Validation(
                "Deposit reference must not be empty".to_string(),
            ));
        }
        if uid.as_str().trim().is_empty() {
            return Err(Error::Validation("User id must not be empty".to_string()));
        }

        let charge = self.gateway.verify_transaction(reference).await?;
        if !charge.status.is_success() {
            warn!("Charge {} not successful: {}", reference, charge.status);
            return Err(Error::PaymentNotSuccessful {
                reference: reference.to_string(),
                status: charge.status,
            });
        }

        let amount = Amount::from_minor(charge.amount_minor);
        if !amount.is_positive() {
            return Err(Error::Validation(format!(
                "Gateway reported non-positive amount {} for {}",
                charge.amount_minor, reference
            )));
        }

        let verified_at = Utc::now();
        let record = TransactionRecord::deposit(
            reference,
            uid.clone(),
            amount,
            charge.channel.clone(),
            verified_at,
        );
        let record_value = serde_json::to_value(&record)?;

        let result = run_txn(
            self.store.as_ref(),
            &self.retry,
            &self.metrics,
            "verify_deposit",
            |mut txn| {
                let record_value = record_value.clone();
                let uid = uid.clone();
                let reference = reference.to_string();
                async move {
                    let claimed =
                        guard::claim(&mut txn, collections::TRANSACTIONS, &reference, record_value)
                            .await?;
                    if !claimed {
                        return Err(Error::DuplicateDeposit(reference));
                    }

                    let mut user = txn
                        .get(collections::USERS, uid.as_str())
                        .await?
                        .ok_or_else(|| Error::UserNotFound(uid.to_string()))?;
                    let balance = doc_amount(&user, "balance")?;
                    let new_balance = balance.checked_add(amount).ok_or_else(|| {
                        Error::Internal(format!("Balance overflow crediting {}", uid))
                    })?;
                    user["balance"] = json!(new_balance.minor());
                    txn.set(collections::USERS, uid.as_str(), user);

                    Ok((
                        txn,
                        DepositReceipt {
                            reference,
                            uid,
                            amount,
                            new_balance,
                            verified_at,
                        },
                    ))
                }
            },
        )
        .await;

        match &result {
            Ok(receipt) => {
                self.metrics.record_deposit();
                info!(
                    "Credited deposit {} of {} to {} (balance {})",
                    receipt.reference, receipt.amount, receipt.uid, receipt.new_balance
                );
            }
            Err(Error::DuplicateDeposit(reference)) => {
                self.metrics.record_duplicate_deposit();
                warn!("Refused duplicate deposit reference {}", reference);
            }
            Err(_) => {}
        }
        result
    }
}
