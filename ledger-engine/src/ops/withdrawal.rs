//! Withdrawal processing
//!
//! Debit-before-transfer: the balance is debited and the withdrawal moved to
//! `processing` in one transactional scope, then the external transfer is
//! initiated outside it under a reference derived from the withdrawal id.
//! Outcomes that cannot be confirmed leave the withdrawal in `processing`
//! for the explicit reconciliation path; a withdrawal is never marked
//! `completed` on an unconfirmed transfer.

use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::ops::run_txn;
use crate::retry::RetryConfig;
use crate::store::{collections, doc_amount, DocumentStore, StoreTxn};
use crate::types::{Withdrawal, WithdrawalOutcome, WithdrawalStatus};
use chrono::Utc;
use gateway_client::{PaymentGateway, TransferRequest, TransferState};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Processes and reconciles withdrawal requests.
pub struct WithdrawalProcessor<S> {
    store: Arc<S>,
    gateway: Arc<dyn PaymentGateway>,
    retry: RetryConfig,
    metrics: Arc<Metrics>,
}

fn transfer_reference_for(withdrawal_id: &str) -> String {
    format!("zyp-wd-{}", withdrawal_id)
}

fn outcome_from(id: &str, withdrawal: &Withdrawal) -> WithdrawalOutcome {
    WithdrawalOutcome {
        id: id.to_string(),
        uid: withdrawal.uid.clone(),
        amount: withdrawal.amount,
        status: withdrawal.status,
        transfer_reference: withdrawal.transfer_reference.clone(),
        failure_reason: withdrawal.failure_reason.clone(),
    }
}

impl<S: DocumentStore> WithdrawalProcessor<S> {
    /// Create a processor over the given collaborators.
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

    /// Debit a pending withdrawal and initiate its transfer.
    pub async fn process(&self, withdrawal_id: &str) -> Result<WithdrawalOutcome> {
        if withdrawal_id.trim().is_empty() {
            return Err(Error::Validation(
                "Withdrawal id must not be empty".to_string(),
            ));
        }

        let doc = self
            .store
            .get(collections::WITHDRAWALS, withdrawal_id)
            .await?
            .ok_or_else(|| Error::WithdrawalNotFound(withdrawal_id.to_string()))?;
        let withdrawal: Withdrawal = serde_json::from_value(doc.data)?;

        if withdrawal.status != WithdrawalStatus::Pending {
            return Err(Error::AlreadyProcessed {
                id: withdrawal_id.to_string(),
                status: withdrawal.status,
            });
        }
        if !withdrawal.amount.is_positive() {
            return Err(Error::Validation(format!(
                "Withdrawal {} has a non-positive amount",
                withdrawal_id
            )));
        }
        let recipient = withdrawal.recipient_code.clone().ok_or_else(|| {
            Error::Validation(format!("Withdrawal {} has no recipient code", withdrawal_id))
        })?;

        let debited = self.debit(withdrawal_id).await?;
        self.metrics.record_withdrawal_debit();
        info!(
            "Debited withdrawal {} of {} from {}",
            withdrawal_id, debited.amount, debited.uid
        );

        let reference = transfer_reference_for(withdrawal_id);
        self.settle_transfer(withdrawal_id, &debited, &reference, &recipient)
            .await
    }

    /// Drive a `processing` withdrawal forward from the gateway's view of
    /// its transfer. Terminal withdrawals are reported unchanged.
    pub async fn reconcile(&self, withdrawal_id: &str) -> Result<WithdrawalOutcome> {
        if withdrawal_id.trim().is_empty() {
            return Err(Error::Validation(
                "Withdrawal id must not be empty".to_string(),
            ));
        }

        let doc = self
            .store
            .get(collections::WITHDRAWALS, withdrawal_id)
            .await?
            .ok_or_else(|| Error::WithdrawalNotFound(withdrawal_id.to_string()))?;
        let withdrawal: Withdrawal = serde_json::from_value(doc.data)?;

        match withdrawal.status {
            WithdrawalStatus::Completed | WithdrawalStatus::Failed => {
                Ok(outcome_from(withdrawal_id, &withdrawal))
            }
            WithdrawalStatus::Pending => Err(Error::Validation(format!(
                "Withdrawal {} has not been processed yet",
                withdrawal_id
            ))),
            WithdrawalStatus::Processing => {
                let reference = withdrawal
                    .transfer_reference
                    .clone()
                    .unwrap_or_else(|| transfer_reference_for(withdrawal_id));

                match self.gateway.transfer_status(&reference).await {
                    Ok(TransferState::Success) => self.finalize(withdrawal_id).await,
                    Ok(TransferState::Failed) => {
                        self.compensate(withdrawal_id, "Transfer failed").await
                    }
                    Ok(TransferState::Reversed) => {
                        self.compensate(withdrawal_id, "Transfer reversed by receiving bank")
                            .await
                    }
                    Ok(state) => {
                        info!(
                            "Transfer {} still {}, leaving withdrawal {} processing",
                            reference, state, withdrawal_id
                        );
                        Ok(outcome_from(withdrawal_id, &withdrawal))
                    }
                    Err(gateway_client::Error::Api { status: 404, .. }) => {
                        // the transfer never reached the gateway; the
                        // reference is idempotent so resubmission is safe
                        warn!(
                            "Transfer {} unknown to gateway, resubmitting for withdrawal {}",
                            reference, withdrawal_id
                        );
                        let recipient = withdrawal.recipient_code.clone().ok_or_else(|| {
                            Error::Internal(format!(
                                "Withdrawal {} is processing without a recipient code",
                                withdrawal_id
                            ))
                        })?;
                        self.settle_transfer(withdrawal_id, &withdrawal, &reference, &recipient)
                            .await
                    }
                    Err(e) => {
                        warn!(
                            "Transfer {} status unavailable ({}), leaving withdrawal {} processing",
                            reference, e, withdrawal_id
                        );
                        Err(Error::Gateway(e))
                    }
                }
            }
        }
    }

    /// Move `pending` to `processing`, debiting the owner in the same scope.
    async fn debit(&self, withdrawal_id: &str) -> Result<Withdrawal> {
        run_txn(
            self.store.as_ref(),
            &self.retry,
            &self.metrics,
            "debit_withdrawal",
            |mut txn| {
                let withdrawal_id = withdrawal_id.to_string();
                async move {
                    let mut wdoc = txn
                        .get(collections::WITHDRAWALS, &withdrawal_id)
                        .await?
                        .ok_or_else(|| Error::WithdrawalNotFound(withdrawal_id.clone()))?;
                    let mut withdrawal: Withdrawal = serde_json::from_value(wdoc.clone())?;

                    if withdrawal.status != WithdrawalStatus::Pending {
                        return Err(Error::AlreadyProcessed {
                            id: withdrawal_id.clone(),
                            status: withdrawal.status,
                        });
                    }

                    let uid = withdrawal.uid.clone();
                    let mut user = txn
                        .get(collections::USERS, uid.as_str())
                        .await?
                        .ok_or_else(|| Error::UserNotFound(uid.to_string()))?;
                    let balance = doc_amount(&user, "balance")?;
                    let remaining = balance.checked_sub(withdrawal.amount).ok_or(
                        Error::InsufficientBalance {
                            required: withdrawal.amount,
                            available: balance,
                        },
                    )?;
                    user["balance"] = json!(remaining.minor());
                    txn.set(collections::USERS, uid.as_str(), user);

                    let processed_at = Utc::now();
                    let reference = transfer_reference_for(&withdrawal_id);
                    wdoc["status"] = json!(WithdrawalStatus::Processing);
                    wdoc["processedAt"] = json!(processed_at);
                    wdoc["transferReference"] = json!(reference);
                    txn.set(collections::WITHDRAWALS, &withdrawal_id, wdoc);

                    withdrawal.status = WithdrawalStatus::Processing;
                    withdrawal.processed_at = Some(processed_at);
                    withdrawal.transfer_reference = Some(reference);
                    Ok((txn, withdrawal))
                }
            },
        )
        .await
    }

    /// Initiate the transfer and settle the outcome.
    async fn settle_transfer(
        &self,
        withdrawal_id: &str,
        withdrawal: &Withdrawal,
        reference: &str,
        recipient: &str,
    ) -> Result<WithdrawalOutcome> {
        let request = TransferRequest {
            reference: reference.to_string(),
            amount_minor: withdrawal.amount.minor(),
            recipient_code: recipient.to_string(),
            reason: Some(format!("Zyppayx withdrawal {}", withdrawal_id)),
        };

        match self.gateway.initiate_transfer(&request).await {
            Ok(ack) => match ack.state {
                TransferState::Success => self.finalize(withdrawal_id).await,
                TransferState::Failed | TransferState::Reversed => {
                    self.compensate(
                        withdrawal_id,
                        &format!("Transfer {} at initiation", ack.state),
                    )
                    .await
                }
                TransferState::Pending | TransferState::Unknown => {
                    warn!(
                        "Transfer {} unconfirmed at initiation, leaving withdrawal {} processing",
                        reference, withdrawal_id
                    );
                    self.metrics.record_withdrawal_unconfirmed();
                    Ok(outcome_from(withdrawal_id, withdrawal))
                }
            },
            Err(e) if e.is_definitive_rejection() => {
                warn!("Transfer {} rejected by gateway: {}", reference, e);
                self.compensate(withdrawal_id, &format!("Gateway rejected transfer: {}", e))
                    .await
            }
            Err(e) => {
                warn!(
                    "Transfer {} outcome unknown ({}), leaving withdrawal {} processing",
                    reference, e, withdrawal_id
                );
                self.metrics.record_withdrawal_unconfirmed();
                Ok(outcome_from(withdrawal_id, withdrawal))
            }
        }
    }

    /// Move `processing` to `completed`. Idempotent for already-completed
    /// withdrawals.
    async fn finalize(&self, withdrawal_id: &str) -> Result<WithdrawalOutcome> {
        let (outcome, changed) = run_txn(
            self.store.as_ref(),
            &self.retry,
            &self.metrics,
            "finalize_withdrawal",
            |mut txn| {
                let withdrawal_id = withdrawal_id.to_string();
                async move {
                    let mut wdoc = txn
                        .get(collections::WITHDRAWALS, &withdrawal_id)
                        .await?
                        .ok_or_else(|| Error::WithdrawalNotFound(withdrawal_id.clone()))?;
                    let mut withdrawal: Withdrawal = serde_json::from_value(wdoc.clone())?;

                    match withdrawal.status {
                        WithdrawalStatus::Completed => {
                            Ok((txn, (outcome_from(&withdrawal_id, &withdrawal), false)))
                        }
                        WithdrawalStatus::Processing => {
                            let completed_at = Utc::now();
                            wdoc["status"] = json!(WithdrawalStatus::Completed);
                            wdoc["completedAt"] = json!(completed_at);
                            txn.set(collections::WITHDRAWALS, &withdrawal_id, wdoc);

                            withdrawal.status = WithdrawalStatus::Completed;
                            withdrawal.completed_at = Some(completed_at);
                            Ok((txn, (outcome_from(&withdrawal_id, &withdrawal), true)))
                        }
                        WithdrawalStatus::Pending => Err(Error::Internal(format!(
                            "Cannot complete undebited withdrawal {}",
                            withdrawal_id
                        ))),
                        status => Err(Error::AlreadyProcessed {
                            id: withdrawal_id.clone(),
                            status,
                        }),
                    }
                }
            },
        )
        .await?;

        if changed {
            self.metrics.record_withdrawal_completed();
            info!("Withdrawal {} completed", withdrawal_id);
        }
        Ok(outcome)
    }

    /// Move `processing` to `failed`, re-crediting the owner in the same
    /// scope. Idempotent for already-failed withdrawals.
    async fn compensate(&self, withdrawal_id: &str, reason: &str) -> Result<WithdrawalOutcome> {
        let (outcome, changed) = run_txn(
            self.store.as_ref(),
            &self.retry,
            &self.metrics,
            "compensate_withdrawal",
            |mut txn| {
                let withdrawal_id = withdrawal_id.to_string();
                let reason = reason.to_string();
                async move {
                    let mut wdoc = txn
                        .get(collections::WITHDRAWALS, &withdrawal_id)
                        .await?
                        .ok_or_else(|| Error::WithdrawalNotFound(withdrawal_id.clone()))?;
                    let mut withdrawal: Withdrawal = serde_json::from_value(wdoc.clone())?;

                    match withdrawal.status {
                        WithdrawalStatus::Failed => {
                            Ok((txn, (outcome_from(&withdrawal_id, &withdrawal), false)))
                        }
                        WithdrawalStatus::Processing => {
                            let uid = withdrawal.uid.clone();
                            let mut user = txn
                                .get(collections::USERS, uid.as_str())
                                .await?
                                .ok_or_else(|| Error::UserNotFound(uid.to_string()))?;
                            let balance = doc_amount(&user, "balance")?;
                            let restored =
                                balance.checked_add(withdrawal.amount).ok_or_else(|| {
                                    Error::Internal(format!(
                                        "Balance overflow re-crediting {}",
                                        uid
                                    ))
                                })?;
                            user["balance"] = json!(restored.minor());
                            txn.set(collections::USERS, uid.as_str(), user);

                            wdoc["status"] = json!(WithdrawalStatus::Failed);
                            wdoc["failureReason"] = json!(reason);
                            txn.set(collections::WITHDRAWALS, &withdrawal_id, wdoc);

                            withdrawal.status = WithdrawalStatus::Failed;
                            withdrawal.failure_reason = Some(reason);
                            Ok((txn, (outcome_from(&withdrawal_id, &withdrawal), true)))
                        }
                        WithdrawalStatus::Pending => Err(Error::Internal(format!(
                            "Cannot compensate undebited withdrawal {}",
                            withdrawal_id
                        ))),
                        status => Err(Error::AlreadyProcessed {
                            id: withdrawal_id.clone(),
                            status,
                        }),
                    }
                }
            },
        )
        .await?;

        if changed {
            self.metrics.record_withdrawal_failed();
            warn!(
                "Withdrawal {} failed, re-credited {} to {}: {}",
                withdrawal_id,
                outcome.amount,
                outcome.uid,
                outcome.failure_reason.as_deref().unwrap_or("unknown")
            );
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::types::Amount;
    use gateway_client::MockGateway;

    fn setup() -> (
        Arc<MemoryStore>,
        Arc<MockGateway>,
        WithdrawalProcessor<MemoryStore>,
    ) {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::new());
        let processor = WithdrawalProcessor::new(
            store.clone(),
            gateway.clone(),
            RetryConfig::default(),
            Arc::new(Metrics::new().unwrap()),
        );
        (store, gateway, processor)
    }

    fn seed_withdrawal(store: &MemoryStore, id: &str, uid: &str, amount: i64) {
        store.insert(
            "withdrawals",
            id,
            json!({
                "uid": uid,
                "amount": amount,
                "status": "pending",
                "recipientCode": "RCP_123",
                "bankName": "First Bank"
            }),
        );
    }

    #[tokio::test]
    async fn confirmed_transfer_completes_the_withdrawal() {
        let (store, gateway, processor) = setup();
        store.insert("users", "u1", json!({ "balance": 1000 }));
        seed_withdrawal(&store, "w1", "u1", 400);

        let outcome = processor.process("w1").await.unwrap();
        assert_eq!(outcome.status, WithdrawalStatus::Completed);
        assert_eq!(outcome.amount, Amount::from_minor(400));
        assert_eq!(outcome.transfer_reference.as_deref(), Some("zyp-wd-w1"));

        let user = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(user.data["balance"], 600);

        let doc = store.get("withdrawals", "w1").await.unwrap().unwrap();
        assert_eq!(doc.data["status"], "completed");
        assert!(doc.data["completedAt"].is_string());
        // fields owned by the request flow survive the merges
        assert_eq!(doc.data["bankName"], "First Bank");

        assert_eq!(gateway.transfer_initiations("zyp-wd-w1"), 1);
    }

    #[tokio::test]
    async fn insufficient_balance_leaves_everything_untouched() {
        let (store, gateway, processor) = setup();
        store.insert("users", "u1", json!({ "balance": 100 }));
        seed_withdrawal(&store, "w1", "u1", 200);

        let err = processor.process("w1").await.unwrap_err();
        match err {
            Error::InsufficientBalance { required, available } => {
                assert_eq!(required, Amount::from_minor(200));
                assert_eq!(available, Amount::from_minor(100));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let user = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(user.data["balance"], 100);
        let doc = store.get("withdrawals", "w1").await.unwrap().unwrap();
        assert_eq!(doc.data["status"], "pending");
        assert_eq!(gateway.transfer_initiations("zyp-wd-w1"), 0);
    }

    #[tokio::test]
    async fn completed_withdrawal_cannot_be_processed_again() {
        let (store, _gateway, processor) = setup();
        store.insert("users", "u1", json!({ "balance": 1000 }));
        seed_withdrawal(&store, "w1", "u1", 400);

        processor.process("w1").await.unwrap();
        let err = processor.process("w1").await.unwrap_err();
        assert!(matches!(
            err,
            Error::AlreadyProcessed {
                status: WithdrawalStatus::Completed,
                ..
            }
        ));

        let user = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(user.data["balance"], 600);
    }

    #[tokio::test]
    async fn rejected_transfer_is_compensated() {
        let (store, gateway, processor) = setup();
        store.insert("users", "u1", json!({ "balance": 1000 }));
        seed_withdrawal(&store, "w1", "u1", 400);
        gateway.reject_transfer("zyp-wd-w1", "Invalid recipient code");

        let outcome = processor.process("w1").await.unwrap();
        assert_eq!(outcome.status, WithdrawalStatus::Failed);
        assert!(outcome
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("Invalid recipient code"));

        let user = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(user.data["balance"], 1000);
        let doc = store.get("withdrawals", "w1").await.unwrap().unwrap();
        assert_eq!(doc.data["status"], "failed");
        assert!(doc.data["failureReason"].is_string());
    }

    #[tokio::test]
    async fn unreachable_gateway_leaves_processing_then_reconcile_completes() {
        let (store, gateway, processor) = setup();
        store.insert("users", "u1", json!({ "balance": 1000 }));
        seed_withdrawal(&store, "w1", "u1", 400);
        gateway.set_unreachable(true);

        let outcome = processor.process("w1").await.unwrap();
        assert_eq!(outcome.status, WithdrawalStatus::Processing);

        // debit stands while the transfer is unconfirmed
        let user = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(user.data["balance"], 600);
        assert_eq!(gateway.transfer_initiations("zyp-wd-w1"), 0);

        // gateway comes back; the transfer was never submitted, so
        // reconciliation resubmits under the same reference and completes
        gateway.set_unreachable(false);
        let outcome = processor.reconcile("w1").await.unwrap();
        assert_eq!(outcome.status, WithdrawalStatus::Completed);
        assert_eq!(gateway.transfer_initiations("zyp-wd-w1"), 1);

        let user = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(user.data["balance"], 600);
    }

    #[tokio::test]
    async fn pending_ack_waits_for_reconciliation() {
        let (store, gateway, processor) = setup();
        store.insert("users", "u1", json!({ "balance": 1000 }));
        seed_withdrawal(&store, "w1", "u1", 400);
        gateway.program_transfer("zyp-wd-w1", TransferState::Pending);

        let outcome = processor.process("w1").await.unwrap();
        assert_eq!(outcome.status, WithdrawalStatus::Processing);

        // still pending at first reconcile
        let outcome = processor.reconcile("w1").await.unwrap();
        assert_eq!(outcome.status, WithdrawalStatus::Processing);

        // the transfer eventually settles
        gateway.program_transfer("zyp-wd-w1", TransferState::Success);
        let outcome = processor.reconcile("w1").await.unwrap();
        assert_eq!(outcome.status, WithdrawalStatus::Completed);
    }

    #[tokio::test]
    async fn reversed_transfer_is_compensated_at_reconcile() {
        let (store, gateway, processor) = setup();
        store.insert("users", "u1", json!({ "balance": 1000 }));
        seed_withdrawal(&store, "w1", "u1", 400);
        gateway.program_transfer("zyp-wd-w1", TransferState::Pending);

        processor.process("w1").await.unwrap();
        let user = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(user.data["balance"], 600);

        gateway.program_transfer("zyp-wd-w1", TransferState::Reversed);
        let outcome = processor.reconcile("w1").await.unwrap();
        assert_eq!(outcome.status, WithdrawalStatus::Failed);

        let user = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(user.data["balance"], 1000);
    }

    #[tokio::test]
    async fn reconcile_guards_its_inputs() {
        let (store, _gateway, processor) = setup();
        assert!(matches!(
            processor.reconcile("ghost").await,
            Err(Error::WithdrawalNotFound(_))
        ));

        seed_withdrawal(&store, "w1", "u1", 400);
        assert!(matches!(
            processor.reconcile("w1").await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn reconcile_of_terminal_withdrawal_reports_as_is() {
        let (store, _gateway, processor) = setup();
        store.insert("users", "u1", json!({ "balance": 1000 }));
        seed_withdrawal(&store, "w1", "u1", 400);

        processor.process("w1").await.unwrap();
        let outcome = processor.reconcile("w1").await.unwrap();
        assert_eq!(outcome.status, WithdrawalStatus::Completed);

        // no second transfer, no balance movement
        let user = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(user.data["balance"], 600);
    }

    #[tokio::test]
    async fn missing_recipient_code_fails_validation_before_debit() {
        let (store, gateway, processor) = setup();
        store.insert("users", "u1", json!({ "balance": 1000 }));
        store.insert(
            "withdrawals",
            "w1",
            json!({ "uid": "u1", "amount": 400, "status": "pending" }),
        );

        let err = processor.process("w1").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let user = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(user.data["balance"], 1000);
        assert_eq!(gateway.transfer_initiations("zyp-wd-w1"), 0);
    }
}
