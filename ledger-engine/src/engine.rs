//! Engine facade wiring the four ledger operations together

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::ops::{AccrualRunner, DepositVerifier, RewardSettler, WithdrawalProcessor};
use crate::store::DocumentStore;
use crate::types::{
    AccrualReport, DepositReceipt, RewardReceipt, UserId, WithdrawalOutcome,
};
use gateway_client::PaymentGateway;
use std::sync::Arc;

/// Entry point for all ledger mutations.
///
/// Holds one instance of each operation over a shared store, gateway and
/// metrics registry. Handlers and jobs depend on this facade rather than on
/// the individual operations.
pub struct LedgerEngine<S> {
    deposits: DepositVerifier<S>,
    rewards: RewardSettler<S>,
    withdrawals: WithdrawalProcessor<S>,
    accrual: AccrualRunner<S>,
    metrics: Arc<Metrics>,
}

impl<S: DocumentStore> LedgerEngine<S> {
    /// Build an engine with a fresh metrics registry.
    pub fn new(
        store: Arc<S>,
        gateway: Arc<dyn PaymentGateway>,
        config: EngineConfig,
    ) -> Result<Self> {
        let metrics =
            Arc::new(Metrics::new().map_err(|e| Error::Internal(format!("metrics: {}", e)))?);
        Ok(Self::with_metrics(store, gateway, config, metrics))
    }

    /// Build an engine over an existing metrics registry.
    pub fn with_metrics(
        store: Arc<S>,
        gateway: Arc<dyn PaymentGateway>,
        config: EngineConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            deposits: DepositVerifier::new(
                store.clone(),
                gateway.clone(),
                config.retry.clone(),
                metrics.clone(),
            ),
            rewards: RewardSettler::new(store.clone(), config.retry.clone(), metrics.clone()),
            withdrawals: WithdrawalProcessor::new(
                store.clone(),
                gateway,
                config.retry.clone(),
                metrics.clone(),
            ),
            accrual: AccrualRunner::new(store, config.accrual, config.retry, metrics.clone()),
            metrics,
        }
    }

    /// Verify a deposit with the gateway and credit it exactly once.
    pub async fn verify_deposit(&self, reference: &str, uid: &UserId) -> Result<DepositReceipt> {
        let timer = self.metrics.op_timer("verify_deposit");
        let result = self.deposits.verify(reference, uid).await;
        timer.observe_duration();
        result
    }

    /// Approve a task submission and settle its reward exactly once.
    pub async fn approve_submission(&self, submission_id: &str) -> Result<RewardReceipt> {
        let timer = self.metrics.op_timer("approve_submission");
        let result = self.rewards.approve(submission_id).await;
        timer.observe_duration();
        result
    }

    /// Debit a pending withdrawal and initiate its transfer.
    pub async fn process_withdrawal(&self, withdrawal_id: &str) -> Result<WithdrawalOutcome> {
        let timer = self.metrics.op_timer("process_withdrawal");
        let result = self.withdrawals.process(withdrawal_id).await;
        timer.observe_duration();
        result
    }

    /// Settle an in-flight withdrawal from the gateway's view of its transfer.
    pub async fn reconcile_withdrawal(&self, withdrawal_id: &str) -> Result<WithdrawalOutcome> {
        let timer = self.metrics.op_timer("reconcile_withdrawal");
        let result = self.withdrawals.reconcile(withdrawal_id).await;
        timer.observe_duration();
        result
    }

    /// Accrue profit for every active investment position this period.
    pub async fn run_accrual(&self) -> Result<AccrualReport> {
        let timer = self.metrics.op_timer("run_accrual");
        let result = self.accrual.run().await;
        timer.observe_duration();
        result
    }

    /// Metrics registry backing this engine, for scrape endpoints.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
