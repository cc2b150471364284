//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `ledger_deposits_verified_total` - Deposits verified and credited
//! - `ledger_duplicate_deposits_total` - Duplicate references refused
//! - `ledger_rewards_settled_total` - Task rewards credited
//! - `ledger_withdrawals_debited_total` - Withdrawals debited for transfer
//! - `ledger_withdrawals_completed_total` - Transfers confirmed settled
//! - `ledger_withdrawals_failed_total` - Withdrawals compensated
//! - `ledger_withdrawals_unconfirmed_total` - Transfers left for reconciliation
//! - `ledger_accrual_credits_total` - Positions credited by accrual runs
//! - `ledger_txn_conflicts_total` - Transactional commits lost to races
//! - `ledger_op_duration_seconds` - Operation latency by operation

use prometheus::{
    Histogram, HistogramOpts, HistogramTimer, HistogramVec, IntCounter, Opts, Registry,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Deposits verified and credited
    pub deposits_verified: IntCounter,

    /// Duplicate deposit references refused
    pub duplicate_deposits: IntCounter,

    /// Task rewards credited
    pub rewards_settled: IntCounter,

    /// Withdrawals debited for transfer
    pub withdrawals_debited: IntCounter,

    /// Withdrawal transfers confirmed settled
    pub withdrawals_completed: IntCounter,

    /// Withdrawals compensated after a refused transfer
    pub withdrawals_failed: IntCounter,

    /// Withdrawal transfers left in processing for reconciliation
    pub withdrawals_unconfirmed: IntCounter,

    /// Positions credited by accrual runs
    pub accrual_credits: IntCounter,

    /// Transactional commits lost to concurrent writers
    pub txn_conflicts: IntCounter,

    /// Operation latency, labeled by operation
    pub op_duration: HistogramVec,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create a metrics collector with its own registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let deposits_verified = IntCounter::with_opts(Opts::new(
            "ledger_deposits_verified_total",
            "Deposits verified and credited",
        ))?;
        registry.register(Box::new(deposits_verified.clone()))?;

        let duplicate_deposits = IntCounter::with_opts(Opts::new(
            "ledger_duplicate_deposits_total",
            "Duplicate deposit references refused",
        ))?;
        registry.register(Box::new(duplicate_deposits.clone()))?;

        let rewards_settled = IntCounter::with_opts(Opts::new(
            "ledger_rewards_settled_total",
            "Task rewards credited",
        ))?;
        registry.register(Box::new(rewards_settled.clone()))?;

        let withdrawals_debited = IntCounter::with_opts(Opts::new(
            "ledger_withdrawals_debited_total",
            "Withdrawals debited for transfer",
        ))?;
        registry.register(Box::new(withdrawals_debited.clone()))?;

        let withdrawals_completed = IntCounter::with_opts(Opts::new(
            "ledger_withdrawals_completed_total",
            "Withdrawal transfers confirmed settled",
        ))?;
        registry.register(Box::new(withdrawals_completed.clone()))?;

        let withdrawals_failed = IntCounter::with_opts(Opts::new(
            "ledger_withdrawals_failed_total",
            "Withdrawals compensated after a refused transfer",
        ))?;
        registry.register(Box::new(withdrawals_failed.clone()))?;

        let withdrawals_unconfirmed = IntCounter::with_opts(Opts::new(
            "ledger_withdrawals_unconfirmed_total",
            "Withdrawal transfers left in processing for reconciliation",
        ))?;
        registry.register(Box::new(withdrawals_unconfirmed.clone()))?;

        let accrual_credits = IntCounter::with_opts(Opts::new(
            "ledger_accrual_credits_total",
            "Positions credited by accrual runs",
        ))?;
        registry.register(Box::new(accrual_credits.clone()))?;

        let txn_conflicts = IntCounter::with_opts(Opts::new(
            "ledger_txn_conflicts_total",
            "Transactional commits lost to concurrent writers",
        ))?;
        registry.register(Box::new(txn_conflicts.clone()))?;

        let op_duration = HistogramVec::new(
            HistogramOpts::new("ledger_op_duration_seconds", "Operation latency in seconds")
                .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5]),
            &["operation"],
        )?;
        registry.register(Box::new(op_duration.clone()))?;

        Ok(Self {
            deposits_verified,
            duplicate_deposits,
            rewards_settled,
            withdrawals_debited,
            withdrawals_completed,
            withdrawals_failed,
            withdrawals_unconfirmed,
            accrual_credits,
            txn_conflicts,
            op_duration,
            registry,
        })
    }

    /// Start a latency timer for an operation.
    pub fn op_timer(&self, operation: &str) -> HistogramTimer {
        self.op_histogram(operation).start_timer()
    }

    fn op_histogram(&self, operation: &str) -> Histogram {
        self.op_duration.with_label_values(&[operation])
    }

    /// Record a credited deposit.
    pub fn record_deposit(&self) {
        self.deposits_verified.inc();
    }

    /// Record a refused duplicate reference.
    pub fn record_duplicate_deposit(&self) {
        self.duplicate_deposits.inc();
    }

    /// Record a settled reward.
    pub fn record_reward(&self) {
        self.rewards_settled.inc();
    }

    /// Record a withdrawal debit.
    pub fn record_withdrawal_debit(&self) {
        self.withdrawals_debited.inc();
    }

    /// Record a confirmed withdrawal.
    pub fn record_withdrawal_completed(&self) {
        self.withdrawals_completed.inc();
    }

    /// Record a compensated withdrawal.
    pub fn record_withdrawal_failed(&self) {
        self.withdrawals_failed.inc();
    }

    /// Record a transfer left unconfirmed.
    pub fn record_withdrawal_unconfirmed(&self) {
        self.withdrawals_unconfirmed.inc();
    }

    /// Record positions credited by an accrual run.
    pub fn record_accrual(&self, credited: usize) {
        self.accrual_credits.inc_by(credited as u64);
    }

    /// Record a commit lost to a concurrent writer.
    pub fn record_txn_conflict(&self) {
        self.txn_conflicts.inc();
    }

    /// Get the metrics registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
