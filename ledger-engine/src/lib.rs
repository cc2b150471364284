//! Zyppayx ledger mutation engine
//!
//! Owns every balance mutation in the wallet backend:
//!
//! - Deposit verification: confirm a charge with the payment gateway and
//!   credit it exactly once, keyed by the gateway reference
//! - Task reward settlement: approve a submission and pay its reward
//!   exactly once
//! - Withdrawal processing: debit-before-transfer with compensation on
//!   definitive failure and explicit reconciliation for unconfirmed
//!   transfers
//! - Investment accrual: per-period profit credits over active positions
//!
//! All mutations run inside transactional scopes over a [`DocumentStore`];
//! idempotency is enforced by claim documents and status fields validated
//! at commit, so concurrent duplicates lose the commit race instead of
//! double-crediting.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod metrics;
pub mod ops;
pub mod retry;
pub mod store;
pub mod types;

pub use config::{AccrualConfig, EngineConfig};
pub use engine::LedgerEngine;
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use retry::RetryConfig;
pub use store::memory::MemoryStore;
pub use store::{collections, doc_amount, Document, DocumentStore, StoreTxn};
pub use types::{
    AccrualPeriod, AccrualReport, Amount, DepositReceipt, InvestmentPosition, PositionStatus,
    RewardReceipt, SubmissionStatus, TaskSubmission, TransactionRecord, UserAccount, UserId,
    Withdrawal, WithdrawalOutcome, WithdrawalStatus,
};
