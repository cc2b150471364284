//! Error taxonomy for ledger mutations

use crate::types::{Amount, WithdrawalStatus};
use gateway_client::ChargeStatus;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by ledger mutations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced user document does not exist
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Referenced task submission does not exist
    #[error("Task submission not found: {0}")]
    SubmissionNotFound(String),

    /// Referenced withdrawal does not exist
    #[error("Withdrawal not found: {0}")]
    WithdrawalNotFound(String),

    /// The deposit reference was already credited
    #[error("Deposit reference already credited: {0}")]
    DuplicateDeposit(String),

    /// The submission reward was already paid out
    #[error("Submission already paid: {0}")]
    AlreadyPaid(String),

    /// The withdrawal has already left the pending state
    #[error("Withdrawal {id} already processed (status {status})")]
    AlreadyProcessed {
        /// Withdrawal document id
        id: String,
        /// Status the withdrawal was found in
        status: WithdrawalStatus,
    },

    /// A debit would overdraw the balance
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Amount the debit needs
        required: Amount,
        /// Amount actually available
        available: Amount,
    },

    /// The gateway resolved the charge but it is not in a success state
    #[error("Payment {reference} not successful: charge status {status}")]
    PaymentNotSuccessful {
        /// Gateway transaction reference
        reference: String,
        /// Charge status the gateway reported
        status: ChargeStatus,
    },

    /// Failure talking to the payment gateway
    #[error("Gateway error: {0}")]
    Gateway(#[from] gateway_client::Error),

    /// A transactional read set was invalidated by a concurrent writer
    #[error("Transaction conflict: {0}")]
    TxnConflict(String),

    /// Conflict retries exhausted without a clean commit
    #[error("Store contention after {attempts} attempts: {last}")]
    Contention {
        /// Attempts made before giving up
        attempts: u32,
        /// Message from the last conflict
        last: String,
    },

    /// Store I/O failure
    #[error("Store error: {0}")]
    Store(String),

    /// Document (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Conflicts are retryable by re-running the same transaction body.
    pub fn is_contention(&self) -> bool {
        matches!(self, Error::TxnConflict(_))
    }
}
