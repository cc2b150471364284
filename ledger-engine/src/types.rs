//! Core types for the ledger engine
//!
//! Money is carried as [`Amount`], integer minor units end to end. Document
//! structs mirror the backing store's field names (camelCase) so reads and
//! writes stay byte-compatible with data owned by other parts of the backend.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Monetary amount in integer minor units (kobo, cents).
///
/// Amounts are non-negative; arithmetic that would overflow or go below zero
/// returns `None` instead of wrapping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    /// Zero minor units
    pub const ZERO: Amount = Amount(0);

    /// Wrap a raw minor-unit value.
    pub const fn from_minor(minor: i64) -> Self {
        Amount(minor)
    }

    /// Raw minor-unit value.
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// True for amounts of at least one minor unit.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checked addition; `None` on overflow.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction; `None` when the result would go below zero.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        if other.0 > self.0 {
            None
        } else {
            Some(Amount(self.0 - other.0))
        }
    }

    /// The amount as a [`Decimal`] of minor units.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }

    /// Truncate a decimal of minor units toward zero.
    ///
    /// `None` for negative values or values outside the `i64` range.
    pub fn from_decimal_floor(value: Decimal) -> Option<Amount> {
        if value.is_sign_negative() {
            return None;
        }
        value.trunc().to_i64().map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a wallet user, the document id under `users/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a raw user id.
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a task submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    /// Awaiting operator review
    #[default]
    Pending,
    /// Approved and settled
    Approved,
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionStatus::Pending => write!(f, "pending"),
            SubmissionStatus::Approved => write!(f, "approved"),
        }
    }
}

/// Lifecycle of a withdrawal request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    /// Requested, not yet debited
    #[default]
    Pending,
    /// Debited, transfer in flight
    Processing,
    /// Transfer confirmed settled
    Completed,
    /// Transfer refused or reversed; amount re-credited
    Failed,
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WithdrawalStatus::Pending => write!(f, "pending"),
            WithdrawalStatus::Processing => write!(f, "processing"),
            WithdrawalStatus::Completed => write!(f, "completed"),
            WithdrawalStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle of an investment position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    /// Accruing profit
    #[default]
    Active,
    /// No longer accruing
    Closed,
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionStatus::Active => write!(f, "active"),
            PositionStatus::Closed => write!(f, "closed"),
        }
    }
}

/// A wallet user document (`users/{uid}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    /// Contact email, used for checkout sessions
    pub email: String,
    /// Stored balance in minor units
    #[serde(default)]
    pub balance: Amount,
}

/// An audit record in `transactions/{reference}`.
///
/// The deposit reference is the document id, which is what makes the record
/// double as the idempotency claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Gateway transaction reference
    pub reference: String,
    /// Credited user
    pub uid: UserId,
    /// Credited amount in minor units
    pub amount: Amount,
    /// Record kind discriminator
    #[serde(rename = "type")]
    pub kind: String,
    /// Terminal charge state as verified with the gateway
    pub status: String,
    /// Payment channel, when the gateway reported one
    #[serde(default)]
    pub channel: Option<String>,
    /// When the engine verified and credited the deposit
    pub verified_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Audit record for a verified deposit.
    pub fn deposit(
        reference: impl Into<String>,
        uid: UserId,
        amount: Amount,
        channel: Option<String>,
        verified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            reference: reference.into(),
            uid,
            amount,
            kind: "deposit".to_string(),
            status: "success".to_string(),
            channel,
            verified_at,
        }
    }
}

/// A task submission document (`task-submissions/{id}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSubmission {
    /// Submitting user
    pub user_id: UserId,
    /// Task the submission answers
    #[serde(default)]
    pub task_id: Option<String>,
    /// Reward in minor units, credited on approval
    pub reward: Amount,
    /// Review state
    #[serde(default)]
    pub status: SubmissionStatus,
    /// Set once the reward has been credited; never unset
    #[serde(default)]
    pub paid: bool,
    /// When the reward was settled
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
}

/// A withdrawal request document (`withdrawals/{id}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    /// Requesting user
    pub uid: UserId,
    /// Requested amount in minor units
    pub amount: Amount,
    /// Request state
    #[serde(default)]
    pub status: WithdrawalStatus,
    /// Gateway recipient code for the payout destination
    #[serde(default)]
    pub recipient_code: Option<String>,
    /// When the request was created
    #[serde(default)]
    pub requested_at: Option<DateTime<Utc>>,
    /// When the debit was taken
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    /// When the transfer was confirmed settled
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Why the withdrawal failed, when it did
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Idempotent reference the transfer is submitted under
    #[serde(default)]
    pub transfer_reference: Option<String>,
}

/// An investment position document (`userinvestments/{id}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentPosition {
    /// Owning user
    pub uid: UserId,
    /// Invested principal in minor units
    pub amount: Amount,
    /// Profit rate per accrual period, e.g. `0.015`
    pub daily_rate: Decimal,
    /// Position state
    #[serde(default)]
    pub status: PositionStatus,
    /// Last period this position accrued
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
}

/// Bucketing scheme deciding when a position has already accrued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccrualPeriod {
    /// One accrual per UTC calendar day
    #[default]
    Daily,
    /// One accrual per UTC clock hour
    Hourly,
}

impl AccrualPeriod {
    /// The bucket key a timestamp falls into.
    pub fn key_for(&self, at: DateTime<Utc>) -> String {
        match self {
            AccrualPeriod::Daily => at.format("%Y-%m-%d").to_string(),
            AccrualPeriod::Hourly => at.format("%Y-%m-%dT%H").to_string(),
        }
    }

    /// Whether two timestamps fall into the same bucket.
    pub fn same_period(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.key_for(a) == self.key_for(b)
    }
}

impl std::str::FromStr for AccrualPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(AccrualPeriod::Daily),
            "hourly" => Ok(AccrualPeriod::Hourly),
            other => Err(format!("Unknown accrual period: {}", other)),
        }
    }
}

impl fmt::Display for AccrualPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccrualPeriod::Daily => write!(f, "daily"),
            AccrualPeriod::Hourly => write!(f, "hourly"),
        }
    }
}

/// Outcome of a verified deposit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositReceipt {
    /// Gateway transaction reference
    pub reference: String,
    /// Credited user
    pub uid: UserId,
    /// Credited amount in minor units
    pub amount: Amount,
    /// Balance after the credit
    pub new_balance: Amount,
    /// When the credit was committed
    pub verified_at: DateTime<Utc>,
}

/// Outcome of a settled task reward
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardReceipt {
    /// Settled submission id
    pub submission_id: String,
    /// Credited user
    pub uid: UserId,
    /// Credited reward in minor units
    pub reward: Amount,
    /// Balance after the credit
    pub new_balance: Amount,
    /// When the reward was settled
    pub approved_at: DateTime<Utc>,
}

/// Outcome of processing or reconciling a withdrawal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalOutcome {
    /// Withdrawal document id
    pub id: String,
    /// Requesting user
    pub uid: UserId,
    /// Withdrawal amount in minor units
    pub amount: Amount,
    /// Status after this call
    pub status: WithdrawalStatus,
    /// Reference the transfer was or will be submitted under
    pub transfer_reference: Option<String>,
    /// Failure reason, when the withdrawal failed
    pub failure_reason: Option<String>,
}

/// Summary of one accrual run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccrualReport {
    /// Correlation id for this run
    pub run_id: Uuid,
    /// Period bucket the run settled
    pub period_key: String,
    /// Active positions returned by the query
    pub positions_seen: usize,
    /// Positions credited this run
    pub credited: usize,
    /// Positions skipped (already settled, closed, or orphaned)
    pub skipped: usize,
    /// Total profit credited in minor units
    pub total_profit: Amount,
    /// When the run finished
    pub completed_at: DateTime<Utc>,
}
