//! Wire-facing types shared by the real client and the mock

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a card charge as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    /// Charge completed and funds captured
    Success,
    /// Charge attempted and declined
    Failed,
    /// Customer abandoned the checkout
    Abandoned,
    /// Charge still in flight
    Pending,
    /// Any state this client does not model
    #[serde(other)]
    Unknown,
}

impl ChargeStatus {
    /// Only `Success` may credit a balance
    pub fn is_success(&self) -> bool {
        matches!(self, ChargeStatus::Success)
    }
}

impl fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChargeStatus::Success => write!(f, "success"),
            ChargeStatus::Failed => write!(f, "failed"),
            ChargeStatus::Abandoned => write!(f, "abandoned"),
            ChargeStatus::Pending => write!(f, "pending"),
            ChargeStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of verifying a charge by its reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeVerification {
    /// Gateway transaction reference
    pub reference: String,
    /// Charge state
    pub status: ChargeStatus,
    /// Amount in integer minor units as reported by the gateway
    pub amount_minor: i64,
    /// ISO currency code, when reported
    pub currency: Option<String>,
    /// Payment channel (card, bank transfer, ussd, ...)
    pub channel: Option<String>,
    /// When the charge was captured
    pub paid_at: Option<DateTime<Utc>>,
}

/// Checkout session created for a new deposit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Hosted checkout page the customer is sent to
    pub authorization_url: String,
    /// One-time access code for the session
    pub access_code: String,
    /// Transaction reference assigned by the gateway
    pub reference: String,
}

/// Outbound transfer request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Caller-assigned idempotent reference; the gateway dedupes by it
    pub reference: String,
    /// Amount in integer minor units
    pub amount_minor: i64,
    /// Gateway recipient code for the payout destination
    pub recipient_code: String,
    /// Optional narration shown on the recipient's statement
    pub reason: Option<String>,
}

/// States a transfer moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    /// Accepted, not yet settled
    Pending,
    /// Settled to the recipient
    Success,
    /// Rejected or bounced
    Failed,
    /// Settled then returned by the receiving bank
    Reversed,
    /// Any state this client does not model
    #[serde(other)]
    Unknown,
}

impl TransferState {
    /// Terminal states require no further reconciliation
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Success | TransferState::Failed | TransferState::Reversed
        )
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferState::Pending => write!(f, "pending"),
            TransferState::Success => write!(f, "success"),
            TransferState::Failed => write!(f, "failed"),
            TransferState::Reversed => write!(f, "reversed"),
            TransferState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Acknowledgment returned when a transfer is initiated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferAck {
    /// The idempotent reference the transfer was submitted under
    pub reference: String,
    /// State reported at initiation time
    pub state: TransferState,
    /// Gateway-assigned transfer code, when one was issued
    pub transfer_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_status_parses_from_wire_strings() {
        let status: ChargeStatus = serde_json::from_str("\"success\"").unwrap();
        assert!(status.is_success());

        let status: ChargeStatus = serde_json::from_str("\"abandoned\"").unwrap();
        assert_eq!(status, ChargeStatus::Abandoned);

        // States we do not model fall through to Unknown instead of failing
        let status: ChargeStatus = serde_json::from_str("\"ongoing\"").unwrap();
        assert_eq!(status, ChargeStatus::Unknown);
        assert!(!status.is_success());
    }

    #[test]
    fn transfer_state_terminality() {
        assert!(TransferState::Success.is_terminal());
        assert!(TransferState::Failed.is_terminal());
        assert!(TransferState::Reversed.is_terminal());
        assert!(!TransferState::Pending.is_terminal());
        assert!(!TransferState::Unknown.is_terminal());
    }

    #[test]
    fn transfer_state_parses_unmodeled_states() {
        let state: TransferState = serde_json::from_str("\"otp\"").unwrap();
        assert_eq!(state, TransferState::Unknown);
    }
}
