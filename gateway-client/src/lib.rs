//! Payment gateway connectivity for the Zyppayx wallet backend
//!
//! Talks to the hosted payment processor (Paystack-shaped REST API):
//! - Charge verification by transaction reference
//! - Checkout session initialization
//! - Outbound transfers with caller-assigned idempotent references
//! - Transfer status lookup for reconciliation
//!
//! Amounts cross this boundary in integer minor units in both directions.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod client;
pub mod error;
pub mod mock;
pub mod types;

pub use client::{GatewayClient, GatewayConfig};
pub use error::{Error, Result};
pub use mock::MockGateway;
pub use types::{
    ChargeStatus, ChargeVerification, CheckoutSession, TransferAck, TransferRequest, TransferState,
};

use async_trait::async_trait;

/// Operations the ledger engine needs from the payment gateway.
///
/// Object-safe so the engine can hold `Arc<dyn PaymentGateway>` and tests can
/// substitute [`MockGateway`] for the real [`GatewayClient`].
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Verify a charge by its gateway reference.
    async fn verify_transaction(&self, reference: &str) -> Result<ChargeVerification>;

    /// Create a hosted checkout session for a new deposit.
    async fn initialize_transaction(&self, email: &str, amount_minor: i64)
        -> Result<CheckoutSession>;

    /// Submit an outbound transfer. The gateway dedupes by `reference`, so
    /// re-sending after an unknown outcome is safe.
    async fn initiate_transfer(&self, request: &TransferRequest) -> Result<TransferAck>;

    /// Look up the current state of a transfer by its reference.
    async fn transfer_status(&self, reference: &str) -> Result<TransferState>;
}
