//! Programmable in-memory gateway for tests and local runs

use crate::error::{Error, Result};
use crate::types::{
    ChargeStatus, ChargeVerification, CheckoutSession, TransferAck, TransferRequest, TransferState,
};
use crate::PaymentGateway;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::info;

/// In-memory gateway whose responses are programmed per reference.
///
/// Unprogrammed charge references verify as unknown (404) and unprogrammed
/// transfers settle immediately, so happy-path tests need no setup beyond
/// the charge itself.
pub struct MockGateway {
    charges: DashMap<String, ChargeVerification>,
    transfer_states: DashMap<String, TransferState>,
    transfer_rejections: DashMap<String, String>,
    initiated: DashMap<String, TransferState>,
    initiations: DashMap<String, u64>,
    unreachable: AtomicBool,
    session_seq: AtomicU64,
}

impl MockGateway {
    /// Create an empty mock gateway.
    pub fn new() -> Self {
        Self {
            charges: DashMap::new(),
            transfer_states: DashMap::new(),
            transfer_rejections: DashMap::new(),
            initiated: DashMap::new(),
            initiations: DashMap::new(),
            unreachable: AtomicBool::new(false),
            session_seq: AtomicU64::new(0),
        }
    }

    /// Program the verification outcome for a charge reference.
    pub fn program_charge(&self, reference: &str, status: ChargeStatus, amount_minor: i64) {
        self.charges.insert(
            reference.to_string(),
            ChargeVerification {
                reference: reference.to_string(),
                status,
                amount_minor,
                currency: Some("NGN".to_string()),
                channel: Some("card".to_string()),
                paid_at: Some(Utc::now()),
            },
        );
    }

    /// Program the state reported for a transfer reference.
    pub fn program_transfer(&self, reference: &str, state: TransferState) {
        self.transfer_states.insert(reference.to_string(), state);
    }

    /// Program a definitive 400 rejection for a transfer reference.
    pub fn reject_transfer(&self, reference: &str, message: &str) {
        self.transfer_rejections
            .insert(reference.to_string(), message.to_string());
    }

    /// Toggle simulated unreachability; all calls fail with a 503.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// How many times a transfer was submitted under this reference.
    pub fn transfer_initiations(&self, reference: &str) -> u64 {
        self.initiations.get(reference).map(|n| *n).unwrap_or(0)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 503,
                message: "Gateway unreachable".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn verify_transaction(&self, reference: &str) -> Result<ChargeVerification> {
        self.check_reachable()?;
        match self.charges.get(reference) {
            Some(charge) => Ok(charge.clone()),
            None => Err(Error::Api {
                status: 404,
                message: format!("Transaction reference not found: {}", reference),
            }),
        }
    }

    async fn initialize_transaction(&self, email: &str, amount_minor: i64) -> Result<CheckoutSession> {
        self.check_reachable()?;
        let seq = self.session_seq.fetch_add(1, Ordering::SeqCst);
        let reference = format!("mock-session-{}", seq);
        info!(
            "Mock gateway: checkout session {} for {} ({} minor units)",
            reference, email, amount_minor
        );
        Ok(CheckoutSession {
            authorization_url: format!("https://checkout.mock/{}", reference),
            access_code: format!("AC_{}", seq),
            reference,
        })
    }

    async fn initiate_transfer(&self, request: &TransferRequest) -> Result<TransferAck> {
        self.check_reachable()?;

        *self
            .initiations
            .entry(request.reference.clone())
            .or_insert(0) += 1;

        if let Some(message) = self.transfer_rejections.get(&request.reference) {
            return Err(Error::Api {
                status: 400,
                message: message.clone(),
            });
        }

        let state = self
            .transfer_states
            .get(&request.reference)
            .map(|s| *s)
            .unwrap_or(TransferState::Success);
        self.initiated.insert(request.reference.clone(), state);

        info!(
            "Mock gateway: transfer {} for {} minor units -> {}",
            request.reference, request.amount_minor, state
        );

        Ok(TransferAck {
            reference: request.reference.clone(),
            state,
            transfer_code: Some(format!("TRF_{}", request.reference)),
        })
    }

    async fn transfer_status(&self, reference: &str) -> Result<TransferState> {
        self.check_reachable()?;
        if let Some(state) = self.transfer_states.get(reference) {
            return Ok(*state);
        }
        if let Some(state) = self.initiated.get(reference) {
            return Ok(*state);
        }
        Err(Error::Api {
            status: 404,
            message: format!("Transfer not found: {}", reference),
        })
    }
}
