//! HTTP client for the hosted payment gateway
//!
//! The gateway speaks a Paystack-shaped REST API: bearer-token auth and a
//! `{ "status": bool, "message": string, "data": {...} }` envelope on every
//! response. Amounts cross the wire in integer minor units.

use crate::error::{Error, Result};
use crate::types::{
    ChargeStatus, ChargeVerification, CheckoutSession, TransferAck, TransferRequest, TransferState,
};
use crate::PaymentGateway;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

/// Connection settings for the payment gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway REST API
    pub base_url: String,
    /// Secret key sent as a bearer token
    pub secret_key: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Payment gateway client backed by the hosted REST API
pub struct GatewayClient {
    base_url: String,
    secret_key: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    reference: String,
    status: ChargeStatus,
    amount: i64,
    currency: Option<String>,
    channel: Option<String>,
    paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct InitializeRequest<'a> {
    email: &'a str,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
    reference: String,
}

#[derive(Debug, Serialize)]
struct TransferPayload<'a> {
    source: &'a str,
    reference: &'a str,
    amount: i64,
    recipient: &'a str,
    reason: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TransferData {
    status: TransferState,
    #[serde(default)]
    transfer_code: Option<String>,
}

impl GatewayClient {
    /// Create a client from connection settings.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        if config.secret_key.trim().is_empty() {
            return Err(Error::Config("gateway secret key is empty".to_string()));
        }
        if config.base_url.trim().is_empty() {
            return Err(Error::Config("gateway base URL is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key,
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| {
                error!("Gateway GET {} failed: {}", path, e);
                Error::Http(e)
            })?;
        Self::unwrap_envelope(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!("Gateway POST {} failed: {}", path, e);
                Error::Http(e)
            })?;
        Self::unwrap_envelope(response).await
    }

    async fn unwrap_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            // Error responses still carry the envelope with a message
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or(body);
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope = response
            .json::<Envelope<T>>()
            .await
            .map_err(|e| Error::Decode(format!("Invalid response envelope: {}", e)))?;

        if !envelope.status {
            return Err(Error::Api {
                status: status.as_u16(),
                message: envelope
                    .message
                    .unwrap_or_else(|| "Gateway reported failure".to_string()),
            });
        }

        envelope
            .data
            .ok_or_else(|| Error::Decode("Response envelope missing data".to_string()))
    }
}

#[async_trait]
impl PaymentGateway for GatewayClient {
    async fn verify_transaction(&self, reference: &str) -> Result<ChargeVerification> {
        let data: VerifyData = self
            .get_json(&format!("/transaction/verify/{}", reference))
            .await?;

        info!(
            "Verified charge {} with gateway status {}",
            data.reference, data.status
        );

        Ok(ChargeVerification {
            reference: data.reference,
            status: data.status,
            amount_minor: data.amount,
            currency: data.currency,
            channel: data.channel,
            paid_at: data.paid_at,
        })
    }

    async fn initialize_transaction(&self, email: &str, amount_minor: i64) -> Result<CheckoutSession> {
        let request = InitializeRequest {
            email,
            amount: amount_minor,
        };
        let data: InitializeData = self.post_json("/transaction/initialize", &request).await?;

        info!("Initialized checkout session {}", data.reference);

        Ok(CheckoutSession {
            authorization_url: data.authorization_url,
            access_code: data.access_code,
            reference: data.reference,
        })
    }

    async fn initiate_transfer(&self, request: &TransferRequest) -> Result<TransferAck> {
        let payload = TransferPayload {
            source: "balance",
            reference: &request.reference,
            amount: request.amount_minor,
            recipient: &request.recipient_code,
            reason: request.reason.as_deref(),
        };
        let data: TransferData = self.post_json("/transfer", &payload).await?;

        info!(
            "Initiated transfer {} with state {}",
            request.reference, data.status
        );

        Ok(TransferAck {
            reference: request.reference.clone(),
            state: data.status,
            transfer_code: data.transfer_code,
        })
    }

    async fn transfer_status(&self, reference: &str) -> Result<TransferState> {
        let data: TransferData = self
            .get_json(&format!("/transfer/verify/{}", reference))
            .await?;
        Ok(data.status)
    }
}
