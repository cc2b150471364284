use crate::errors::ApiError;
use crate::models::{ApproveTaskRequest, VerifyDepositRequest, WithdrawalRequest};
use actix_web::{web, HttpResponse};
use ledger_engine::{LedgerEngine, MemoryStore, UserId};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

/// Engine the HTTP surface is wired over
pub type AppEngine = LedgerEngine<MemoryStore>;

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "wallet-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Verify a deposit with the gateway and credit it once
pub async fn verify_deposit(
    engine: web::Data<Arc<AppEngine>>,
    request: web::Json<VerifyDepositRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let receipt = engine
        .verify_deposit(&request.reference, &UserId::new(request.uid))
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "deposit": receipt })))
}

/// Approve a task submission and settle its reward
pub async fn approve_task(
    engine: web::Data<Arc<AppEngine>>,
    request: web::Json<ApproveTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let receipt = engine.approve_submission(&request.submission_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "reward": receipt })))
}

/// Debit a pending withdrawal and initiate its transfer
pub async fn process_withdrawal(
    engine: web::Data<Arc<AppEngine>>,
    request: web::Json<WithdrawalRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let outcome = engine.process_withdrawal(&request.withdrawal_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "withdrawal": outcome })))
}

/// Settle an in-flight withdrawal from the gateway's view of its transfer
pub async fn reconcile_withdrawal(
    engine: web::Data<Arc<AppEngine>>,
    request: web::Json<WithdrawalRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let outcome = engine.reconcile_withdrawal(&request.withdrawal_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "withdrawal": outcome })))
}

/// Run profit accrual over all active investment positions
pub async fn run_investments(
    engine: web::Data<Arc<AppEngine>>,
) -> Result<HttpResponse, ApiError> {
    let report = engine.run_accrual().await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "report": report })))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint(engine: web::Data<Arc<AppEngine>>) -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = engine.metrics().registry().gather();
    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(buffer),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": "Failed to gather metrics",
            "details": e.to_string()
        })),
    }
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    // keep extractor failures on the same wire shape as operation errors
    let json_config = web::JsonConfig::default()
        .error_handler(|err, _req| ApiError::Validation(err.to_string()).into());

    cfg.app_data(json_config)
        .route("/verify-deposit", web::post().to(verify_deposit))
        .route("/approve-task", web::post().to(approve_task))
        .route("/process-withdrawal", web::post().to(process_withdrawal))
        .route("/reconcile-withdrawal", web::post().to(reconcile_withdrawal))
        .route("/run-investments", web::post().to(run_investments))
        .route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(metrics_endpoint));
}
