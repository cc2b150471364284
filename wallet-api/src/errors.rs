use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use ledger_engine::Error as LedgerError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.to_string()
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Ledger(e) => match e {
                LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
                LedgerError::UserNotFound(_)
                | LedgerError::SubmissionNotFound(_)
                | LedgerError::WithdrawalNotFound(_) => StatusCode::NOT_FOUND,
                LedgerError::DuplicateDeposit(_)
                | LedgerError::AlreadyPaid(_)
                | LedgerError::AlreadyProcessed { .. } => StatusCode::CONFLICT,
                LedgerError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
                LedgerError::PaymentNotSuccessful { .. } => StatusCode::BAD_REQUEST,
                LedgerError::Gateway(g) => {
                    if g.is_definitive_rejection() {
                        StatusCode::BAD_REQUEST
                    } else {
                        StatusCode::BAD_GATEWAY
                    }
                }
                LedgerError::TxnConflict(_)
                | LedgerError::Contention { .. }
                | LedgerError::Store(_)
                | LedgerError::Serialization(_)
                | LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}
