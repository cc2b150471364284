//! Error types for the gateway client

use thiserror::Error;

/// Gateway client result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the payment gateway client
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure reaching the gateway
    #[error("Gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with an error status or a failure envelope
    #[error("Gateway returned {status}: {message}")]
    Api {
        /// HTTP status code from the gateway
        status: u16,
        /// Upstream error message, when one was provided
        message: String,
    },

    /// The gateway answered successfully but the payload was not decodable
    #[error("Malformed gateway response: {0}")]
    Decode(String),

    /// Client-side configuration problem
    #[error("Gateway configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True when the gateway definitively rejected the request (4xx-class),
    /// as opposed to an unknown outcome such as a timeout or a 5xx.
    pub fn is_definitive_rejection(&self) -> bool {
        matches!(self, Error::Api { status, .. } if (400..500).contains(status))
    }
}
