//! Gateway error types.

use thiserror::Error;

/// Errors that can occur on the broker link.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Broker connection could not be established within the retry budget.
    #[error("Broker connection failed after {attempts} attempts: {source}")]
    Connection {
        attempts: u32,
        #[source]
        source: lapin::Error,
    },

    /// Broker channel or queue operation failed.
    #[error("Broker error: {0}")]
    Broker(#[from] lapin::Error),

    /// Outbound envelope could not be published.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Envelope encoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
