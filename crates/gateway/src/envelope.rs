//! Wire envelopes for the stock message protocol.
//!
//! The field names match the JSON carried on the broker queues; the
//! envelope schema has no versioning.

use serde::{Deserialize, Serialize};

/// Event tag for stock reduction requests and responses.
pub const EVENT_REDUCE_STOCK: &str = "reduce_stock";

/// Event tag for rollback requests.
pub const EVENT_ROLLBACK_STOCK: &str = "rollback_stock";

/// Inbound message wrapper: event tag, opaque payload, transaction id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    pub data: serde_json::Value,
    pub transaction_id: String,
}

/// Payload of a `reduce_stock` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReduceStockPayload {
    pub products: Vec<ReduceStockItem>,
}

/// One product line of a reduction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReduceStockItem {
    pub product_id: String,
    pub quantity: i64,
}

/// Payload of a `rollback_stock` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackStockPayload {
    pub transaction_id: String,
}

/// Business outcome carried by a response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Outbound response for the reduce path, correlated by transaction id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReduceResponse {
    pub event: String,
    pub status: ResponseStatus,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub transaction_id: String,
}

impl ReduceResponse {
    /// Builds a success response for the given transaction.
    pub fn success(transaction_id: impl Into<String>) -> Self {
        Self {
            event: EVENT_REDUCE_STOCK.to_string(),
            status: ResponseStatus::Success,
            message: String::new(),
            data: None,
            transaction_id: transaction_id.into(),
        }
    }

    /// Builds an error response carrying the failure text.
    pub fn error(transaction_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event: EVENT_REDUCE_STOCK.to_string(),
            status: ResponseStatus::Error,
            message: message.into(),
            data: None,
            transaction_id: transaction_id.into(),
        }
    }

    /// Encodes the response as JSON bytes.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
