//! Message gateway for the inventory stock core.
//!
//! Decodes inbound envelopes from the broker queue, dispatches them to the
//! stock service or the compensation engine, and emits a correlated
//! response envelope on the reduce path. Owns the bounded-retry broker
//! connect and the manual-acknowledgment consume loop.

pub mod broker;
pub mod config;
pub mod envelope;
pub mod error;
pub mod handler;

pub use broker::{QueueConsumer, QueuePublisher, RetryPolicy, connect};
pub use config::GatewayConfig;
pub use envelope::{
    Envelope, ReduceResponse, ReduceStockItem, ReduceStockPayload, ResponseStatus,
    RollbackStockPayload,
};
pub use error::GatewayError;
pub use handler::{Disposition, MessageHandler, ResponsePublisher};
