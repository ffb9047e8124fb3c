//! Broker link: bounded-retry connect, durable queue publisher and consumer.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use store::{LedgerStore, ProductStore};

use crate::error::GatewayError;
use crate::handler::{Disposition, MessageHandler, ResponsePublisher};

/// Bounded retry policy for establishing the broker connection.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total connection attempts before giving up.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

/// Connects to the broker, retrying per the given policy.
///
/// Exhausting the retry budget is the only fatal failure of the gateway;
/// the caller is expected to terminate the process.
pub async fn connect(url: &str, policy: &RetryPolicy) -> Result<Connection, GatewayError> {
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        match Connection::connect(url, ConnectionProperties::default()).await {
            Ok(connection) => {
                tracing::info!(url, attempt, "connected to broker");
                return Ok(connection);
            }
            Err(e) => {
                tracing::warn!(
                    url,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "broker connect failed, retrying"
                );
                last_error = Some(e);
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    Err(GatewayError::Connection {
        attempts: policy.max_attempts,
        source: last_error.unwrap_or(lapin::Error::InvalidConnectionState(
            lapin::ConnectionState::Closed,
        )),
    })
}

async fn open_queue(connection: &Connection, queue: &str) -> Result<Channel, GatewayError> {
    let channel = connection.create_channel().await?;
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;
    Ok(channel)
}

/// Publishes response envelopes to a durable queue on the default exchange.
pub struct QueuePublisher {
    channel: Channel,
    queue: String,
}

impl QueuePublisher {
    /// Opens a channel and declares the outbound queue.
    pub async fn new(connection: &Connection, queue: &str) -> Result<Self, GatewayError> {
        let channel = open_queue(connection, queue).await?;
        Ok(Self {
            channel,
            queue: queue.to_string(),
        })
    }
}

#[async_trait]
impl ResponsePublisher for QueuePublisher {
    async fn publish(&self, body: Vec<u8>) -> Result<(), GatewayError> {
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_timestamp(chrono::Utc::now().timestamp() as u64);

        let confirm = self
            .channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await?;
        confirm.await?;

        tracing::debug!(queue = %self.queue, bytes = body.len(), "published response");
        Ok(())
    }
}

/// Consumes the inbound queue one delivery at a time with manual acks.
pub struct QueueConsumer {
    channel: Channel,
    queue: String,
}

impl QueueConsumer {
    /// Opens a channel and declares the inbound queue.
    pub async fn new(connection: &Connection, queue: &str) -> Result<Self, GatewayError> {
        let channel = open_queue(connection, queue).await?;
        Ok(Self {
            channel,
            queue: queue.to_string(),
        })
    }

    /// Runs the delivery loop until the stream ends or the channel fails.
    ///
    /// Each delivery is fully handled, including all downstream store
    /// calls, before the next one is taken; this gives per-queue FIFO
    /// processing but no isolation against mutations from other callers.
    pub async fn run<P, L>(&self, handler: &MessageHandler<P, L>) -> Result<(), GatewayError>
    where
        P: ProductStore,
        L: LedgerStore,
    {
        let mut consumer = self
            .channel
            .basic_consume(
                &self.queue,
                "stock-gateway",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        tracing::info!(queue = %self.queue, "consuming inbound queue");

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery?;
            match handler.handle(&delivery.data).await {
                Disposition::Ack => {
                    if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                        tracing::error!(error = %e, "failed to ack delivery");
                    }
                }
                Disposition::Reject => {
                    let options = BasicNackOptions {
                        requeue: false,
                        ..Default::default()
                    };
                    if let Err(e) = delivery.nack(options).await {
                        tracing::error!(error = %e, "failed to nack delivery");
                    }
                }
            }
        }

        tracing::info!(queue = %self.queue, "consumer stream ended");
        Ok(())
    }
}
