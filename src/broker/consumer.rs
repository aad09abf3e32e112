use anyhow::{Context, Result};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::Message;
use std::time::Duration;
use tracing::{error, info};

use super::config::create_client_config;
use super::types::{BrokerMessage, RelayEnvelope};
use crate::config::KafkaConfig;
use crate::error::RelayError;
use crate::metrics;

/// Kafka consumer for the relay's consume path.
///
/// Subscribed once at startup and shared for the process lifetime.
/// Configured for:
/// - Manual offset commits (after the message has been handed over)
/// - Consumer group coordination
pub struct RelayConsumer {
    consumer: StreamConsumer,
    topic: String,
}

impl RelayConsumer {
    /// Create the consumer and subscribe to the shared relay topic.
    ///
    /// # Configuration
    /// - `enable.auto.commit=false`: manual offset management
    /// - `auto.offset.reset=earliest`: read from the beginning on first start
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        info!(
            brokers = %config.brokers,
            topic = %config.topic,
            consumer_group = %config.consumer_group,
            "Initializing Kafka consumer"
        );

        let consumer: StreamConsumer = create_client_config(config)?
            .set("group.id", &config.consumer_group)
            // Offset management
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            // Performance
            .set("fetch.min.bytes", "1")
            .set("fetch.wait.max.ms", "500")
            // Session management
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "3000")
            .create()
            .context("Failed to create Kafka consumer")?;

        consumer
            .subscribe(&[&config.topic])
            .context("Failed to subscribe to Kafka topic")?;

        info!("Kafka consumer initialized");

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
        })
    }

    /// Wait up to `block_timeout` for the next message.
    ///
    /// Returns `Ok(None)` when the topic has nothing available within the
    /// timeout, which is a normal outcome, not an error. Broker-side failures
    /// and undecodable records surface as `DeliveryError`.
    pub async fn next(&self, block_timeout: Duration) -> Result<Option<BrokerMessage>, RelayError> {
        let message = match tokio::time::timeout(block_timeout, self.consumer.recv()).await {
            Err(_) => return Ok(None), // nothing available within the window
            Ok(Err(e)) => {
                metrics::CONSUME_FAILURE.inc();
                error!(error = %e, topic = %self.topic, "Kafka consumer error");
                return Err(RelayError::from(e));
            }
            Ok(Ok(message)) => message,
        };

        let payload = message.payload().ok_or_else(|| {
            metrics::CONSUME_FAILURE.inc();
            RelayError::delivery(format!(
                "empty kafka record at offset {} in topic '{}'",
                message.offset(),
                self.topic
            ))
        })?;

        let envelope: RelayEnvelope = serde_json::from_slice(payload).map_err(|e| {
            metrics::CONSUME_FAILURE.inc();
            RelayError::delivery(format!(
                "undecodable envelope at offset {}: {}",
                message.offset(),
                e
            ))
        })?;

        envelope.validate().map_err(|e| {
            metrics::CONSUME_FAILURE.inc();
            RelayError::delivery(format!(
                "incomplete envelope at offset {}: {}",
                message.offset(),
                e
            ))
        })?;

        metrics::CONSUME_SUCCESS.inc();

        Ok(Some(BrokerMessage {
            envelope,
            partition: message.partition(),
            offset: message.offset(),
        }))
    }

    /// Commit the current offset (after the message has been handed over).
    ///
    /// If the process crashes before committing, the broker redelivers.
    pub fn commit(&self) -> Result<(), RelayError> {
        self.consumer
            .commit_consumer_state(CommitMode::Sync)
            .map_err(RelayError::from)
    }
}
