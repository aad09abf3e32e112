use anyhow::{Context, Result};
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::config::create_client_config;
use super::types::{DeliveryReceipt, RelayEnvelope};
use crate::config::KafkaConfig;
use crate::error::RelayError;
use crate::metrics;

/// Kafka producer for the relay's publish path.
///
/// Created once at startup and shared for the process lifetime; the
/// connection is never opened per request. Configured for:
/// - At-least-once delivery (`acks=all`)
/// - Idempotent writes (no duplicates within a producer session)
/// - Compression (zstd, since payloads are already-encrypted bytes)
pub struct RelayProducer {
    producer: Arc<FutureProducer>,
    topic: String,
    produce_timeout: Duration,
}

impl RelayProducer {
    /// Create the producer from the application configuration.
    ///
    /// # Configuration
    /// - `acks=all`: wait for all in-sync replicas to acknowledge.
    /// - `enable.idempotence=true`: prevent duplicate writes within a session.
    /// - `linger.ms=10`: small batching window for low latency.
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        info!("Initializing Kafka producer...");
        let mut client_config = create_client_config(config)?;

        let producer: FutureProducer = client_config
            // Reliability settings
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("max.in.flight.requests.per.connection", "5")
            // Performance settings
            .set("compression.type", "zstd")
            .set("linger.ms", "10")
            .set("batch.size", "16384")
            // Timeout settings. The delivery timeout bounds how long a
            // publish can wait for acknowledgment; it must stay above
            // linger.ms or librdkafka rejects the configuration.
            .set("request.timeout.ms", "30000")
            .set("delivery.timeout.ms", &config.produce_timeout_ms.to_string())
            .create()
            .context("Failed to create Kafka producer")?;

        info!(topic = %config.topic, "Kafka producer initialized");

        Ok(Self {
            producer: Arc::new(producer),
            topic: config.topic.clone(),
            produce_timeout: Duration::from_millis(config.produce_timeout_ms),
        })
    }

    /// Publish an envelope and wait for broker acknowledgment.
    ///
    /// Resolves only when the broker has durably accepted the record (or the
    /// wait timed out). Timeouts where the record may already be persisted
    /// come back as `DeliveryError { ambiguous: true }`: the caller decides
    /// whether to retry, because retrying here would mask duplicate delivery.
    pub async fn publish(&self, envelope: &RelayEnvelope) -> Result<DeliveryReceipt, RelayError> {
        envelope
            .validate()
            .map_err(|e| RelayError::input(e.to_string()))?;

        let payload = serde_json::to_vec(envelope)?;

        let record = FutureRecord::to(&self.topic)
            .key(envelope.message_id.as_bytes())
            .payload(&payload);

        let start = std::time::Instant::now();

        match self
            .producer
            .send(record, Timeout::After(self.produce_timeout))
            .await
        {
            Ok((partition, offset)) => {
                let latency = start.elapsed();

                metrics::PUBLISH_SUCCESS.inc();
                metrics::PUBLISH_LATENCY.observe(latency.as_secs_f64());

                info!(
                    partition = partition,
                    offset = offset,
                    message_id = %envelope.message_id,
                    latency_ms = latency.as_millis(),
                    "Envelope acknowledged by broker"
                );

                Ok(DeliveryReceipt { partition, offset })
            }
            Err((kafka_err, _)) => {
                metrics::PUBLISH_FAILURE.inc();

                let ambiguous = is_ambiguous(&kafka_err);
                error!(
                    error = %kafka_err,
                    message_id = %envelope.message_id,
                    topic = %self.topic,
                    ambiguous = ambiguous,
                    latency_ms = start.elapsed().as_millis(),
                    "Failed to publish envelope"
                );

                Err(RelayError::Delivery {
                    message: format!("kafka send failed: {}", kafka_err),
                    ambiguous,
                })
            }
        }
    }

    /// Flush pending messages (for graceful shutdown).
    ///
    /// Waits for all in-flight messages to be acknowledged.
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        info!("Flushing Kafka producer (timeout: {:?})", timeout);

        self.producer
            .flush(Timeout::After(timeout))
            .context("Failed to flush Kafka producer")?;

        info!("Kafka producer flushed");
        Ok(())
    }

    /// Check broker reachability with a bounded metadata request.
    ///
    /// `fetch_metadata` blocks, so it runs off the async runtime.
    pub async fn check_connection(&self, timeout: Duration) -> Result<(), RelayError> {
        let producer = Arc::clone(&self.producer);
        let topic = self.topic.clone();

        tokio::task::spawn_blocking(move || {
            producer.client().fetch_metadata(Some(&topic), timeout)
        })
        .await
        .map_err(|e| RelayError::internal(format!("metadata task failed: {}", e)))?
        .map_err(RelayError::from)?;

        Ok(())
    }
}

/// Whether a produce failure leaves the delivery outcome unknown.
///
/// After these timeouts the broker may have persisted the record even though
/// no acknowledgment arrived, so a retry can create a duplicate.
fn is_ambiguous(err: &KafkaError) -> bool {
    matches!(
        err.rdkafka_error_code(),
        Some(
            RDKafkaErrorCode::MessageTimedOut
                | RDKafkaErrorCode::RequestTimedOut
                | RDKafkaErrorCode::OperationTimedOut
        )
    )
}
