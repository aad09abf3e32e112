// Relay orchestration.
//
// Publish path per request: Received -> Encrypting -> Publishing -> Acked,
// or -> Failed(reason) at any transition. Stage errors are returned with
// their original kind intact so an operator can tell which stage failed.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::broker::{RelayConsumer, RelayEnvelope, RelayProducer};
use crate::config::Config;
use crate::crypto::{CryptoGateway, KeyStore, VerificationResult};
use crate::error::{RelayError, RelayResult};
use crate::metrics;

/// Upper bound on the metadata request behind a health check.
const BROKER_CHECK_TIMEOUT_MS: u64 = 2_000;

/// Outcome of a successful publish: the broker-assigned position of the
/// durable message
#[derive(Debug, Clone)]
pub struct PublishResult {
    pub message_id: String,
    pub partition: i32,
    pub offset: i64,
}

/// A consumed envelope, tagged with its verification outcome.
///
/// The payload is the armored ciphertext: the relay seals toward an external
/// recipient and holds no decryption key. Content that failed verification is
/// still returned, tagged, and callers decide policy (reject, quarantine, log).
#[derive(Debug, Clone)]
pub struct ConsumeResult {
    pub message_id: String,
    pub payload: String,
    pub verification: VerificationResult,
    pub partition: i32,
    pub offset: i64,
}

/// Orchestrates encrypt-sign-publish and fetch-verify over the shared broker
/// connection.
pub struct RelayService {
    crypto: CryptoGateway,
    producer: RelayProducer,
    // The consumer is serialized so fetch + commit happen as one step per
    // request; concurrent publishes go through the producer untouched.
    consumer: Mutex<RelayConsumer>,
    consume_timeout: Duration,
    max_payload_size: usize,
}

impl RelayService {
    pub fn new(config: &Config, keys: Arc<KeyStore>) -> anyhow::Result<Self> {
        let crypto = CryptoGateway::new(keys, config.crypto.verify_max_age_secs);
        let producer = RelayProducer::new(&config.kafka)?;
        let consumer = RelayConsumer::new(&config.kafka)?;

        Ok(Self {
            crypto,
            producer,
            consumer: Mutex::new(consumer),
            consume_timeout: Duration::from_millis(config.kafka.consume_timeout_ms),
            max_payload_size: config.max_payload_size,
        })
    }

    /// Encrypt, sign, and publish a payload, returning only after broker
    /// acknowledgment.
    ///
    /// Size limits are enforced up front, before any crypto or broker work.
    pub async fn publish(&self, payload: &[u8]) -> RelayResult<PublishResult> {
        if payload.is_empty() {
            return Err(RelayError::input("request body is empty"));
        }
        if payload.len() > self.max_payload_size {
            return Err(RelayError::input(format!(
                "payload of {} bytes exceeds maximum of {} bytes",
                payload.len(),
                self.max_payload_size
            )));
        }

        debug!(size = payload.len(), "Encrypting payload");
        let encrypted = self.crypto.encrypt(payload)?;
        let signed = self.crypto.sign(encrypted)?;

        let envelope = RelayEnvelope::from_signed(signed);
        let message_id = envelope.message_id.clone();

        debug!(message_id = %message_id, "Publishing envelope");
        let receipt = self.producer.publish(&envelope).await?;

        info!(
            message_id = %message_id,
            partition = receipt.partition,
            offset = receipt.offset,
            "Message relayed"
        );

        Ok(PublishResult {
            message_id,
            partition: receipt.partition,
            offset: receipt.offset,
        })
    }

    /// Fetch the next envelope and verify it before exposing it.
    ///
    /// Returns `Ok(None)` when the topic has nothing available within the
    /// consume timeout. Verification failures never drop content silently:
    /// the result is tagged and logged, and the offset is committed either
    /// way so the same envelope is not re-served.
    pub async fn consume(&self) -> RelayResult<Option<ConsumeResult>> {
        let consumer = self.consumer.lock().await;

        let Some(message) = consumer.next(self.consume_timeout).await? else {
            return Ok(None);
        };

        let envelope = &message.envelope;
        let verification = self.crypto.verify(
            &envelope.armored,
            &envelope.signature,
            &envelope.signer_key_id,
            envelope.created_at,
            chrono::Utc::now().timestamp(),
        );

        match verification {
            VerificationResult::Verified => {
                metrics::VERIFY_VERIFIED.inc();
                debug!(
                    message_id = %envelope.message_id,
                    offset = message.offset,
                    "Envelope verified"
                );
            }
            VerificationResult::Tampered | VerificationResult::KeyUnavailable => {
                metrics::VERIFY_REJECTED.inc();
                warn!(
                    message_id = %envelope.message_id,
                    offset = message.offset,
                    verification = ?verification,
                    signer_key_id = %envelope.signer_key_id,
                    "Envelope failed verification; returning tagged"
                );
            }
        }

        consumer.commit()?;
        drop(consumer);

        Ok(Some(ConsumeResult {
            message_id: message.envelope.message_id,
            payload: message.envelope.armored,
            verification,
            partition: message.partition,
            offset: message.offset,
        }))
    }

    /// Check that the shared broker client can reach the cluster.
    ///
    /// Backs the health endpoint: a bounded metadata request through the
    /// producer connection, not a new connection per check.
    pub async fn check_broker(&self) -> RelayResult<()> {
        self.producer
            .check_connection(Duration::from_millis(BROKER_CHECK_TIMEOUT_MS))
            .await
    }

    /// Flush in-flight messages before process exit
    pub fn shutdown(&self) -> anyhow::Result<()> {
        self.producer.flush(Duration::from_secs(10))
    }
}
