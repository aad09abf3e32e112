use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::SignedEnvelope;

/// Wire form of a relayed message, serialized to JSON in Kafka.
///
/// The armored ciphertext and its detached signature travel together; the
/// signer key id lets the consume side decide whether any configured key
/// applies before attempting verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayEnvelope {
    /// Unique message ID (UUID v4), also the Kafka partition key
    pub message_id: String,
    /// Unix timestamp in seconds, set at publish time
    pub created_at: i64,
    /// Base64-armored sealed payload
    pub armored: String,
    /// Identifier of the recipient key the payload was sealed for
    pub recipient_key_id: String,
    /// Base64-encoded detached Ed25519 signature over `armored`
    pub signature: String,
    /// Identifier of the key that produced `signature`
    pub signer_key_id: String,
}

impl RelayEnvelope {
    /// Wrap a signed envelope for publication, assigning identity and time
    pub fn from_signed(envelope: SignedEnvelope) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().timestamp(),
            armored: envelope.armored,
            recipient_key_id: envelope.recipient_key_id,
            signature: envelope.signature,
            signer_key_id: envelope.signer_key_id,
        }
    }

    /// Validate envelope structure before producing or after consuming
    pub fn validate(&self) -> Result<()> {
        if self.message_id.is_empty() {
            anyhow::bail!("message_id is required");
        }
        if self.created_at <= 0 {
            anyhow::bail!("created_at is required");
        }
        if self.armored.is_empty() {
            anyhow::bail!("armored payload is required");
        }
        if self.recipient_key_id.is_empty() {
            anyhow::bail!("recipient_key_id is required");
        }
        if self.signature.is_empty() {
            anyhow::bail!("signature is required");
        }
        if self.signer_key_id.is_empty() {
            anyhow::bail!("signer_key_id is required");
        }
        Ok(())
    }
}

/// Broker acknowledgment for a published envelope
#[derive(Debug, Clone, Copy)]
pub struct DeliveryReceipt {
    pub partition: i32,
    pub offset: i64,
}

/// An envelope read back from the broker, with its position metadata
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    pub envelope: RelayEnvelope,
    pub partition: i32,
    pub offset: i64,
}
