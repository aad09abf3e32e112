use anyhow::Result;

// ============================================================================
// Configuration Constants
// ============================================================================

const DEFAULT_PORT: u16 = 8080;

// Message size limits (in bytes)
//
// The relay check is authoritative: payloads over this limit are rejected
// with a client error before any crypto or broker work happens. The HTTP
// body limit below is a coarser outer guard.
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 64 * 1024; // 64 KB
pub const MAX_REQUEST_BODY_SIZE: usize = 2 * 1024 * 1024; // 2 MB

// Broker interaction timeouts
const DEFAULT_PRODUCE_TIMEOUT_MS: u64 = 5000;
const DEFAULT_CONSUME_TIMEOUT_MS: u64 = 2000;

// Envelope freshness window for signature verification
const DEFAULT_VERIFY_MAX_AGE_SECS: i64 = 86400; // 1 day

// ============================================================================
// Configuration Structures
// ============================================================================

/// Kafka configuration for reliable message delivery
#[derive(Clone, Debug)]
pub struct KafkaConfig {
    /// Comma-separated list of Kafka brokers (e.g., "kafka1:9092,kafka2:9092")
    pub brokers: String,
    /// Kafka topic name, shared by the publish and consume paths
    pub topic: String,
    /// Consumer group ID for the consume path
    pub consumer_group: String,
    /// SSL/TLS enabled
    pub ssl_enabled: bool,
    /// SASL mechanism (e.g., "SCRAM-SHA-256", "PLAIN")
    pub sasl_mechanism: Option<String>,
    /// SASL username
    pub sasl_username: Option<String>,
    /// SASL password
    pub sasl_password: Option<String>,
    /// How long a publish waits for broker acknowledgment
    pub produce_timeout_ms: u64,
    /// How long a consume blocks waiting for a message before reporting
    /// "nothing available"
    pub consume_timeout_ms: u64,
}

/// Key material and verification policy.
///
/// All key material is load-time configuration. It is parsed once at startup
/// into a `KeyStore` and never accepted from a request.
#[derive(Clone, Debug)]
pub struct CryptoConfig {
    /// X25519 public key of the message recipient (base64, 32 bytes)
    pub recipient_public_key: String,
    /// Ed25519 signing key seed (base64, 32 bytes)
    /// Generate with: openssl rand -base64 32
    pub signing_key_seed: String,
    /// Ed25519 public key trusted for signature verification (base64, 32 bytes).
    /// Defaults to the signing key's public half when unset.
    pub trusted_public_key: Option<String>,
    /// Maximum accepted envelope age at verification time (seconds)
    pub verify_max_age_secs: i64,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Maximum accepted request payload size in bytes
    pub max_payload_size: usize,
    pub kafka: KafkaConfig,
    pub crypto: CryptoConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            port: std::env::var("RELAY_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            max_payload_size: std::env::var("RELAY_MAX_PAYLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_PAYLOAD_SIZE),
            kafka: KafkaConfig {
                brokers: std::env::var("KAFKA_BROKERS")
                    .unwrap_or_else(|_| "localhost:9092".to_string()),
                topic: std::env::var("KAFKA_TOPIC")
                    .unwrap_or_else(|_| "relay-messages".to_string()),
                consumer_group: std::env::var("KAFKA_CONSUMER_GROUP")
                    .unwrap_or_else(|_| "relay-consumers".to_string()),
                ssl_enabled: std::env::var("KAFKA_SSL_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
                sasl_mechanism: std::env::var("KAFKA_SASL_MECHANISM").ok(),
                sasl_username: std::env::var("KAFKA_SASL_USERNAME").ok(),
                sasl_password: std::env::var("KAFKA_SASL_PASSWORD").ok(),
                produce_timeout_ms: std::env::var("KAFKA_PRODUCE_TIMEOUT_MS")
                    .ok()
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(DEFAULT_PRODUCE_TIMEOUT_MS),
                consume_timeout_ms: std::env::var("KAFKA_CONSUME_TIMEOUT_MS")
                    .ok()
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(DEFAULT_CONSUME_TIMEOUT_MS),
            },
            crypto: CryptoConfig {
                recipient_public_key: std::env::var("RELAY_RECIPIENT_PUBLIC_KEY").map_err(
                    |_| {
                        anyhow::anyhow!(
                            "RELAY_RECIPIENT_PUBLIC_KEY must be set (base64-encoded 32-byte X25519 public key)"
                        )
                    },
                )?,
                signing_key_seed: std::env::var("RELAY_SIGNING_KEY_SEED").map_err(|_| {
                    anyhow::anyhow!(
                        "RELAY_SIGNING_KEY_SEED must be set (base64-encoded 32-byte Ed25519 seed)"
                    )
                })?,
                trusted_public_key: std::env::var("RELAY_TRUSTED_PUBLIC_KEY").ok(),
                verify_max_age_secs: std::env::var("RELAY_VERIFY_MAX_AGE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_VERIFY_MAX_AGE_SECS),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

    // Env mutation is process-wide, so everything lives in one test to avoid
    // racing parallel test threads.
    #[test]
    fn from_env_requires_keys_and_applies_defaults() {
        std::env::remove_var("RELAY_RECIPIENT_PUBLIC_KEY");
        std::env::remove_var("RELAY_SIGNING_KEY_SEED");
        assert!(Config::from_env().is_err());

        std::env::set_var("RELAY_RECIPIENT_PUBLIC_KEY", BASE64.encode([1u8; 32]));
        assert!(Config::from_env().is_err(), "signing key seed still missing");

        std::env::set_var("RELAY_SIGNING_KEY_SEED", BASE64.encode([2u8; 32]));
        let config = Config::from_env().expect("both keys set");

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE);
        assert_eq!(config.kafka.brokers, "localhost:9092");
        assert_eq!(config.kafka.topic, "relay-messages");
        assert_eq!(config.kafka.consumer_group, "relay-consumers");
        assert!(!config.kafka.ssl_enabled);
        assert_eq!(config.kafka.produce_timeout_ms, DEFAULT_PRODUCE_TIMEOUT_MS);
        assert_eq!(config.kafka.consume_timeout_ms, DEFAULT_CONSUME_TIMEOUT_MS);
        assert!(config.crypto.trusted_public_key.is_none());
        assert_eq!(config.crypto.verify_max_age_secs, DEFAULT_VERIFY_MAX_AGE_SECS);

        std::env::set_var("KAFKA_TOPIC", "custom-topic");
        std::env::set_var("RELAY_MAX_PAYLOAD_SIZE", "1024");
        let config = Config::from_env().expect("overrides set");
        assert_eq!(config.kafka.topic, "custom-topic");
        assert_eq!(config.max_payload_size, 1024);

        std::env::remove_var("KAFKA_TOPIC");
        std::env::remove_var("RELAY_MAX_PAYLOAD_SIZE");
        std::env::remove_var("RELAY_RECIPIENT_PUBLIC_KEY");
        std::env::remove_var("RELAY_SIGNING_KEY_SEED");
    }
}
