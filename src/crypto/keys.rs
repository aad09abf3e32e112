use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use x25519_dalek::PublicKey as X25519PublicKey;

use crate::config::CryptoConfig;

/// Process-wide immutable key material.
///
/// Loaded once at startup from configuration and injected into the
/// `CryptoGateway`. Keys are never compiled in and never accepted from a
/// request: verification always runs against the key configured here, not
/// against anything carried in a message.
pub struct KeyStore {
    recipient_key: X25519PublicKey,
    recipient_key_id: String,
    signing_key: SigningKey,
    signer_key_id: String,
    trusted_key: VerifyingKey,
    trusted_key_id: String,
}

impl KeyStore {
    pub fn from_config(config: &CryptoConfig) -> Result<Self> {
        let recipient_bytes = decode_key32("RELAY_RECIPIENT_PUBLIC_KEY", &config.recipient_public_key)?;
        let recipient_key = X25519PublicKey::from(recipient_bytes);

        let seed = decode_key32("RELAY_SIGNING_KEY_SEED", &config.signing_key_seed)?;
        let signing_key = SigningKey::from_bytes(&seed);

        let trusted_key = match &config.trusted_public_key {
            Some(encoded) => {
                let bytes = decode_key32("RELAY_TRUSTED_PUBLIC_KEY", encoded)?;
                VerifyingKey::from_bytes(&bytes)
                    .context("RELAY_TRUSTED_PUBLIC_KEY is not a valid Ed25519 public key")?
            }
            None => signing_key.verifying_key(),
        };

        Ok(Self {
            recipient_key_id: key_id(recipient_key.as_bytes()),
            recipient_key,
            signer_key_id: key_id(signing_key.verifying_key().as_bytes()),
            signing_key,
            trusted_key_id: key_id(trusted_key.as_bytes()),
            trusted_key,
        })
    }

    pub fn recipient_key(&self) -> &X25519PublicKey {
        &self.recipient_key
    }

    pub fn recipient_key_id(&self) -> &str {
        &self.recipient_key_id
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Key id of the signing key's public half, carried in published envelopes
    pub fn signer_key_id(&self) -> &str {
        &self.signer_key_id
    }

    pub fn trusted_key(&self) -> &VerifyingKey {
        &self.trusted_key
    }

    pub fn trusted_key_id(&self) -> &str {
        &self.trusted_key_id
    }
}

/// Stable identifier for a public key: truncated hex SHA-256 of its bytes.
/// Used to name keys in envelopes and logs without shipping the key itself.
pub fn key_id(key_bytes: &[u8]) -> String {
    let digest = Sha256::digest(key_bytes);
    format!("{:x}", digest)[..16].to_string()
}

fn decode_key32(name: &str, encoded: &str) -> Result<[u8; 32]> {
    let bytes = BASE64
        .decode(encoded.trim())
        .with_context(|| format!("{} is not valid base64", name))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| anyhow::anyhow!("{} must decode to exactly 32 bytes, got {}", name, bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CryptoConfig {
        CryptoConfig {
            recipient_public_key: BASE64.encode([1u8; 32]),
            signing_key_seed: BASE64.encode([2u8; 32]),
            trusted_public_key: None,
            verify_max_age_secs: 3600,
        }
    }

    #[test]
    fn loads_keys_and_derives_ids() {
        let store = KeyStore::from_config(&test_config()).unwrap();
        assert_eq!(store.recipient_key_id().len(), 16);
        // Without an explicit trusted key, verification trusts our own signer.
        assert_eq!(store.signer_key_id(), store.trusted_key_id());
    }

    #[test]
    fn explicit_trusted_key_overrides_signer() {
        let other_signer = SigningKey::from_bytes(&[9u8; 32]);
        let mut config = test_config();
        config.trusted_public_key =
            Some(BASE64.encode(other_signer.verifying_key().as_bytes()));

        let store = KeyStore::from_config(&config).unwrap();
        assert_ne!(store.signer_key_id(), store.trusted_key_id());
    }

    #[test]
    fn rejects_malformed_key_material() {
        let mut config = test_config();
        config.signing_key_seed = "not base64 at all!!!".to_string();
        assert!(KeyStore::from_config(&config).is_err());

        let mut config = test_config();
        config.recipient_public_key = BASE64.encode([1u8; 16]); // wrong length
        assert!(KeyStore::from_config(&config).is_err());
    }

    #[test]
    fn key_ids_are_stable_and_distinct() {
        assert_eq!(key_id(&[1u8; 32]), key_id(&[1u8; 32]));
        assert_ne!(key_id(&[1u8; 32]), key_id(&[2u8; 32]));
    }
}
