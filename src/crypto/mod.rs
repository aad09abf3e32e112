// Crypto gateway: encrypt-and-armor on the publish path, fail-closed
// signature verification on the consume path.
//
// Sealed payload layout: [ephemeral X25519 public key (32) | nonce (12) |
// ChaCha20-Poly1305 ciphertext]. The armored form is the base64 of those
// bytes; the detached Ed25519 signature covers the armored string.

pub mod keys;

pub use keys::KeyStore;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use ed25519_dalek::{Signature, Signer, Verifier};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey};

use crate::error::{RelayError, RelayResult};

pub const EPHEMERAL_KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
const SIGNATURE_LEN: usize = 64;

/// Permitted forward clock skew when checking envelope freshness
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Outcome of verifying a consumed envelope.
///
/// Verification fails closed: any parse error, signature mismatch, or
/// freshness violation yields `Tampered`; only a clean detached-signature
/// check over a fresh envelope yields `Verified`. Consumers receive this
/// alongside the payload and decide their own trust policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VerificationResult {
    Verified,
    Tampered,
    /// The envelope names a signer key we are not configured to trust
    KeyUnavailable,
}

/// Armored ciphertext bound to the recipient key it was sealed for
#[derive(Debug, Clone)]
pub struct EncryptedEnvelope {
    pub armored: String,
    pub recipient_key_id: String,
}

/// An `EncryptedEnvelope` plus a detached signature over its armored bytes
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    pub armored: String,
    pub recipient_key_id: String,
    /// base64-encoded detached Ed25519 signature
    pub signature: String,
    pub signer_key_id: String,
}

/// Pure encrypt / sign / verify operations over the process key store
pub struct CryptoGateway {
    keys: Arc<KeyStore>,
    verify_max_age_secs: i64,
}

impl CryptoGateway {
    pub fn new(keys: Arc<KeyStore>, verify_max_age_secs: i64) -> Self {
        Self {
            keys,
            verify_max_age_secs,
        }
    }

    /// Encrypt a payload for the configured recipient and armor the result.
    ///
    /// A fresh ephemeral X25519 key and a random nonce are used per message,
    /// so identical payloads produce distinct envelopes. Never partially
    /// encrypts: any AEAD failure returns `CryptoError` with no envelope.
    pub fn encrypt(&self, payload: &[u8]) -> RelayResult<EncryptedEnvelope> {
        let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
        let ephemeral_public = X25519PublicKey::from(&ephemeral_secret);
        let shared_secret = ephemeral_secret.diffie_hellman(self.keys.recipient_key());

        let cipher = ChaCha20Poly1305::new(shared_secret.as_bytes().into());
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, payload)
            .map_err(|e| RelayError::Crypto(format!("encryption failed: {:?}", e)))?;

        let mut sealed = Vec::with_capacity(EPHEMERAL_KEY_LEN + NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(ephemeral_public.as_bytes());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(EncryptedEnvelope {
            armored: BASE64.encode(sealed),
            recipient_key_id: self.keys.recipient_key_id().to_string(),
        })
    }

    /// Attach a detached signature over the armored ciphertext.
    ///
    /// Ed25519 signing is deterministic: identical envelopes yield identical
    /// signatures.
    pub fn sign(&self, envelope: EncryptedEnvelope) -> RelayResult<SignedEnvelope> {
        let signature = self.keys.signing_key().sign(envelope.armored.as_bytes());

        Ok(SignedEnvelope {
            armored: envelope.armored,
            recipient_key_id: envelope.recipient_key_id,
            signature: BASE64.encode(signature.to_bytes()),
            signer_key_id: self.keys.signer_key_id().to_string(),
        })
    }

    /// Verify a consumed envelope against the configured trusted key.
    ///
    /// Side-effect free. `reference_time` is unix seconds, supplied by the
    /// caller so the check is reproducible in tests.
    pub fn verify(
        &self,
        armored: &str,
        signature_b64: &str,
        signer_key_id: &str,
        created_at: i64,
        reference_time: i64,
    ) -> VerificationResult {
        if signer_key_id != self.keys.trusted_key_id() {
            return VerificationResult::KeyUnavailable;
        }

        // Freshness window: stale or far-future envelopes are rejected even
        // with a valid signature.
        let age = reference_time - created_at;
        if age > self.verify_max_age_secs || age < -MAX_CLOCK_SKEW_SECS {
            return VerificationResult::Tampered;
        }

        let signature_bytes = match BASE64.decode(signature_b64) {
            Ok(bytes) => bytes,
            Err(_) => return VerificationResult::Tampered,
        };
        let signature_array: [u8; SIGNATURE_LEN] = match signature_bytes.as_slice().try_into() {
            Ok(array) => array,
            Err(_) => return VerificationResult::Tampered,
        };
        let signature = Signature::from_bytes(&signature_array);

        match self
            .keys
            .trusted_key()
            .verify(armored.as_bytes(), &signature)
        {
            Ok(()) => VerificationResult::Verified,
            Err(_) => VerificationResult::Tampered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CryptoConfig;
    use chrono::Utc;
    use x25519_dalek::StaticSecret;

    struct TestSetup {
        gateway: CryptoGateway,
        recipient_secret: StaticSecret,
    }

    fn setup() -> TestSetup {
        let recipient_secret = StaticSecret::random_from_rng(OsRng);
        let recipient_public = X25519PublicKey::from(&recipient_secret);

        let config = CryptoConfig {
            recipient_public_key: BASE64.encode(recipient_public.as_bytes()),
            signing_key_seed: BASE64.encode([7u8; 32]),
            trusted_public_key: None,
            verify_max_age_secs: 3600,
        };
        let keys = Arc::new(KeyStore::from_config(&config).unwrap());

        TestSetup {
            gateway: CryptoGateway::new(keys, config.verify_max_age_secs),
            recipient_secret,
        }
    }

    fn sign_encrypt(setup: &TestSetup, payload: &[u8]) -> SignedEnvelope {
        let encrypted = setup.gateway.encrypt(payload).unwrap();
        setup.gateway.sign(encrypted).unwrap()
    }

    /// Decrypt with the recipient's secret, validating the sealed layout
    fn open_sealed(recipient_secret: &StaticSecret, armored: &str) -> Vec<u8> {
        let sealed = BASE64.decode(armored).unwrap();
        assert!(sealed.len() > EPHEMERAL_KEY_LEN + NONCE_LEN);

        let ephemeral_public =
            X25519PublicKey::from(<[u8; 32]>::try_from(&sealed[..EPHEMERAL_KEY_LEN]).unwrap());
        let nonce_bytes = &sealed[EPHEMERAL_KEY_LEN..EPHEMERAL_KEY_LEN + NONCE_LEN];
        let ciphertext = &sealed[EPHEMERAL_KEY_LEN + NONCE_LEN..];

        let shared_secret = recipient_secret.diffie_hellman(&ephemeral_public);
        let cipher = ChaCha20Poly1305::new(shared_secret.as_bytes().into());
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .unwrap()
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let setup = setup();
        let envelope = sign_encrypt(&setup, b"the relay payload");

        let result = setup.gateway.verify(
            &envelope.armored,
            &envelope.signature,
            &envelope.signer_key_id,
            Utc::now().timestamp(),
            Utc::now().timestamp(),
        );
        assert_eq!(result, VerificationResult::Verified);
    }

    #[test]
    fn recipient_can_open_the_sealed_payload() {
        let setup = setup();
        let payload = b"round trip through the seal";
        let envelope = sign_encrypt(&setup, payload);

        let opened = open_sealed(&setup.recipient_secret, &envelope.armored);
        assert_eq!(opened, payload);
    }

    #[test]
    fn identical_payloads_produce_distinct_envelopes() {
        let setup = setup();
        let a = setup.gateway.encrypt(b"same bytes").unwrap();
        let b = setup.gateway.encrypt(b"same bytes").unwrap();
        assert_ne!(a.armored, b.armored);
    }

    #[test]
    fn signing_is_deterministic_for_identical_input() {
        let setup = setup();
        let encrypted = setup.gateway.encrypt(b"payload").unwrap();
        let first = setup.gateway.sign(encrypted.clone()).unwrap();
        let second = setup.gateway.sign(encrypted).unwrap();
        assert_eq!(first.signature, second.signature);
    }

    #[test]
    fn mutated_ciphertext_is_tampered() {
        let setup = setup();
        let envelope = sign_encrypt(&setup, b"original content");
        let now = Utc::now().timestamp();

        // Flip one character of the armored ciphertext.
        let mut mutated: Vec<u8> = envelope.armored.clone().into_bytes();
        let index = mutated.len() / 2;
        mutated[index] = if mutated[index] == b'A' { b'B' } else { b'A' };
        let mutated = String::from_utf8(mutated).unwrap();

        let result = setup.gateway.verify(
            &mutated,
            &envelope.signature,
            &envelope.signer_key_id,
            now,
            now,
        );
        assert_ne!(result, VerificationResult::Verified);
    }

    #[test]
    fn mutated_signature_is_tampered() {
        let setup = setup();
        let envelope = sign_encrypt(&setup, b"original content");
        let now = Utc::now().timestamp();

        let mut signature_bytes = BASE64.decode(&envelope.signature).unwrap();
        signature_bytes[10] ^= 0x01;
        let mutated_signature = BASE64.encode(signature_bytes);

        let result = setup.gateway.verify(
            &envelope.armored,
            &mutated_signature,
            &envelope.signer_key_id,
            now,
            now,
        );
        assert_eq!(result, VerificationResult::Tampered);
    }

    #[test]
    fn garbage_signature_is_tampered_not_a_panic() {
        let setup = setup();
        let envelope = sign_encrypt(&setup, b"payload");
        let now = Utc::now().timestamp();

        for bad in ["", "not-base64!!!", "QUJD"] {
            let result = setup.gateway.verify(
                &envelope.armored,
                bad,
                &envelope.signer_key_id,
                now,
                now,
            );
            assert_eq!(result, VerificationResult::Tampered);
        }
    }

    #[test]
    fn unknown_signer_key_is_key_unavailable() {
        let setup = setup();
        let envelope = sign_encrypt(&setup, b"payload");
        let now = Utc::now().timestamp();

        let result = setup.gateway.verify(
            &envelope.armored,
            &envelope.signature,
            "0000000000000000",
            now,
            now,
        );
        assert_eq!(result, VerificationResult::KeyUnavailable);
    }

    #[test]
    fn stale_envelope_is_tampered() {
        let setup = setup();
        let envelope = sign_encrypt(&setup, b"payload");
        let now = Utc::now().timestamp();

        // Older than the 3600s window configured in setup().
        let result = setup.gateway.verify(
            &envelope.armored,
            &envelope.signature,
            &envelope.signer_key_id,
            now - 7200,
            now,
        );
        assert_eq!(result, VerificationResult::Tampered);
    }

    #[test]
    fn far_future_envelope_is_tampered() {
        let setup = setup();
        let envelope = sign_encrypt(&setup, b"payload");
        let now = Utc::now().timestamp();

        let result = setup.gateway.verify(
            &envelope.armored,
            &envelope.signature,
            &envelope.signer_key_id,
            now + 600,
            now,
        );
        assert_eq!(result, VerificationResult::Tampered);
    }

    #[test]
    fn small_forward_skew_is_tolerated() {
        let setup = setup();
        let envelope = sign_encrypt(&setup, b"payload");
        let now = Utc::now().timestamp();

        let result = setup.gateway.verify(
            &envelope.armored,
            &envelope.signature,
            &envelope.signer_key_id,
            now + 30,
            now,
        );
        assert_eq!(result, VerificationResult::Verified);
    }
}
