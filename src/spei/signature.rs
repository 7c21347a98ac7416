//! Webhook signature verification.
//!
//! The network signs a canonical string built deterministically from the
//! payload fields. The exact formatting is part of the external interface;
//! both sides must produce identical bytes.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signature, VerifyingKey};
use thiserror::Error;

use crate::domain::TransferStatus;

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Invalid webhook public key: {0}")]
    InvalidKey(String),
    #[error("Invalid signature format")]
    InvalidSignatureFormat,
    #[error("Signature verification failed")]
    SignatureMismatch,
}

/// Canonical serialization of an order-status payload, pipe-delimited:
/// `||{order_ref}|{status}|{detail}||` with an absent detail rendered empty.
pub fn canonical_string(order_ref: &str, status: TransferStatus, detail: Option<&str>) -> String {
    format!("||{}|{}|{}||", order_ref, status.as_str(), detail.unwrap_or(""))
}

/// Verifies network signatures against the configured ed25519 public key.
/// With no key configured the verifier runs in development mode and accepts
/// everything (logged at startup and per delivery).
#[derive(Clone)]
pub struct WebhookVerifier {
    key: Option<VerifyingKey>,
}

impl WebhookVerifier {
    pub fn from_base64_key(encoded: Option<&str>) -> Result<Self, SignatureError> {
        let key = match encoded {
            Some(encoded) => {
                let bytes = BASE64
                    .decode(encoded)
                    .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
                let bytes: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| SignatureError::InvalidKey("expected 32 bytes".to_string()))?;
                let key = VerifyingKey::from_bytes(&bytes)
                    .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
                Some(key)
            }
            None => {
                tracing::warn!("no webhook public key configured; signature verification disabled");
                None
            }
        };

        Ok(Self { key })
    }

    pub fn is_development_mode(&self) -> bool {
        self.key.is_none()
    }

    pub fn verify(&self, canonical: &str, signature_b64: &str) -> Result<(), SignatureError> {
        let Some(key) = &self.key else {
            tracing::warn!("development mode: accepting webhook without signature verification");
            return Ok(());
        };

        let raw = BASE64
            .decode(signature_b64)
            .map_err(|_| SignatureError::InvalidSignatureFormat)?;
        let signature =
            Signature::from_slice(&raw).map_err(|_| SignatureError::InvalidSignatureFormat)?;

        key.verify_strict(canonical.as_bytes(), &signature)
            .map_err(|_| SignatureError::SignatureMismatch)
    }
}
