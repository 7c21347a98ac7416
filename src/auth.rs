//! Verified identity/role context for privileged operations.
//!
//! Every privileged handler takes an [`AuthContext`] extracted from verified
//! credentials: an operator API key looked up by hash, or the scheduler's
//! shared secret compared in constant time. Client-supplied role headers are
//! never trusted.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

pub const SCHEDULER_SECRET_HEADER: &str = "x-scheduler-secret";

#[derive(Debug, Clone)]
pub enum AuthContext {
    /// The cutoff scheduler, authenticated by shared secret.
    Scheduler,
    /// A human operator with elevated role, authenticated by API key.
    Operator { id: Uuid, name: String },
}

impl AuthContext {
    pub fn actor(&self) -> String {
        match self {
            AuthContext::Scheduler => "scheduler".to_string(),
            AuthContext::Operator { name, .. } => format!("operator:{}", name),
        }
    }

    /// The cutoff trigger accepts either principal.
    pub fn can_trigger_cutoff(&self) -> bool {
        match self {
            AuthContext::Scheduler | AuthContext::Operator { .. } => true,
        }
    }

    /// Status queries are operator-only.
    pub fn require_operator(&self) -> Result<(), AppError> {
        match self {
            AuthContext::Operator { .. } => Ok(()),
            AuthContext::Scheduler => Err(AppError::Forbidden(
                "operator role required".to_string(),
            )),
        }
    }
}

/// Compares secrets without short-circuiting on the first differing byte.
/// Both sides are hashed first so input length is not observable either.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let a = Sha256::digest(a);
    let b = Sha256::digest(b);
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(secret) = parts
            .headers
            .get(SCHEDULER_SECRET_HEADER)
            .and_then(|h| h.to_str().ok())
        {
            if constant_time_eq(secret.as_bytes(), state.config.scheduler_secret.as_bytes()) {
                return Ok(AuthContext::Scheduler);
            }

            tracing::warn!("rejected request with bad scheduler secret");
            return Err(AppError::Unauthorized("invalid scheduler secret".to_string()));
        }

        let key = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("missing credentials".to_string()))?;

        let operator = crate::db::queries::get_operator_by_key_hash(&state.db, &hash_api_key(key))
            .await?
            .ok_or_else(|| {
                tracing::warn!("rejected request with unknown operator key");
                AppError::Unauthorized("invalid operator key".to_string())
            })?;

        Ok(AuthContext::Operator {
            id: operator.id,
            name: operator.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_equal_inputs() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secrets"));
        assert!(!constant_time_eq(b"secret", "sécret".as_bytes()));
        assert!(!constant_time_eq(b"", b"secret"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn api_key_hash_is_hex_sha256() {
        let hash = hash_api_key("ops-key");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_api_key("ops-key"));
        assert_ne!(hash, hash_api_key("other-key"));
    }

    #[test]
    fn scheduler_cannot_read_status() {
        assert!(AuthContext::Scheduler.require_operator().is_err());
        assert!(AuthContext::Operator {
            id: Uuid::new_v4(),
            name: "ana".to_string()
        }
        .require_operator()
        .is_ok());
    }

    #[test]
    fn both_principals_can_trigger_cutoff() {
        assert!(AuthContext::Scheduler.can_trigger_cutoff());
        assert!(AuthContext::Operator {
            id: Uuid::new_v4(),
            name: "ana".to_string()
        }
        .can_trigger_cutoff());
    }
}
