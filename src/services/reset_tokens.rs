use argon2::password_hash::{rand_core::OsRng as SaltRng, PasswordHasher, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::db::models::ResetToken;
use crate::db::queries;
use crate::error::AppError;
use crate::validation;

pub const TOKEN_TTL_MINUTES: i64 = 30;
const TOKEN_BYTES: usize = 32; // 256 bits of entropy

/// Raw token plus its expiry, handed to the mail sink by the caller. Never
/// persisted and never echoed to the requester.
pub struct IssuedToken {
    pub token: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

pub struct ResetTokenService {
    pool: PgPool,
}

impl ResetTokenService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Issues a reset token for an existing account. Returns `None` for an
    /// unknown email; the caller reports generic success either way so the
    /// endpoint cannot be used to enumerate accounts.
    pub async fn issue(&self, email: &str, requested_ip: &str) -> Result<Option<IssuedToken>, AppError> {
        validation::validate_email(email).map_err(|e| AppError::Validation(e.to_string()))?;
        let email = validation::sanitize_string(email).to_lowercase();

        if !queries::user_exists(&self.pool, &email).await? {
            tracing::info!("reset requested for unknown email");
            return Ok(None);
        }

        let mut raw = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut raw);
        let token = hex::encode(raw);

        let row = ResetToken {
            id: uuid::Uuid::new_v4(),
            email: email.clone(),
            token_hash: hash_token(&token),
            requested_ip: requested_ip.to_string(),
            expires_at: Utc::now() + Duration::minutes(TOKEN_TTL_MINUTES),
            consumed_at: None,
            created_at: Utc::now(),
        };
        let expires_at = row.expires_at;
        queries::insert_reset_token(&self.pool, &row).await?;

        Ok(Some(IssuedToken {
            token,
            email,
            expires_at,
        }))
    }

    /// Checks existence, expiry and single-use, and consumes the token, all
    /// as one conditional update. Two concurrent redemptions: one wins.
    pub async fn validate_and_consume(&self, token: &str) -> Result<String, AppError> {
        queries::consume_reset_token(&self.pool, &hash_token(token))
            .await?
            .ok_or_else(|| AppError::Unauthorized("invalid or expired token".to_string()))
    }

    /// Completes the reset: consumes the token and stores the new password
    /// hash for the bound email.
    pub async fn complete_reset(&self, token: &str, new_password: &str) -> Result<String, AppError> {
        validation::validate_password(new_password)
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let email = self.validate_and_consume(token).await?;

        let salt = SaltString::generate(&mut SaltRng);
        let password_hash = Argon2::default()
            .hash_password(new_password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))?
            .to_string();

        if !queries::update_user_password(&self.pool, &email, &password_hash).await? {
            // Token consumed but the account vanished underneath it.
            return Err(AppError::Internal(format!(
                "no account for consumed token (email {})",
                email
            )));
        }

        tracing::info!("password reset completed");
        Ok(email)
    }
}

/// Tokens are looked up by SHA-256 hash; the raw value is never stored.
fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
