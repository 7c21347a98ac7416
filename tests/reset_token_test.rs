//! Reset-token lifecycle against real Postgres.
//! All tests need Docker; run with `cargo test -- --ignored`.

mod common;

use chrono::{Duration, Utc};
use spei_core::error::AppError;
use spei_core::services::ResetTokenService;
use sqlx::PgPool;

async fn seed_user(pool: &PgPool, email: &str) {
    sqlx::query("INSERT INTO users (email, password_hash) VALUES ($1, 'old-hash')")
        .bind(email)
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore]
async fn token_consumes_exactly_once() {
    let (_container, pool) = common::setup_db().await;
    seed_user(&pool, "ops@empresa.mx").await;
    let service = ResetTokenService::new(pool.clone());

    let issued = service
        .issue("ops@empresa.mx", "10.0.0.1")
        .await
        .unwrap()
        .expect("token for existing user");

    let email = service.validate_and_consume(&issued.token).await.unwrap();
    assert_eq!(email, "ops@empresa.mx");

    let err = service.validate_and_consume(&issued.token).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(ref m) if m.contains("invalid or expired")));
}

#[tokio::test]
#[ignore]
async fn concurrent_redemptions_have_one_winner() {
    let (_container, pool) = common::setup_db().await;
    seed_user(&pool, "ops@empresa.mx").await;
    let service = ResetTokenService::new(pool.clone());

    let issued = service
        .issue("ops@empresa.mx", "10.0.0.1")
        .await
        .unwrap()
        .unwrap();

    let (first, second) = tokio::join!(
        service.validate_and_consume(&issued.token),
        service.validate_and_consume(&issued.token),
    );
    assert!(
        first.is_ok() ^ second.is_ok(),
        "exactly one redemption may succeed"
    );
}

#[tokio::test]
#[ignore]
async fn unknown_email_issues_nothing_but_looks_identical() {
    let (_container, pool) = common::setup_db().await;
    let service = ResetTokenService::new(pool.clone());

    let issued = service.issue("nadie@empresa.mx", "10.0.0.1").await.unwrap();
    assert!(issued.is_none());

    let (tokens,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reset_tokens")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(tokens, 0);
}

#[tokio::test]
#[ignore]
async fn expired_token_is_rejected() {
    let (_container, pool) = common::setup_db().await;
    seed_user(&pool, "ops@empresa.mx").await;
    let service = ResetTokenService::new(pool.clone());

    let issued = service
        .issue("ops@empresa.mx", "10.0.0.1")
        .await
        .unwrap()
        .unwrap();

    sqlx::query("UPDATE reset_tokens SET expires_at = $1")
        .bind(Utc::now() - Duration::minutes(1))
        .execute(&pool)
        .await
        .unwrap();

    let err = service.validate_and_consume(&issued.token).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
#[ignore]
async fn complete_reset_updates_the_password_hash() {
    let (_container, pool) = common::setup_db().await;
    seed_user(&pool, "ops@empresa.mx").await;
    let service = ResetTokenService::new(pool.clone());

    let issued = service
        .issue("ops@empresa.mx", "10.0.0.1")
        .await
        .unwrap()
        .unwrap();

    // Policy violation leaves the token unconsumed.
    let err = service
        .complete_reset(&issued.token, "weakpass")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let email = service
        .complete_reset(&issued.token, "Str0ng-enough")
        .await
        .unwrap();
    assert_eq!(email, "ops@empresa.mx");

    let (hash,): (String,) = sqlx::query_as("SELECT password_hash FROM users WHERE email = $1")
        .bind("ops@empresa.mx")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(hash.starts_with("$argon2"));
}
