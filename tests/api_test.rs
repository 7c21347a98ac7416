//! HTTP surface tests: auth boundaries and webhook acknowledgment semantics.
//! All tests need Docker; run with `cargo test -- --ignored`.

mod common;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use common::MockNetwork;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use reqwest::StatusCode;
use spei_core::auth::hash_api_key;
use spei_core::config::Config;
use spei_core::domain::TransferStatus;
use spei_core::spei::{canonical_string, WebhookVerifier};
use spei_core::{create_app, AppState};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

const SCHEDULER_SECRET: &str = "test-scheduler-secret";
const OPERATOR_KEY: &str = "ops-api-key";

fn test_config(database_url: &str, public_key: Option<String>) -> Config {
    Config {
        server_port: 0,
        database_url: database_url.to_string(),
        spei_api_url: "http://spei.invalid".to_string(),
        spei_webhook_public_key: public_key,
        scheduler_secret: SCHEDULER_SECRET.to_string(),
        transfer_fee_cents: 580,
    }
}

async fn seed_operator(pool: &PgPool) {
    sqlx::query(
        "INSERT INTO operators (id, name, api_key_hash, role) VALUES ($1, 'ana', $2, 'operator')",
    )
    .bind(Uuid::new_v4())
    .bind(hash_api_key(OPERATOR_KEY))
    .execute(pool)
    .await
    .unwrap();
}

async fn spawn_app(pool: PgPool, public_key: Option<String>) -> String {
    let config = test_config("unused", public_key);
    let verifier =
        WebhookVerifier::from_base64_key(config.spei_webhook_public_key.as_deref()).unwrap();
    let state = AppState {
        db: pool,
        config,
        spei: Arc::new(MockNetwork::default()),
        verifier,
    };
    let app = create_app(state);

    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = axum::Server::bind(&addr).serve(app.into_make_service());
    let local_addr = server.local_addr();
    tokio::spawn(server);

    format!("http://{}", local_addr)
}

#[tokio::test]
#[ignore]
async fn cutoff_endpoints_enforce_roles() {
    let (_container, pool) = common::setup_db().await;
    seed_operator(&pool).await;
    let base_url = spawn_app(pool, None).await;
    let client = reqwest::Client::new();

    // No credentials at all.
    let res = client
        .post(format!("{}/cutoffs/run", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Bad scheduler secret.
    let res = client
        .post(format!("{}/cutoffs/run", base_url))
        .header("X-Scheduler-Secret", "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Scheduler may trigger a run.
    let res = client
        .post(format!("{}/cutoffs/run", base_url))
        .header("X-Scheduler-Secret", SCHEDULER_SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // ...but may not read status.
    let res = client
        .get(format!("{}/cutoffs/status", base_url))
        .header("X-Scheduler-Secret", SCHEDULER_SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // An operator may do both.
    let res = client
        .get(format!("{}/cutoffs/status", base_url))
        .bearer_auth(OPERATOR_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore]
async fn webhook_rejects_forged_signature_when_key_configured() {
    let (_container, pool) = common::setup_db().await;

    let signing = SigningKey::generate(&mut OsRng);
    let public_b64 = BASE64.encode(signing.verifying_key().as_bytes());
    let base_url = spawn_app(pool, Some(public_b64)).await;
    let client = reqwest::Client::new();

    let payload = serde_json::json!({
        "type": "orden.status",
        "data": { "order_ref": "SPEI-0001", "status": "scattered", "detail": null },
        "signature": BASE64.encode([0u8; 64]),
    });

    let res = client
        .post(format!("{}/webhooks/spei", base_url))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Properly signed payloads are acknowledged even without a matching
    // local transfer.
    let canonical = canonical_string("SPEI-0001", TransferStatus::Scattered, None);
    let signature = BASE64.encode(signing.sign(canonical.as_bytes()).to_bytes());
    let payload = serde_json::json!({
        "type": "orden.status",
        "data": { "order_ref": "SPEI-0001", "status": "scattered", "detail": null },
        "signature": signature,
    });

    let res = client
        .post(format!("{}/webhooks/spei", base_url))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["received"]["order_ref"], "SPEI-0001");
    assert_eq!(body["applied"], false);
}

#[tokio::test]
#[ignore]
async fn cancel_endpoint_distinguishes_not_found_and_conflict() {
    let (_container, pool) = common::setup_db().await;
    let base_url = spawn_app(pool, None).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/transfers/{}/cancel", base_url, Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let created: serde_json::Value = client
        .post(format!("{}/transfers", base_url))
        .json(&serde_json::json!({
            "company_id": Uuid::new_v4(),
            "beneficiary_name": "Juan Perez",
            "beneficiary_account": "032180000118359719",
            "amount_cents": 150000,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    let res = client
        .post(format!("{}/transfers/{}/cancel", base_url, id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/transfers/{}/cancel", base_url, id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn password_reset_request_is_generic_for_unknown_emails() {
    let (_container, pool) = common::setup_db().await;
    let base_url = spawn_app(pool, None).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/auth/password-reset/request", base_url))
        .json(&serde_json::json!({ "email": "nadie@empresa.mx" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("If the address exists"));
}
