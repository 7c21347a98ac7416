pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod scheduler;
pub mod services;
pub mod spei;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::config::Config;
use crate::spei::{PaymentNetwork, WebhookVerifier};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Config,
    pub spei: Arc<dyn PaymentNetwork>,
    pub verifier: WebhookVerifier,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/transfers", post(handlers::transfers::create_transfer))
        .route("/transfers/:id", get(handlers::transfers::get_transfer))
        .route("/transfers/:id/cancel", post(handlers::transfers::cancel_transfer))
        .route(
            "/transfers/:id/cancelable",
            get(handlers::transfers::cancel_eligibility),
        )
        .route("/cutoffs/run", post(handlers::cutoffs::run_cutoff))
        .route("/cutoffs/status", get(handlers::cutoffs::cutoff_status))
        .route("/webhooks/spei", post(handlers::webhook::order_status))
        .route("/auth/password-reset/request", post(handlers::auth::request_reset))
        .route("/auth/password-reset/complete", post(handlers::auth::complete_reset))
        .with_state(state)
}
