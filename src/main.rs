use spei_core::spei::{SpeiClient, WebhookVerifier};
use spei_core::{config, create_app, db, scheduler, AppState};

use sqlx::migrate::Migrator;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database pool
    let pool = db::create_pool(&config).await?;

    // Run migrations
    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    // SPEI gateway client
    let spei = SpeiClient::new(config.spei_api_url.clone());
    tracing::info!("SPEI client initialized with URL: {}", config.spei_api_url);

    // Webhook signature verifier
    let verifier = WebhookVerifier::from_base64_key(config.spei_webhook_public_key.as_deref())
        .map_err(|e| anyhow::anyhow!("webhook key: {}", e))?;
    if verifier.is_development_mode() {
        tracing::warn!("webhook verification disabled (development mode)");
    }

    let state = AppState {
        db: pool,
        config: config.clone(),
        spei: Arc::new(spei),
        verifier,
    };

    scheduler::spawn(state.clone())?;

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
