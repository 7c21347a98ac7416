use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub spei_api_url: String,
    /// Base64-encoded ed25519 public key of the payment network. When unset the
    /// webhook verifier runs in development mode and skips verification.
    pub spei_webhook_public_key: Option<String>,
    /// Shared secret accepted in `X-Scheduler-Secret` for the cutoff trigger.
    pub scheduler_secret: String,
    /// Flat commission accrued per scattered transfer, in centavos.
    pub transfer_fee_cents: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            spei_api_url: env::var("SPEI_API_URL")?,
            spei_webhook_public_key: env::var("SPEI_WEBHOOK_PUBLIC_KEY").ok(),
            scheduler_secret: env::var("SCHEDULER_SECRET")?,
            transfer_fee_cents: env::var("TRANSFER_FEE_CENTS")
                .unwrap_or_else(|_| "580".to_string())
                .parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_default_parses() {
        let fee: i64 = "580".parse().unwrap();
        assert_eq!(fee, 580);
    }

    #[test]
    fn config_is_cloneable() {
        let config = Config {
            server_port: 3000,
            database_url: "postgres://localhost/spei".to_string(),
            spei_api_url: "https://spei.example.test".to_string(),
            spei_webhook_public_key: None,
            scheduler_secret: "secret".to_string(),
            transfer_fee_cents: 580,
        };
        let clone = config.clone();
        assert_eq!(clone.server_port, 3000);
        assert!(clone.spei_webhook_public_key.is_none());
    }
}
