use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SpeiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Order not found on the network: {0}")]
    OrderNotFound(String),
    #[error("Network rejected the request: {0}")]
    Rejected(String),
    #[error("Invalid response from SPEI gateway: {0}")]
    InvalidResponse(String),
    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrderRequest {
    pub transaction_id: Uuid,
    pub beneficiary_name: String,
    pub beneficiary_account: String,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderResponse {
    pub order_ref: String,
}

/// Outcome of a best-effort order cancel. A rejection never blocks the local
/// cancel; the order may already be irreversibly processing on the rail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Accepted,
    Rejected(String),
}

#[derive(Debug, Clone, Deserialize)]
struct CancelOrderResponse {
    status: String,
    detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CutoffSubmission {
    pub cutoff_id: Uuid,
    pub company_id: Uuid,
    pub total_amount_cents: i64,
    pub commission_count: i32,
    pub cutoff_date: chrono::NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CutoffSubmissionResponse {
    pub tracking_key: String,
}

/// RPC peer for the settlement rail: place/cancel orders, submit cutoffs.
#[async_trait]
pub trait PaymentNetwork: Send + Sync {
    async fn place_order(&self, request: &PlaceOrderRequest) -> Result<PlaceOrderResponse, SpeiError>;
    async fn cancel_order(&self, order_ref: &str) -> Result<CancelOutcome, SpeiError>;
    async fn submit_cutoff(
        &self,
        submission: &CutoffSubmission,
    ) -> Result<CutoffSubmissionResponse, SpeiError>;
}

/// HTTP client for the SPEI gateway.
#[derive(Clone)]
pub struct SpeiClient {
    client: Client,
    base_url: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl SpeiClient {
    pub fn new(base_url: String) -> Self {
        Self::with_circuit_breaker(base_url, 3, 60)
    }

    pub fn with_circuit_breaker(
        base_url: String,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        SpeiClient {
            client,
            base_url,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PaymentNetwork for SpeiClient {
    async fn place_order(&self, request: &PlaceOrderRequest) -> Result<PlaceOrderResponse, SpeiError> {
        let url = self.url("/orders");
        let client = self.client.clone();
        let body = request.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.post(&url).json(&body).send().await?;

                if !response.status().is_success() {
                    let detail = response.text().await.unwrap_or_default();
                    return Err(SpeiError::Rejected(detail));
                }

                let placed = response.json::<PlaceOrderResponse>().await?;
                Ok(placed)
            })
            .await;

        match result {
            Ok(placed) => Ok(placed),
            Err(FailsafeError::Rejected) => Err(SpeiError::CircuitBreakerOpen(
                "SPEI gateway circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    async fn cancel_order(&self, order_ref: &str) -> Result<CancelOutcome, SpeiError> {
        let url = self.url(&format!("/orders/{}/cancel", order_ref));
        let client = self.client.clone();
        let order = order_ref.to_string();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.post(&url).send().await?;

                if response.status() == 404 {
                    return Err(SpeiError::OrderNotFound(order));
                }

                let outcome = response.json::<CancelOrderResponse>().await?;
                match outcome.status.as_str() {
                    "accepted" => Ok(CancelOutcome::Accepted),
                    "rejected" => Ok(CancelOutcome::Rejected(
                        outcome.detail.unwrap_or_else(|| "order already processing".to_string()),
                    )),
                    other => Err(SpeiError::InvalidResponse(format!(
                        "unknown cancel status: {}",
                        other
                    ))),
                }
            })
            .await;

        match result {
            Ok(outcome) => Ok(outcome),
            Err(FailsafeError::Rejected) => Err(SpeiError::CircuitBreakerOpen(
                "SPEI gateway circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    async fn submit_cutoff(
        &self,
        submission: &CutoffSubmission,
    ) -> Result<CutoffSubmissionResponse, SpeiError> {
        let url = self.url("/cutoffs");
        let client = self.client.clone();
        let body = submission.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.post(&url).json(&body).send().await?;

                if !response.status().is_success() {
                    let detail = response.text().await.unwrap_or_default();
                    return Err(SpeiError::Rejected(detail));
                }

                let accepted = response.json::<CutoffSubmissionResponse>().await?;
                Ok(accepted)
            })
            .await;

        match result {
            Ok(accepted) => Ok(accepted),
            Err(FailsafeError::Rejected) => Err(SpeiError::CircuitBreakerOpen(
                "SPEI gateway circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}
