pub mod client;
pub mod signature;

pub use client::{
    CancelOutcome, CutoffSubmission, CutoffSubmissionResponse, PaymentNetwork, PlaceOrderRequest,
    PlaceOrderResponse, SpeiClient, SpeiError,
};
pub use signature::{canonical_string, SignatureError, WebhookVerifier};
