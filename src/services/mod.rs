pub mod cutoff;
pub mod reset_tokens;
pub mod transfers;
pub mod webhook;

pub use cutoff::CutoffService;
pub use reset_tokens::ResetTokenService;
pub use transfers::TransferService;
pub use webhook::WebhookService;
