//! Transfer state machine.
//! Framework-agnostic transition rules for an outgoing SPEI-style transfer.

use serde::{Deserialize, Serialize};

/// Seconds after creation during which a user-initiated cancel is permitted.
pub const GRACE_PERIOD_SECS: i64 = 20;

/// Lifecycle of a transfer.
///
/// `pending_confirmation` -> `canceled` | `sent` -> `scattered` | `returned`.
/// A transfer never re-enters `pending_confirmation` once it leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TransferStatus {
    PendingConfirmation,
    Canceled,
    Sent,
    Scattered,
    Returned,
}

impl TransferStatus {
    pub fn is_terminal(self) -> bool {
        match self {
            TransferStatus::Canceled | TransferStatus::Scattered | TransferStatus::Returned => true,
            TransferStatus::PendingConfirmation | TransferStatus::Sent => false,
        }
    }

    /// Whether the state machine allows a transition from `self` to `next`.
    pub fn can_transition(self, next: TransferStatus) -> bool {
        match (self, next) {
            (TransferStatus::PendingConfirmation, TransferStatus::Canceled)
            | (TransferStatus::PendingConfirmation, TransferStatus::Sent)
            // The rail can settle or bounce an order before the local sweep
            // has moved the row to `sent`.
            | (TransferStatus::PendingConfirmation, TransferStatus::Scattered)
            | (TransferStatus::PendingConfirmation, TransferStatus::Returned)
            | (TransferStatus::Sent, TransferStatus::Scattered)
            | (TransferStatus::Sent, TransferStatus::Returned) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::PendingConfirmation => "pending_confirmation",
            TransferStatus::Canceled => "canceled",
            TransferStatus::Sent => "sent",
            TransferStatus::Scattered => "scattered",
            TransferStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
