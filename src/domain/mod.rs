pub mod transfer;

pub use transfer::{TransferStatus, GRACE_PERIOD_SECS};
