mod flutterwave;
mod tx_ref;

pub use flutterwave::*;
pub use tx_ref::*;

/// Provider name stored on payment records.
pub const PROVIDER_FLUTTERWAVE: &str = "flutterwave";
