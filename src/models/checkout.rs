use serde::{Deserialize, Serialize};

use super::Purpose;

/// Server-side record of checkout intent, keyed by transaction reference.
///
/// The webhook resolves intent from this row first and only falls back to
/// splitting the reference string when no row exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkout {
    pub tx_ref: String,
    pub purpose: Purpose,
    pub user_id: String,
    pub course_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCheckout {
    pub purpose: Purpose,
    pub user_id: String,
    #[serde(default)]
    pub course_id: Option<String>,
    /// Whole currency units. Defaults to the configured plan price.
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}
