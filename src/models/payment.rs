use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::Plan;

/// What a payment is for. Carried through checkout in the transaction
/// reference and the pending checkout row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Purpose {
    ReaderSubscription,
    AuthorPremium,
    CoursePurchase,
}

impl Purpose {
    /// Subscription plan activated by this purpose, if any.
    pub fn plan(&self) -> Option<Plan> {
        match self {
            Self::ReaderSubscription => Some(Plan::ReaderMonthly),
            Self::AuthorPremium => Some(Plan::AuthorMonthly),
            Self::CoursePurchase => None,
        }
    }
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Immutable payment log row. Only `status` may change after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    /// Provider transaction reference; unique per provider.
    pub provider_ref: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    /// Raw provider payload (JSON text).
    pub event: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewPayment<'a> {
    pub user_id: &'a str,
    pub provider: &'a str,
    pub provider_ref: &'a str,
    pub amount_cents: i64,
    pub currency: &'a str,
    pub status: &'a str,
    pub event: &'a serde_json::Value,
}

/// Outcome of writing a payment at the idempotency boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentWrite {
    /// First time this provider reference was seen.
    Inserted,
    /// Already logged with the same status; nothing written.
    Duplicate,
    /// Already logged; status changed (reconciliation).
    StatusUpdated,
}

/// Convert a provider major-unit amount (e.g. 2500.0 NGN) to minor units.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}
