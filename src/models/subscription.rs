use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

pub const SUBSCRIPTION_PERIOD_DAYS: i64 = 30;

/// Billing plans unlocked by payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Plan {
    ReaderMonthly,
    AuthorMonthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub renews_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Subscription {
    /// Access requires an active status and a renewal time that is either
    /// unset or still in the future.
    pub fn grants_access(&self, now: i64) -> bool {
        self.status == SubscriptionStatus::Active && self.renews_at.is_none_or(|at| at > now)
    }
}
