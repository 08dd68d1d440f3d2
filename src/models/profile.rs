use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::SubscriptionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Reader,
    Author,
    Admin,
}

/// Account standing. Only `Active` viewers may read gated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    Disabled,
}

/// Viewer profile. `subscription_status` and `subscription_expires_at` mirror
/// the newest activation so gating can read a single row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub role: Role,
    pub status: AccountStatus,
    pub subscription_status: Option<SubscriptionStatus>,
    pub subscription_expires_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Profile {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Admins bypass premium gating, but only while their account is active.
    pub fn is_active_admin(&self) -> bool {
        self.is_active() && self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProfile {
    pub id: String,
    pub role: Role,
    #[serde(default = "default_status")]
    pub status: AccountStatus,
}

fn default_status() -> AccountStatus {
    AccountStatus::Active
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub user_id: String,
    pub premium: bool,
    pub updated_at: i64,
}
