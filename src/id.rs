//! Prefixed ID generation for relay-owned rows.
//!
//! Format: `am_{entity}_{uuid_simple}` (32 hex chars, no hyphens). The brand
//! prefix keeps our IDs distinct from Flutterwave's numeric transaction IDs.

use uuid::Uuid;

/// Entity types that get prefixed IDs.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    Subscription,
    Payment,
    Enrollment,
}

impl EntityType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Subscription => "am_sub_",
            Self::Payment => "am_pay_",
            Self::Enrollment => "am_enr_",
        }
    }

    pub fn gen_id(&self) -> String {
        format!("{}{}", self.prefix(), Uuid::new_v4().simple())
    }
}

/// Random suffix used to make transaction references unique.
pub fn gen_nonce() -> String {
    Uuid::new_v4().simple().to_string()
}
