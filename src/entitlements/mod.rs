//! Entitlement read path.
//!
//! Computes whether a viewer currently has paid access and keeps that answer
//! fresh for long-lived consumers through [`EntitlementWatch`].

mod watch;

pub use watch::*;

use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::error::Result;
use crate::models::{Subscription, SubscriptionStatus};

/// Snapshot of a viewer's paid access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitlementStatus {
    pub user_id: String,
    pub active: bool,
    /// Latest known end of paid access, if any.
    pub expires_at: Option<i64>,
    pub premium_author: bool,
}

/// Whether the viewer has an active subscription right now.
///
/// Active when any subscription row grants access, or when the profile
/// mirror says active with an expiry still in the future.
pub fn compute_active(conn: &Connection, user_id: &str, now: i64) -> Result<bool> {
    let subscriptions = queries::list_subscriptions_for_user(conn, user_id)?;
    if subscriptions.iter().any(|s| s.grants_access(now)) {
        return Ok(true);
    }

    let mirrored = queries::get_profile(conn, user_id)?.is_some_and(|p| {
        p.subscription_status == Some(SubscriptionStatus::Active)
            && p.subscription_expires_at.is_some_and(|exp| exp > now)
    });
    Ok(mirrored)
}

pub fn load_status(conn: &Connection, user_id: &str, now: i64) -> Result<EntitlementStatus> {
    let active = compute_active(conn, user_id, now)?;

    let subscriptions = queries::list_subscriptions_for_user(conn, user_id)?;
    let profile = queries::get_profile(conn, user_id)?;
    let expires_at = subscriptions
        .iter()
        .filter(|s| s.grants_access(now))
        .filter_map(|s: &Subscription| s.renews_at)
        .chain(profile.and_then(|p| p.subscription_expires_at))
        .max();

    let premium_author = queries::get_author(conn, user_id)?.is_some_and(|a| a.premium);

    Ok(EntitlementStatus {
        user_id: user_id.to_string(),
        active,
        expires_at,
        premium_author,
    })
}
