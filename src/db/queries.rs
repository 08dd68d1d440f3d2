use chrono::Utc;
use rusqlite::{Connection, params};

use crate::error::{AppError, Result};
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{
    AUTHOR_COLS, BUCKET_COLS, CHECKOUT_COLS, ENROLLMENT_COLS, PAYMENT_COLS, PROFILE_COLS,
    SUBSCRIPTION_COLS, query_all, query_one,
};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

const SECONDS_PER_DAY: i64 = 86400;

// ============ Profiles ============

pub fn create_profile(conn: &Connection, input: &CreateProfile) -> Result<Profile> {
    let now = now();
    conn.execute(
        "INSERT INTO profiles (id, role, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![&input.id, input.role.as_ref(), input.status.as_ref(), now],
    )?;

    Ok(Profile {
        id: input.id.clone(),
        role: input.role,
        status: input.status,
        subscription_status: None,
        subscription_expires_at: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_profile(conn: &Connection, id: &str) -> Result<Option<Profile>> {
    query_one(
        conn,
        &format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLS),
        &[&id],
    )
}

pub fn update_profile_status(conn: &Connection, id: &str, status: AccountStatus) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE profiles SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_ref(), now(), id],
    )?;
    Ok(affected > 0)
}

/// Mirror subscription state onto the profile. The expiry only moves
/// forward, so replaying an older activation never shortens access.
/// Returns false when the profile does not exist.
pub fn mirror_profile_subscription(
    conn: &Connection,
    user_id: &str,
    status: SubscriptionStatus,
    expires_at: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE profiles
         SET subscription_status = ?1,
             subscription_expires_at = MAX(COALESCE(subscription_expires_at, 0), ?2),
             updated_at = ?3
         WHERE id = ?4",
        params![status.as_ref(), expires_at, now(), user_id],
    )?;
    Ok(affected > 0)
}

// ============ Authors ============

pub fn get_author(conn: &Connection, user_id: &str) -> Result<Option<Author>> {
    query_one(
        conn,
        &format!("SELECT {} FROM authors WHERE user_id = ?1", AUTHOR_COLS),
        &[&user_id],
    )
}

pub fn create_author(conn: &Connection, user_id: &str) -> Result<Author> {
    let now = now();
    conn.execute(
        "INSERT INTO authors (user_id, premium, updated_at) VALUES (?1, 0, ?2)",
        params![user_id, now],
    )?;
    Ok(Author {
        user_id: user_id.to_string(),
        premium: false,
        updated_at: now,
    })
}

/// Set the premium-author flag, creating the author row if needed.
pub fn set_author_premium(conn: &Connection, user_id: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO authors (user_id, premium, updated_at) VALUES (?1, 1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET premium = 1, updated_at = excluded.updated_at",
        params![user_id, now()],
    )?;
    Ok(())
}

// ============ Subscriptions ============

/// Upsert an active subscription for (user, plan).
///
/// `renews_at` only moves forward: the later of the stored and the new
/// renewal time wins, so activations replayed in any order converge.
pub fn upsert_active_subscription(
    conn: &Connection,
    user_id: &str,
    plan: Plan,
    renews_at: i64,
) -> Result<Subscription> {
    let now = now();
    conn.query_row(
        &format!(
            "INSERT INTO subscriptions (id, user_id, plan_id, status, renews_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'active', ?4, ?5, ?5)
             ON CONFLICT(user_id, plan_id) DO UPDATE SET
                 status = 'active',
                 renews_at = MAX(COALESCE(subscriptions.renews_at, 0), excluded.renews_at),
                 updated_at = excluded.updated_at
             RETURNING {}",
            SUBSCRIPTION_COLS
        ),
        params![
            EntityType::Subscription.gen_id(),
            user_id,
            plan.as_ref(),
            renews_at,
            now
        ],
        <Subscription as super::from_row::FromRow>::from_row,
    )
    .map_err(Into::into)
}

pub fn list_subscriptions_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Subscription>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM subscriptions WHERE user_id = ?1 ORDER BY plan_id",
            SUBSCRIPTION_COLS
        ),
        &[&user_id],
    )
}

pub fn set_subscription_status(
    conn: &Connection,
    user_id: &str,
    plan: Plan,
    status: SubscriptionStatus,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE subscriptions SET status = ?1, updated_at = ?2 WHERE user_id = ?3 AND plan_id = ?4",
        params![status.as_ref(), now(), user_id, plan.as_ref()],
    )?;
    Ok(affected > 0)
}

/// Renewal time for an activation based at `base_time`.
pub fn renewal_from(base_time: i64) -> i64 {
    base_time + SUBSCRIPTION_PERIOD_DAYS * SECONDS_PER_DAY
}

// ============ Course Enrollments ============

pub fn get_enrollment(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
) -> Result<Option<CourseEnrollment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM course_enrollments WHERE user_id = ?1 AND course_id = ?2",
            ENROLLMENT_COLS
        ),
        &[&user_id, &course_id],
    )
}

pub fn list_enrollments_for_user(conn: &Connection, user_id: &str) -> Result<Vec<CourseEnrollment>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM course_enrollments WHERE user_id = ?1 ORDER BY created_at",
            ENROLLMENT_COLS
        ),
        &[&user_id],
    )
}

/// Enroll a user in a course unless already enrolled.
///
/// Checks for an existing row first; the UNIQUE(user_id, course_id)
/// constraint backs the check when two writers race past it.
/// Returns the enrollment and whether this call created it.
pub fn enroll_if_absent(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
) -> Result<(CourseEnrollment, bool)> {
    if let Some(existing) = get_enrollment(conn, user_id, course_id)? {
        return Ok((existing, false));
    }

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO course_enrollments (id, user_id, course_id, progress, created_at)
         VALUES (?1, ?2, ?3, 0, ?4)",
        params![EntityType::Enrollment.gen_id(), user_id, course_id, now()],
    )?;

    let enrollment = get_enrollment(conn, user_id, course_id)?
        .ok_or_else(|| AppError::Internal("Enrollment missing after insert".into()))?;
    Ok((enrollment, inserted > 0))
}

// ============ Payments ============

pub fn get_payment_by_ref(
    conn: &Connection,
    provider: &str,
    provider_ref: &str,
) -> Result<Option<PaymentRecord>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payments WHERE provider = ?1 AND provider_ref = ?2",
            PAYMENT_COLS
        ),
        &[&provider, &provider_ref],
    )
}

pub fn count_payments(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM payments", [], |row| row.get(0))
        .map_err(Into::into)
}

/// Record a payment at the idempotency boundary.
///
/// Inserts once per (provider, provider_ref). A repeat with a different
/// status updates the status only; "successful" is terminal and is never
/// overwritten.
pub fn record_payment(conn: &Connection, input: &NewPayment) -> Result<(PaymentRecord, PaymentWrite)> {
    let now = now();
    let event = serde_json::to_string(input.event)
        .map_err(|e| AppError::Internal(format!("Failed to encode payment event: {}", e)))?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO payments
             (id, user_id, provider, provider_ref, amount_cents, currency, status, event, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            EntityType::Payment.gen_id(),
            input.user_id,
            input.provider,
            input.provider_ref,
            input.amount_cents,
            input.currency,
            input.status,
            event,
            now,
        ],
    )?;

    let write = if inserted > 0 {
        PaymentWrite::Inserted
    } else {
        let updated = conn.execute(
            "UPDATE payments SET status = ?1, updated_at = ?2
             WHERE provider = ?3 AND provider_ref = ?4
               AND status != ?1 AND status != 'successful'",
            params![input.status, now, input.provider, input.provider_ref],
        )?;
        if updated > 0 {
            PaymentWrite::StatusUpdated
        } else {
            PaymentWrite::Duplicate
        }
    };

    let record = get_payment_by_ref(conn, input.provider, input.provider_ref)?
        .ok_or_else(|| AppError::Internal("Payment missing after insert".into()))?;
    Ok((record, write))
}

// ============ Checkouts ============

pub fn create_checkout(
    conn: &Connection,
    tx_ref: &str,
    purpose: Purpose,
    user_id: &str,
    course_id: Option<&str>,
    amount: i64,
    currency: &str,
) -> Result<Checkout> {
    let now = now();
    conn.execute(
        "INSERT INTO checkouts (tx_ref, purpose, user_id, course_id, amount, currency, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![tx_ref, purpose.as_ref(), user_id, course_id, amount, currency, now],
    )?;

    Ok(Checkout {
        tx_ref: tx_ref.to_string(),
        purpose,
        user_id: user_id.to_string(),
        course_id: course_id.map(String::from),
        amount,
        currency: currency.to_string(),
        created_at: now,
        completed_at: None,
    })
}

pub fn get_checkout(conn: &Connection, tx_ref: &str) -> Result<Option<Checkout>> {
    query_one(
        conn,
        &format!("SELECT {} FROM checkouts WHERE tx_ref = ?1", CHECKOUT_COLS),
        &[&tx_ref],
    )
}

/// Mark a checkout completed. Returns false if unknown or already completed.
pub fn complete_checkout(conn: &Connection, tx_ref: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE checkouts SET completed_at = ?1 WHERE tx_ref = ?2 AND completed_at IS NULL",
        params![now(), tx_ref],
    )?;
    Ok(affected > 0)
}

/// Delete abandoned checkouts older than the retention period.
/// Completed checkouts are kept.
pub fn purge_stale_checkouts(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - retention_days * SECONDS_PER_DAY;
    let deleted = conn.execute(
        "DELETE FROM checkouts WHERE completed_at IS NULL AND created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}

// ============ Storage Buckets ============

/// Register a bucket. Returns true if it did not exist yet.
pub fn ensure_bucket(conn: &Connection, name: &str, public: bool) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO storage_buckets (name, public, created_at) VALUES (?1, ?2, ?3)",
        params![name, public as i32, now()],
    )?;
    Ok(inserted > 0)
}

pub fn list_buckets(conn: &Connection) -> Result<Vec<StorageBucket>> {
    query_all(
        conn,
        &format!("SELECT {} FROM storage_buckets ORDER BY name", BUCKET_COLS),
        &[],
    )
}
