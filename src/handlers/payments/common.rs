//! Activation logic shared by the client verify path and the provider webhook.
//!
//! Both entry points funnel into [`record_and_activate`], which writes the
//! payment at the idempotency boundary and then applies the entitlement for
//! the payment's purpose. Every write is an upsert or an existence-checked
//! insert, so the two paths converge however they interleave.

use rusqlite::Connection;

use crate::db::queries;
use crate::entitlements::{ChangeHub, ChangedTable};
use crate::error::Result;
use crate::models::{
    Checkout, CourseEnrollment, NewPayment, PaymentRecord, PaymentWrite, Purpose, Subscription,
    SubscriptionStatus,
};
use crate::payments::TxRef;

/// Provider status that unlocks an entitlement.
pub const STATUS_SUCCESSFUL: &str = "successful";

/// Who paid and what the payment unlocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub purpose: Purpose,
    pub user_id: String,
    pub course_id: Option<String>,
}

impl From<TxRef> for PaymentIntent {
    fn from(tx_ref: TxRef) -> Self {
        Self {
            purpose: tx_ref.purpose,
            user_id: tx_ref.user_id,
            course_id: tx_ref.course_id,
        }
    }
}

impl From<Checkout> for PaymentIntent {
    fn from(checkout: Checkout) -> Self {
        Self {
            purpose: checkout.purpose,
            user_id: checkout.user_id,
            course_id: checkout.course_id,
        }
    }
}

/// Look up the intent behind a transaction reference.
///
/// The pending checkout row wins; without one the reference string itself
/// is parsed. `None` means the reference is not actionable.
pub fn resolve_intent(conn: &Connection, tx_ref: &str) -> Result<Option<PaymentIntent>> {
    if tx_ref.is_empty() {
        return Ok(None);
    }

    if let Some(checkout) = queries::get_checkout(conn, tx_ref)? {
        return Ok(Some(checkout.into()));
    }

    match TxRef::parse(tx_ref) {
        Ok(parsed) => Ok(Some(parsed.into())),
        Err(e) => {
            tracing::debug!("Unparseable tx_ref {:?}: {}", tx_ref, e);
            Ok(None)
        }
    }
}

/// What a single invocation did.
#[derive(Debug, Clone)]
pub struct ActivationOutcome {
    pub payment: PaymentRecord,
    pub payment_write: PaymentWrite,
    pub activated: bool,
    pub subscription: Option<Subscription>,
    pub enrollment: Option<CourseEnrollment>,
    /// True only when this invocation inserted the enrollment row.
    pub enrollment_created: bool,
    pub changed: Vec<ChangedTable>,
}

impl ActivationOutcome {
    pub fn enrolled(&self) -> bool {
        self.enrollment.is_some()
    }
}

/// Record the payment and, when `activate` is set, apply its entitlement.
///
/// Runs in one SQLite transaction. A repeated payment reference does not add
/// a row, but activation still runs so retries converge. The renewal time
/// derives from the payment row, not the wall clock, so replays write the
/// same values.
pub fn record_and_activate(
    conn: &mut Connection,
    intent: &PaymentIntent,
    payment: &NewPayment,
    tx_ref: &str,
    activate: bool,
) -> Result<ActivationOutcome> {
    let tx = conn.transaction()?;

    let (record, payment_write) = queries::record_payment(&tx, payment)?;

    let mut outcome = ActivationOutcome {
        activated: false,
        subscription: None,
        enrollment: None,
        enrollment_created: false,
        changed: Vec::new(),
        payment_write,
        payment: record,
    };

    if activate {
        apply_entitlement(&tx, intent, outcome.payment.created_at, &mut outcome)?;
        queries::complete_checkout(&tx, tx_ref)?;
    }

    tx.commit()?;
    Ok(outcome)
}

fn apply_entitlement(
    conn: &Connection,
    intent: &PaymentIntent,
    base_time: i64,
    outcome: &mut ActivationOutcome,
) -> Result<()> {
    let user_id = intent.user_id.as_str();

    if let Some(plan) = intent.purpose.plan() {
        let subscription =
            queries::upsert_active_subscription(conn, user_id, plan, queries::renewal_from(base_time))?;
        let expires_at = subscription
            .renews_at
            .unwrap_or_else(|| queries::renewal_from(base_time));

        if queries::mirror_profile_subscription(conn, user_id, SubscriptionStatus::Active, expires_at)? {
            outcome.changed.push(ChangedTable::Profiles);
        } else {
            tracing::debug!("No profile for {}, subscription not mirrored", user_id);
        }

        outcome.subscription = Some(subscription);
        outcome.changed.push(ChangedTable::Subscriptions);
        outcome.activated = true;
    }

    match intent.purpose {
        Purpose::AuthorPremium => {
            queries::set_author_premium(conn, user_id)?;
            outcome.changed.push(ChangedTable::Authors);
        }
        Purpose::CoursePurchase => match intent.course_id.as_deref() {
            Some(course_id) => {
                let (enrollment, created) = queries::enroll_if_absent(conn, user_id, course_id)?;
                outcome.enrollment = Some(enrollment);
                outcome.enrollment_created = created;
                outcome.changed.push(ChangedTable::Enrollments);
                outcome.activated = true;
            }
            None => {
                tracing::warn!(
                    "Course purchase by {} has no course_id, nothing to enroll",
                    user_id
                );
            }
        },
        Purpose::ReaderSubscription => {}
    }

    Ok(())
}

/// Notify live watches after a committed activation.
pub fn publish_changes(hub: &ChangeHub, user_id: &str, outcome: &ActivationOutcome) {
    for table in &outcome.changed {
        hub.publish(user_id, *table);
    }
}
