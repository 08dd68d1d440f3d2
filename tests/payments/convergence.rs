//! The client verify path and the provider webhook may both fire for one
//! transaction, in either order or at once. They must land on the same rows.

use axum::http::StatusCode;
use serde_json::json;

use crate::common::*;
use aminid::payments::TxRef;

struct Setup {
    flw: FakeFlutterwave,
    state: AppState,
    verify: serde_json::Value,
    event: Vec<u8>,
}

impl Setup {
    fn flw_ref(&self) -> String {
        self.verify["transaction_id"].to_string()
    }
}

async fn setup(transaction_id: i64, purpose: Purpose, course_id: Option<&str>) -> Setup {
    let flw = FakeFlutterwave::start().await;
    let state = create_test_app_state(&flw.base_url);
    {
        let conn = state.db.get().unwrap();
        create_test_profile(&conn, "payer", Role::Reader);
    }

    let tx_ref = TxRef::new(purpose, "payer", course_id).unwrap().to_string();
    flw.reply(
        transaction_id,
        StatusCode::OK,
        verify_success(transaction_id, &tx_ref, 2500.0),
    );

    let mut verify = json!({
        "transaction_id": transaction_id,
        "tx_ref": tx_ref,
        "purpose": purpose,
        "user_id": "payer",
    });
    if let Some(course_id) = course_id {
        verify["course_id"] = json!(course_id);
    }
    let event =
        serde_json::to_vec(&charge_event(transaction_id, &tx_ref, "successful", 2500.0)).unwrap();

    Setup {
        flw,
        state,
        verify,
        event,
    }
}

async fn call_verify(s: &Setup) -> StatusCode {
    post_json(app(s.state.clone()), "/api/payments/verify", s.verify.clone())
        .await
        .0
}

async fn call_webhook(s: &Setup) -> StatusCode {
    post_webhook(
        app(s.state.clone()),
        "/api/payments/webhook",
        Some(WEBHOOK_SECRET),
        s.event.clone(),
    )
    .await
    .0
}

fn assert_single_subscription(s: &Setup) -> Subscription {
    let conn = s.state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "payments"), 1);
    let subs = queries::list_subscriptions_for_user(&conn, "payer").unwrap();
    assert_eq!(subs.len(), 1, "exactly one subscription row");
    assert_eq!(subs[0].status, SubscriptionStatus::Active);

    let payment = queries::get_payment_by_ref(&conn, "flutterwave", &s.flw_ref())
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, "successful");
    assert_eq!(subs[0].renews_at, Some(queries::renewal_from(payment.created_at)));
    subs[0].clone()
}

#[tokio::test]
async fn test_verify_then_webhook_converges() {
    let s = setup(7001, Purpose::ReaderSubscription, None).await;

    assert_eq!(call_verify(&s).await, StatusCode::OK);
    assert_eq!(call_webhook(&s).await, StatusCode::OK);

    assert_single_subscription(&s);
    assert_eq!(s.flw.calls(), 1);
}

#[tokio::test]
async fn test_webhook_then_verify_converges() {
    let s = setup(7002, Purpose::ReaderSubscription, None).await;

    assert_eq!(call_webhook(&s).await, StatusCode::OK);
    let after_webhook = assert_single_subscription(&s);

    assert_eq!(call_verify(&s).await, StatusCode::OK);
    let after_verify = assert_single_subscription(&s);

    assert_eq!(after_webhook.id, after_verify.id);
    assert_eq!(after_webhook.renews_at, after_verify.renews_at);
}

#[tokio::test]
async fn test_concurrent_verify_and_webhook_converge() {
    let s = setup(7003, Purpose::ReaderSubscription, None).await;

    let (verify, webhook) = tokio::join!(call_verify(&s), call_webhook(&s));
    assert_eq!(verify, StatusCode::OK);
    assert_eq!(webhook, StatusCode::OK);

    assert_single_subscription(&s);
}

#[tokio::test]
async fn test_repeated_mixed_deliveries_converge() {
    let s = setup(7004, Purpose::ReaderSubscription, None).await;

    call_webhook(&s).await;
    call_verify(&s).await;
    call_webhook(&s).await;
    call_verify(&s).await;

    let sub = assert_single_subscription(&s);
    let conn = s.state.db.get().unwrap();
    let profile = queries::get_profile(&conn, "payer").unwrap().unwrap();
    assert_eq!(profile.subscription_expires_at, sub.renews_at);
}

#[tokio::test]
async fn test_course_purchase_both_paths_enroll_once() {
    let s = setup(7005, Purpose::CoursePurchase, Some("C1")).await;

    let (verify, webhook) = tokio::join!(call_verify(&s), call_webhook(&s));
    assert_eq!(verify, StatusCode::OK);
    assert_eq!(webhook, StatusCode::OK);
    call_verify(&s).await;

    let conn = s.state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "payments"), 1);
    let enrollments = queries::list_enrollments_for_user(&conn, "payer").unwrap();
    assert_eq!(enrollments.len(), 1);
    assert_eq!(enrollments[0].course_id, "C1");
}

#[tokio::test]
async fn test_verify_with_other_course_cannot_double_enroll() {
    let mut s = setup(7006, Purpose::CoursePurchase, Some("C1")).await;
    s.verify["course_id"] = json!("C2");

    let verify = call_verify(&s).await;
    let webhook = call_webhook(&s).await;
    assert_eq!(verify, StatusCode::BAD_REQUEST);
    assert_eq!(webhook, StatusCode::OK);

    let conn = s.state.db.get().unwrap();
    let enrollments = queries::list_enrollments_for_user(&conn, "payer").unwrap();
    assert_eq!(enrollments.len(), 1);
    assert_eq!(enrollments[0].course_id, "C1");
    assert_eq!(count_rows(&conn, "payments"), 1);
}
