use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::common::*;
use aminid::error::msg;
use aminid::payments::TxRef;

fn verify_body(transaction_id: i64, tx_ref: &str, purpose: &str, user_id: &str) -> Value {
    json!({
        "transaction_id": transaction_id,
        "tx_ref": tx_ref,
        "purpose": purpose,
        "user_id": user_id,
    })
}

fn reader_ref(user_id: &str) -> String {
    TxRef::new(Purpose::ReaderSubscription, user_id, None)
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_verify_reader_subscription_activates() {
    let flw = FakeFlutterwave::start().await;
    let state = create_test_app_state(&flw.base_url);
    {
        let conn = state.db.get().unwrap();
        create_test_profile(&conn, "reader-1", Role::Reader);
    }

    let tx_ref = reader_ref("reader-1");
    flw.reply(1001, StatusCode::OK, verify_success(1001, &tx_ref, 2500.0));

    let (status, body) = post_json(
        app(state.clone()),
        "/api/payments/verify",
        verify_body(1001, &tx_ref, "reader_subscription", "reader-1"),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "verify should succeed: {}", body);
    assert_eq!(body["ok"], true);
    assert_eq!(body["purpose"], "reader_subscription");
    assert_eq!(body["enrolled"], false);
    assert_eq!(body["verify"]["data"]["status"], "successful");
    assert!(body.get("course_id").is_none());

    let conn = state.db.get().unwrap();
    let payment = queries::get_payment_by_ref(&conn, "flutterwave", "1001")
        .unwrap()
        .expect("payment should be recorded under the transaction id");
    assert_eq!(payment.user_id, "reader-1");
    assert_eq!(payment.status, "successful");
    assert_eq!(payment.amount_cents, 250_000);
    assert_eq!(payment.currency, "NGN");

    let subs = queries::list_subscriptions_for_user(&conn, "reader-1").unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].plan, Plan::ReaderMonthly);
    assert_eq!(subs[0].status, SubscriptionStatus::Active);
    assert_eq!(subs[0].renews_at, Some(queries::renewal_from(payment.created_at)));

    let profile = queries::get_profile(&conn, "reader-1").unwrap().unwrap();
    assert_eq!(profile.subscription_status, Some(SubscriptionStatus::Active));
    assert_eq!(profile.subscription_expires_at, subs[0].renews_at);
}

#[tokio::test]
async fn test_verify_twice_is_idempotent() {
    let flw = FakeFlutterwave::start().await;
    let state = create_test_app_state(&flw.base_url);
    {
        let conn = state.db.get().unwrap();
        create_test_profile(&conn, "reader-2", Role::Reader);
    }

    let tx_ref = reader_ref("reader-2");
    flw.reply(2002, StatusCode::OK, verify_success(2002, &tx_ref, 2500.0));
    let body = verify_body(2002, &tx_ref, "reader_subscription", "reader-2");

    let (first, _) = post_json(app(state.clone()), "/api/payments/verify", body.clone()).await;
    let renews_first = {
        let conn = state.db.get().unwrap();
        queries::list_subscriptions_for_user(&conn, "reader-2").unwrap()[0].renews_at
    };
    let (second, _) = post_json(app(state.clone()), "/api/payments/verify", body).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(flw.calls(), 2, "each call verifies with the provider");

    let conn = state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "payments"), 1);
    assert_eq!(count_rows(&conn, "subscriptions"), 1);
    let subs = queries::list_subscriptions_for_user(&conn, "reader-2").unwrap();
    assert_eq!(subs[0].renews_at, renews_first, "replay must not extend access");
}

#[tokio::test]
async fn test_verify_course_purchase_enrolls_once() {
    let flw = FakeFlutterwave::start().await;
    let state = create_test_app_state(&flw.base_url);

    let tx_ref = TxRef::new(Purpose::CoursePurchase, "student-1", Some("C1"))
        .unwrap()
        .to_string();
    flw.reply(3003, StatusCode::OK, verify_success(3003, &tx_ref, 15000.0));

    let mut body = verify_body(3003, &tx_ref, "course_purchase", "student-1");
    body["course_id"] = json!("C1");

    let (status, first) = post_json(app(state.clone()), "/api/payments/verify", body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["course_id"], "C1");
    assert_eq!(first["enrolled"], true);
    assert_eq!(first["enrollment_created"], true);

    let (status, second) = post_json(app(state.clone()), "/api/payments/verify", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["enrolled"], true);
    assert_eq!(second["enrollment_created"], false);

    let conn = state.db.get().unwrap();
    let enrollments = queries::list_enrollments_for_user(&conn, "student-1").unwrap();
    assert_eq!(enrollments.len(), 1);
    assert_eq!(enrollments[0].course_id, "C1");
    assert_eq!(enrollments[0].progress, 0);
    assert_eq!(count_rows(&conn, "payments"), 1);
    assert_eq!(count_rows(&conn, "subscriptions"), 0);
}

#[tokio::test]
async fn test_verify_author_premium_sets_flag() {
    let flw = FakeFlutterwave::start().await;
    let state = create_test_app_state(&flw.base_url);
    {
        let conn = state.db.get().unwrap();
        create_test_profile(&conn, "author-1", Role::Author);
    }

    let tx_ref = TxRef::new(Purpose::AuthorPremium, "author-1", None)
        .unwrap()
        .to_string();
    flw.reply(4004, StatusCode::OK, verify_success(4004, &tx_ref, 5000.0));

    let (status, _) = post_json(
        app(state.clone()),
        "/api/payments/verify",
        verify_body(4004, &tx_ref, "author_premium", "author-1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let conn = state.db.get().unwrap();
    let author = queries::get_author(&conn, "author-1").unwrap().unwrap();
    assert!(author.premium);
    let subs = queries::list_subscriptions_for_user(&conn, "author-1").unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].plan, Plan::AuthorMonthly);
}

#[tokio::test]
async fn test_verify_missing_fields_is_bad_request() {
    let flw = FakeFlutterwave::start().await;
    let state = create_test_app_state(&flw.base_url);

    let bodies = [
        json!({}),
        json!({ "tx_ref": "x", "purpose": "reader_subscription", "user_id": "u" }),
        json!({ "transaction_id": 1, "purpose": "reader_subscription", "user_id": "u" }),
        json!({ "transaction_id": 1, "tx_ref": "x", "user_id": "u" }),
        json!({ "transaction_id": 1, "tx_ref": "x", "purpose": "reader_subscription" }),
        json!({ "transaction_id": 1, "tx_ref": "", "purpose": "reader_subscription", "user_id": "u" }),
    ];

    for body in bodies {
        let (status, response) = post_json(app(state.clone()), "/api/payments/verify", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"], msg::MISSING_REQUIRED_FIELDS);
    }

    assert_eq!(flw.calls(), 0, "validation happens before any provider call");
    let conn = state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "payments"), 0);
}

#[tokio::test]
async fn test_verify_course_purchase_requires_course_id() {
    let flw = FakeFlutterwave::start().await;
    let state = create_test_app_state(&flw.base_url);

    let (status, body) = post_json(
        app(state),
        "/api/payments/verify",
        verify_body(5005, "course_purchase:u:C1:n", "course_purchase", "u"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], msg::COURSE_ID_REQUIRED);
    assert_eq!(flw.calls(), 0);
}

#[tokio::test]
async fn test_verify_without_secret_key_is_server_error() {
    let flw = FakeFlutterwave::start().await;
    let mut state = create_test_app_state(&flw.base_url);
    state.flutterwave.secret_key = None;

    let (status, body) = post_json(
        app(state),
        "/api/payments/verify",
        verify_body(6006, &reader_ref("u"), "reader_subscription", "u"),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], msg::MISSING_SECRET_KEY);
    assert_eq!(flw.calls(), 0);
}

#[tokio::test]
async fn test_verify_provider_unreachable_is_bad_gateway() {
    let state = create_test_app_state(UNREACHABLE_API);

    let (status, _) = post_json(
        app(state.clone()),
        "/api/payments/verify",
        verify_body(7007, &reader_ref("u"), "reader_subscription", "u"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let conn = state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "payments"), 0);
}

#[tokio::test]
async fn test_verify_unknown_transaction_is_bad_gateway() {
    let flw = FakeFlutterwave::start().await;
    let state = create_test_app_state(&flw.base_url);

    let (status, _) = post_json(
        app(state),
        "/api/payments/verify",
        verify_body(8008, &reader_ref("u"), "reader_subscription", "u"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(flw.calls(), 1);
}

#[tokio::test]
async fn test_verify_failed_transaction_writes_nothing() {
    let flw = FakeFlutterwave::start().await;
    let state = create_test_app_state(&flw.base_url);
    {
        let conn = state.db.get().unwrap();
        create_test_profile(&conn, "reader-3", Role::Reader);
    }

    let tx_ref = reader_ref("reader-3");
    flw.reply(9009, StatusCode::OK, verify_failed(9009, &tx_ref));

    let (status, body) = post_json(
        app(state.clone()),
        "/api/payments/verify",
        verify_body(9009, &tx_ref, "reader_subscription", "reader-3"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], msg::PAYMENT_NOT_SUCCESSFUL);
    assert_eq!(body["verify"]["data"]["status"], "failed");

    let conn = state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "payments"), 0);
    assert_eq!(count_rows(&conn, "subscriptions"), 0);
}

#[tokio::test]
async fn test_verify_rejects_tx_ref_mismatch() {
    let flw = FakeFlutterwave::start().await;
    let state = create_test_app_state(&flw.base_url);

    let real_ref = reader_ref("payer");
    flw.reply(1111, StatusCode::OK, verify_success(1111, &real_ref, 2500.0));

    let (status, _) = post_json(
        app(state.clone()),
        "/api/payments/verify",
        verify_body(1111, &reader_ref("someone-else"), "reader_subscription", "someone-else"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let conn = state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "subscriptions"), 0);
}

#[tokio::test]
async fn test_verify_rejects_user_not_matching_reference() {
    let flw = FakeFlutterwave::start().await;
    let state = create_test_app_state(&flw.base_url);

    let tx_ref = reader_ref("payer");
    flw.reply(1212, StatusCode::OK, verify_success(1212, &tx_ref, 2500.0));

    let (status, body) = post_json(
        app(state.clone()),
        "/api/payments/verify",
        verify_body(1212, &tx_ref, "reader_subscription", "freeloader"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    let conn = state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "payments"), 0);
    assert!(
        queries::list_subscriptions_for_user(&conn, "freeloader")
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_verify_rejects_course_not_in_reference() {
    let flw = FakeFlutterwave::start().await;
    let state = create_test_app_state(&flw.base_url);

    let tx_ref = TxRef::new(Purpose::CoursePurchase, "student-2", Some("C1"))
        .unwrap()
        .to_string();
    flw.reply(1313, StatusCode::OK, verify_success(1313, &tx_ref, 15000.0));

    let mut body = verify_body(1313, &tx_ref, "course_purchase", "student-2");
    body["course_id"] = json!("C2");

    let (status, response) = post_json(app(state.clone()), "/api/payments/verify", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", response);
    let conn = state.db.get().unwrap();
    assert_eq!(count_rows(&conn, "payments"), 0);
    assert_eq!(count_rows(&conn, "course_enrollments"), 0);
}

#[tokio::test]
async fn test_verify_rejects_course_not_in_checkout() {
    let flw = FakeFlutterwave::start().await;
    let state = create_test_app_state(&flw.base_url);

    let (status, checkout) = post_json(
        app(state.clone()),
        "/api/payments/checkout",
        json!({
            "purpose": "course_purchase",
            "user_id": "student-3",
            "course_id": "C1",
            "amount": 15000
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let tx_ref = checkout["tx_ref"].as_str().unwrap().to_string();
    flw.reply(1414, StatusCode::OK, verify_success(1414, &tx_ref, 15000.0));

    let mut body = verify_body(1414, &tx_ref, "course_purchase", "student-3");
    body["course_id"] = json!("C2");
    let (status, _) = post_json(app(state.clone()), "/api/payments/verify", body.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    body["course_id"] = json!("C1");
    let (status, response) = post_json(app(state.clone()), "/api/payments/verify", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["course_id"], "C1");

    let conn = state.db.get().unwrap();
    let enrollments = queries::list_enrollments_for_user(&conn, "student-3").unwrap();
    assert_eq!(enrollments.len(), 1);
    assert_eq!(enrollments[0].course_id, "C1");
}

#[tokio::test]
async fn test_verify_malformed_body_is_bad_request() {
    let state = create_test_app_state(UNREACHABLE_API);

    let (status, body) = post_webhook(app(state), "/api/payments/verify", None, "{not json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
