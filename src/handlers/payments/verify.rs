use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::models::{NewPayment, Purpose, to_minor_units};
use crate::payments::{FlutterwaveClient, PROVIDER_FLUTTERWAVE};

use super::common::{PaymentIntent, STATUS_SUCCESSFUL, publish_changes, record_and_activate, resolve_intent};

/// Sent by the client after the hosted checkout reports success.
///
/// Every field is optional on the wire so that missing fields produce the
/// same 400 as empty ones.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyPaymentRequest {
    #[serde(default)]
    pub transaction_id: Option<i64>,
    #[serde(default)]
    pub tx_ref: Option<String>,
    #[serde(default)]
    pub purpose: Option<Purpose>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub course_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub ok: bool,
    /// Raw provider verification payload
    pub verify: serde_json::Value,
    pub purpose: Purpose,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    pub enrolled: bool,
    pub enrollment_created: bool,
}

struct ValidVerify {
    transaction_id: i64,
    tx_ref: String,
    intent: PaymentIntent,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl VerifyPaymentRequest {
    fn validate(self) -> Result<ValidVerify> {
        let transaction_id = self.transaction_id.filter(|id| *id > 0);
        let tx_ref = non_empty(self.tx_ref);
        let user_id = non_empty(self.user_id);

        let (Some(transaction_id), Some(tx_ref), Some(purpose), Some(user_id)) =
            (transaction_id, tx_ref, self.purpose, user_id)
        else {
            return Err(AppError::BadRequest(msg::MISSING_REQUIRED_FIELDS.into()));
        };

        let course_id = non_empty(self.course_id);
        if purpose == Purpose::CoursePurchase && course_id.is_none() {
            return Err(AppError::BadRequest(msg::COURSE_ID_REQUIRED.into()));
        }

        Ok(ValidVerify {
            transaction_id,
            tx_ref,
            intent: PaymentIntent {
                purpose,
                user_id,
                // Only course purchases carry a course.
                course_id: course_id.filter(|_| purpose == Purpose::CoursePurchase),
            },
        })
    }
}

/// Verify a transaction with Flutterwave and activate what it paid for.
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>> {
    let ValidVerify {
        transaction_id,
        tx_ref,
        intent,
    } = request.validate()?;

    let secret_key = state.flutterwave.require_secret_key()?;
    let client = FlutterwaveClient::new(
        state.http_client.clone(),
        secret_key,
        &state.flutterwave.api_base,
    );

    let verification = client.verify_transaction(transaction_id).await?;
    if !verification.is_successful() {
        tracing::info!(
            "Transaction {} for {} not successful, nothing activated",
            transaction_id,
            intent.user_id
        );
        return Err(AppError::PaymentNotVerified(verification.raw));
    }

    let Some(data) = verification.envelope.data.as_ref() else {
        return Err(AppError::PaymentNotVerified(verification.raw));
    };

    // The client names the transaction; the provider's answer must agree.
    if data.tx_ref.as_deref().is_some_and(|r| r != tx_ref) {
        tracing::warn!(
            "Transaction {} verified for tx_ref {:?}, client sent {}",
            transaction_id,
            data.tx_ref,
            tx_ref
        );
        return Err(AppError::BadRequest("Transaction does not match tx_ref".into()));
    }

    let mut conn = state.db.get()?;

    if let Some(resolved) = resolve_intent(&conn, &tx_ref)? {
        // Course purchases must also name the course the checkout was for.
        let course_matches =
            intent.purpose != Purpose::CoursePurchase || resolved.course_id == intent.course_id;
        if resolved.user_id != intent.user_id || resolved.purpose != intent.purpose || !course_matches
        {
            tracing::warn!(
                "Verify for {} ({}, {:?}) does not match checkout intent for {} ({}, {:?})",
                intent.user_id,
                intent.purpose,
                intent.course_id,
                resolved.user_id,
                resolved.purpose,
                resolved.course_id
            );
            return Err(AppError::BadRequest("Payment does not match checkout".into()));
        }
    }

    let provider_ref = data.provider_ref(&tx_ref);
    let payment = NewPayment {
        user_id: &intent.user_id,
        provider: PROVIDER_FLUTTERWAVE,
        provider_ref: &provider_ref,
        amount_cents: to_minor_units(data.amount.unwrap_or(0.0)),
        currency: data.currency_or_default(),
        status: STATUS_SUCCESSFUL,
        event: &verification.raw,
    };

    let outcome = record_and_activate(&mut conn, &intent, &payment, &tx_ref, true)?;
    publish_changes(&state.changes, &intent.user_id, &outcome);

    tracing::info!(
        "Verified payment {} ({:?}): {} for {}",
        provider_ref,
        outcome.payment_write,
        intent.purpose,
        intent.user_id
    );

    Ok(Json(VerifyPaymentResponse {
        ok: true,
        enrolled: outcome.enrolled(),
        enrollment_created: outcome.enrollment_created,
        purpose: intent.purpose,
        course_id: intent.course_id,
        verify: verification.raw,
    }))
}
