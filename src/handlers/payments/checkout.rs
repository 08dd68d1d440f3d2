use axum::extract::State;
use serde::Serialize;

use crate::config::Pricing;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::models::{CreateCheckout, Purpose};
use crate::payments::TxRef;

const DEFAULT_CURRENCY: &str = "NGN";

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub tx_ref: String,
    /// Provider public key for the hosted checkout, when configured
    pub public_key: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub purpose: Purpose,
}

fn default_amount(pricing: &Pricing, purpose: Purpose) -> Option<i64> {
    match purpose {
        Purpose::ReaderSubscription => Some(pricing.reader_monthly),
        Purpose::AuthorPremium => Some(pricing.author_monthly),
        Purpose::CoursePurchase => None,
    }
}

/// Start a checkout: mint a transaction reference and remember its intent.
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(request): Json<CreateCheckout>,
) -> Result<Json<CheckoutResponse>> {
    let course_id = match request.purpose {
        Purpose::CoursePurchase => Some(
            request
                .course_id
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| AppError::BadRequest(msg::COURSE_ID_REQUIRED.into()))?,
        ),
        _ => None,
    };

    let tx_ref = TxRef::new(request.purpose, &request.user_id, course_id)
        .map_err(|_| AppError::BadRequest(msg::INVALID_IDENTIFIER.into()))?;

    let amount = request
        .amount
        .or_else(|| default_amount(&state.pricing, request.purpose))
        .ok_or_else(|| AppError::BadRequest(msg::AMOUNT_REQUIRED.into()))?;
    if amount <= 0 {
        return Err(AppError::BadRequest("amount must be positive".into()));
    }

    let currency = request
        .currency
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    let conn = state.db.get()?;
    let checkout = queries::create_checkout(
        &conn,
        &tx_ref.to_string(),
        request.purpose,
        &request.user_id,
        course_id,
        amount,
        &currency,
    )?;

    tracing::info!(
        "Checkout {} started: {} for {}",
        checkout.tx_ref,
        checkout.purpose,
        checkout.user_id
    );

    Ok(Json(CheckoutResponse {
        tx_ref: checkout.tx_ref,
        public_key: state.flutterwave.public_key.clone(),
        amount: checkout.amount,
        currency: checkout.currency,
        purpose: checkout.purpose,
    }))
}
