use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

/// Header carrying the pre-shared webhook secret.
pub const WEBHOOK_HASH_HEADER: &str = "verif-hash";

const VERIFY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct FlutterwaveClient {
    client: Client,
    secret_key: String,
    api_base: String,
}

impl FlutterwaveClient {
    pub fn new(client: Client, secret_key: &str, api_base: &str) -> Self {
        Self {
            client,
            secret_key: secret_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Ask Flutterwave whether a transaction exists and how it ended.
    ///
    /// Transport failures and non-2xx replies are errors. A reply that parses
    /// but reports a failed transaction is returned as-is; callers check
    /// [`Verification::is_successful`].
    pub async fn verify_transaction(&self, transaction_id: i64) -> Result<Verification> {
        let url = format!(
            "{}/v3/transactions/{}/verify",
            self.api_base, transaction_id
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .timeout(VERIFY_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("Flutterwave API error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::PaymentProvider(format!(
                "Flutterwave verify failed: {} {}",
                status, error_text
            )));
        }

        let raw: serde_json::Value = response.json().await.map_err(|e| {
            AppError::PaymentProvider(format!("Failed to parse Flutterwave response: {}", e))
        })?;

        Verification::from_raw(raw)
    }
}

/// A verification reply: the raw payload plus the fields we act on.
#[derive(Debug, Clone)]
pub struct Verification {
    pub raw: serde_json::Value,
    pub envelope: VerifyEnvelope,
}

impl Verification {
    pub fn from_raw(raw: serde_json::Value) -> Result<Self> {
        let envelope: VerifyEnvelope = serde_json::from_value(raw.clone()).map_err(|e| {
            AppError::PaymentProvider(format!("Unexpected Flutterwave response: {}", e))
        })?;
        Ok(Self { raw, envelope })
    }

    /// True only when the call succeeded and the transaction itself did.
    pub fn is_successful(&self) -> bool {
        self.envelope.status.as_deref() == Some("success")
            && self
                .envelope
                .data
                .as_ref()
                .and_then(|d| d.status.as_deref())
                == Some("successful")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyEnvelope {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub data: Option<TransactionData>,
}

/// Transaction fields shared by verify replies and webhook events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionData {
    /// Flutterwave transaction id (numeric on the wire).
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub tx_ref: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl TransactionData {
    /// Provider reference used as the payment idempotency key: the
    /// transaction id when present, else the supplied fallback.
    pub fn provider_ref(&self, fallback: &str) -> String {
        match &self.id {
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            _ => fallback.to_string(),
        }
    }

    pub fn currency_or_default(&self) -> &str {
        self.currency.as_deref().unwrap_or("NGN")
    }
}

/// Webhook body. Flutterwave puts the transaction under `data`; some event
/// shapes also carry a top-level `status`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: TransactionData,
    #[serde(default)]
    pub status: Option<String>,
}

impl WebhookEnvelope {
    pub fn transaction_status(&self) -> &str {
        self.data
            .status
            .as_deref()
            .or(self.status.as_deref())
            .unwrap_or("")
    }
}

/// Compare the `verif-hash` header with the pre-shared secret.
pub fn verify_webhook_hash(secret: &str, provided: &str) -> bool {
    let expected = secret.as_bytes();
    let provided = provided.as_bytes();

    // Length is not secret; the contents are.
    if expected.len() != provided.len() {
        return false;
    }

    expected.ct_eq(provided).into()
}
