use std::env;

use crate::error::{AppError, msg};

/// Flutterwave credentials and endpoint.
///
/// Secrets are optional at load time; the operation that needs one fails
/// with [`AppError::Config`] when it is absent.
#[derive(Debug, Clone, Default)]
pub struct FlutterwaveConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub public_key: Option<String>,
    pub api_base: String,
}

impl FlutterwaveConfig {
    pub const DEFAULT_API_BASE: &'static str = "https://api.flutterwave.com";

    pub fn require_secret_key(&self) -> Result<&str, AppError> {
        self.secret_key
            .as_deref()
            .ok_or(AppError::Config(msg::MISSING_SECRET_KEY))
    }

    pub fn require_webhook_secret(&self) -> Result<&str, AppError> {
        self.webhook_secret
            .as_deref()
            .ok_or(AppError::Config(msg::MISSING_WEBHOOK_SECRET))
    }
}

/// Default checkout prices in whole naira.
#[derive(Debug, Clone, Copy)]
pub struct Pricing {
    pub reader_monthly: i64,
    pub author_monthly: i64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            reader_monthly: 2500,
            author_monthly: 5000,
        }
    }
}

/// Per-IP request limits for public routes.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub payments_rpm: u32,
    pub standard_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            payments_rpm: 20,
            standard_rpm: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub storage_root: String,
    pub flutterwave: FlutterwaveConfig,
    pub pricing: Pricing,
    pub rate_limit: RateLimitConfig,
    pub checkout_retention_days: i64,
    pub ping_message: String,
    pub dev_mode: bool,
}

/// Read a variable, falling back to its `VITE_`-prefixed form.
fn env_with_vite_fallback(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .or_else(|| env::var(format!("VITE_{}", name)).ok())
        .filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("AMINID_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env_parse("PORT", 3000);

        let defaults = Pricing::default();
        let rate_defaults = RateLimitConfig::default();

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "aminid.db".to_string()),
            storage_root: env::var("STORAGE_ROOT").unwrap_or_else(|_| "storage".to_string()),
            flutterwave: FlutterwaveConfig {
                secret_key: env_with_vite_fallback("FLW_SECRET_KEY"),
                webhook_secret: env_with_vite_fallback("FLW_WEBHOOK_SECRET"),
                public_key: env_with_vite_fallback("FLW_PUBLIC_KEY"),
                api_base: env::var("FLW_API_BASE")
                    .unwrap_or_else(|_| FlutterwaveConfig::DEFAULT_API_BASE.to_string()),
            },
            pricing: Pricing {
                reader_monthly: env_parse("READER_PRICE_NGN", defaults.reader_monthly),
                author_monthly: env_parse("AUTHOR_PRICE_NGN", defaults.author_monthly),
            },
            rate_limit: RateLimitConfig {
                payments_rpm: env_parse("RATE_LIMIT_PAYMENTS_RPM", rate_defaults.payments_rpm),
                standard_rpm: env_parse("RATE_LIMIT_STANDARD_RPM", rate_defaults.standard_rpm),
            },
            checkout_retention_days: env_parse("CHECKOUT_RETENTION_DAYS", 7),
            ping_message: env::var("PING_MESSAGE").unwrap_or_else(|_| "ping".to_string()),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
