//! Per-IP rate limiting for public endpoints.
//!
//! Tiers:
//! - Payments: /api/payments/verify and /api/payments/checkout (provider calls)
//! - Standard: access evaluation, entitlements, storage, ping
//!
//! Webhooks are authenticated by the provider secret and are not limited.
//!
//! Configure via environment variables:
//! - RATE_LIMIT_PAYMENTS_RPM (default: 20)
//! - RATE_LIMIT_STANDARD_RPM (default: 60)

use std::sync::Arc;
use std::time::Duration;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;

pub type RateLimitLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// A limiter allowing bursts of `requests_per_minute`, replenished evenly
/// over the minute. Zero is treated as one.
fn create_layer(requests_per_minute: u32) -> RateLimitLayer {
    let rpm = requests_per_minute.max(1);
    let replenish_ms = (60_000 / rpm as u64).max(1);

    let config = GovernorConfigBuilder::default()
        .period(Duration::from_millis(replenish_ms))
        .burst_size(rpm)
        .finish()
        .expect("period and burst size are non-zero");

    GovernorLayer::new(Arc::new(config))
}

pub fn payments_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}

pub fn standard_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}
