//! Aminid entitlement relay.
//!
//! Confirms Flutterwave payments, activates what they paid for
//! (subscriptions, author premium, course enrollments), and answers
//! premium-gating questions for the publishing frontend.

pub mod access;
pub mod config;
pub mod db;
pub mod entitlements;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod models;
pub mod payments;
pub mod rate_limit;
pub mod storage;
