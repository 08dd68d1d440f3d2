mod schema;
pub mod from_row;
pub mod queries;

pub use schema::init_db;

use std::path::PathBuf;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::{FlutterwaveConfig, Pricing};
use crate::entitlements::ChangeHub;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Entitlement store (profiles, subscriptions, payments, enrollments, ...)
    pub db: DbPool,
    /// Shared HTTP client for payment provider calls
    pub http_client: reqwest::Client,
    pub flutterwave: FlutterwaveConfig,
    pub pricing: Pricing,
    /// Directory under which storage buckets are created
    pub storage_root: PathBuf,
    pub ping_message: String,
    /// Entitlement change notifications for live watches
    pub changes: ChangeHub,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
    });
    Pool::builder().max_size(10).build(manager)
}
