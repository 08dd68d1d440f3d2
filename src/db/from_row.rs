//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Like `parse_enum` for nullable columns.
fn parse_enum_opt<T: std::str::FromStr>(
    row: &Row,
    col: usize,
    col_name: &str,
) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<String>>(col)? {
        Some(s) => s.parse::<T>().map(Some).map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                col,
                col_name.to_string(),
                rusqlite::types::Type::Text,
            )
        }),
        None => Ok(None),
    }
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const PROFILE_COLS: &str =
    "id, role, status, subscription_status, subscription_expires_at, created_at, updated_at";

pub const AUTHOR_COLS: &str = "user_id, premium, updated_at";

pub const SUBSCRIPTION_COLS: &str =
    "id, user_id, plan_id, status, renews_at, created_at, updated_at";

pub const ENROLLMENT_COLS: &str = "id, user_id, course_id, progress, created_at";

pub const PAYMENT_COLS: &str = "id, user_id, provider, provider_ref, amount_cents, currency, status, event, created_at, updated_at";

pub const CHECKOUT_COLS: &str =
    "tx_ref, purpose, user_id, course_id, amount, currency, created_at, completed_at";

pub const BUCKET_COLS: &str = "name, public, created_at";

// ============ FromRow Implementations ============

impl FromRow for Profile {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Profile {
            id: row.get(0)?,
            role: parse_enum(row, 1, "role")?,
            status: parse_enum(row, 2, "status")?,
            subscription_status: parse_enum_opt(row, 3, "subscription_status")?,
            subscription_expires_at: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl FromRow for Author {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Author {
            user_id: row.get(0)?,
            premium: row.get::<_, i32>(1)? != 0,
            updated_at: row.get(2)?,
        })
    }
}

impl FromRow for Subscription {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Subscription {
            id: row.get(0)?,
            user_id: row.get(1)?,
            plan: parse_enum(row, 2, "plan_id")?,
            status: parse_enum(row, 3, "status")?,
            renews_at: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl FromRow for CourseEnrollment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CourseEnrollment {
            id: row.get(0)?,
            user_id: row.get(1)?,
            course_id: row.get(2)?,
            progress: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for PaymentRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PaymentRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            provider: row.get(2)?,
            provider_ref: row.get(3)?,
            amount_cents: row.get(4)?,
            currency: row.get(5)?,
            status: row.get(6)?,
            event: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for Checkout {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Checkout {
            tx_ref: row.get(0)?,
            purpose: parse_enum(row, 1, "purpose")?,
            user_id: row.get(2)?,
            course_id: row.get(3)?,
            amount: row.get(4)?,
            currency: row.get(5)?,
            created_at: row.get(6)?,
            completed_at: row.get(7)?,
        })
    }
}

impl FromRow for StorageBucket {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(StorageBucket {
            name: row.get(0)?,
            public: row.get::<_, i32>(1)? != 0,
            created_at: row.get(2)?,
        })
    }
}
