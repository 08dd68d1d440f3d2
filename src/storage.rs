//! File storage buckets.
//!
//! A bucket is a metadata row plus a directory under the storage root.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{AppError, Result};

/// Buckets every deployment needs: profile avatars and course cover images.
pub const DEFAULT_BUCKETS: [&str; 2] = ["avatars", "course-covers"];

pub fn bucket_dir(root: &Path, name: &str) -> PathBuf {
    root.join(name)
}

fn valid_bucket_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// Create a public bucket if it does not exist. Safe to repeat.
/// Returns true when the bucket row was new.
pub fn ensure_bucket(conn: &Connection, root: &Path, name: &str) -> Result<bool> {
    if !valid_bucket_name(name) {
        return Err(AppError::BadRequest(format!("Invalid bucket name: {}", name)));
    }

    fs::create_dir_all(bucket_dir(root, name))?;
    let created = queries::ensure_bucket(conn, name, true)?;
    if created {
        tracing::info!("Created storage bucket {}", name);
    }
    Ok(created)
}

/// Ensure all [`DEFAULT_BUCKETS`] exist and return their names.
pub fn ensure_default_buckets(conn: &Connection, root: &Path) -> Result<Vec<String>> {
    for name in DEFAULT_BUCKETS {
        ensure_bucket(conn, root, name)?;
    }
    Ok(DEFAULT_BUCKETS.iter().map(|s| s.to_string()).collect())
}
