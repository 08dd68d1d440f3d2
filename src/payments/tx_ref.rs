//! Transaction reference codec.
//!
//! A reference carries checkout intent to the webhook as
//! `purpose:user_id[:course_id]:nonce`. `:` is reserved, so identifiers that
//! contain it are rejected when building a reference.

use std::fmt;

use thiserror::Error;

use crate::id::gen_nonce;
use crate::models::Purpose;

const DELIMITER: char = ':';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TxRefError {
    #[error("identifier is empty or contains ':'")]
    InvalidIdentifier,
    #[error("malformed transaction reference")]
    Malformed,
    #[error("unknown purpose: {0}")]
    UnknownPurpose(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRef {
    pub purpose: Purpose,
    pub user_id: String,
    pub course_id: Option<String>,
    pub nonce: String,
}

fn valid_identifier(s: &str) -> bool {
    !s.is_empty() && !s.contains(DELIMITER)
}

impl TxRef {
    /// Build a fresh reference with a random nonce.
    pub fn new(
        purpose: Purpose,
        user_id: &str,
        course_id: Option<&str>,
    ) -> Result<Self, TxRefError> {
        if !valid_identifier(user_id) || course_id.is_some_and(|c| !valid_identifier(c)) {
            return Err(TxRefError::InvalidIdentifier);
        }
        Ok(Self {
            purpose,
            user_id: user_id.to_string(),
            course_id: course_id.map(String::from),
            nonce: gen_nonce(),
        })
    }

    /// Parse a reference. Exactly three parts (no course) or four parts
    /// (with course) are accepted; every part must be non-empty.
    pub fn parse(s: &str) -> Result<Self, TxRefError> {
        let parts: Vec<&str> = s.split(DELIMITER).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(TxRefError::Malformed);
        }

        let (purpose, user_id, course_id, nonce) = match parts.as_slice() {
            [purpose, user, nonce] => (*purpose, *user, None, *nonce),
            [purpose, user, course, nonce] => (*purpose, *user, Some(*course), *nonce),
            _ => return Err(TxRefError::Malformed),
        };

        let purpose = purpose
            .parse::<Purpose>()
            .map_err(|_| TxRefError::UnknownPurpose(purpose.to_string()))?;

        Ok(Self {
            purpose,
            user_id: user_id.to_string(),
            course_id: course_id.map(String::from),
            nonce: nonce.to_string(),
        })
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.course_id {
            Some(course) => write!(
                f,
                "{}:{}:{}:{}",
                self.purpose, self.user_id, course, self.nonce
            ),
            None => write!(f, "{}:{}:{}", self.purpose, self.user_id, self.nonce),
        }
    }
}
