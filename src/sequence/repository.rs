//! Pledge Number Sequence
//!
//! Gap-tolerant, never-reusing pledge number allocation. Each
//! `(scheme_id, year)` pair owns one counter row; the increment is a single
//! atomic upsert, so concurrent callers each receive a distinct value with
//! no lost updates. A number handed out is consumed even if the caller
//! later fails, which keeps allocation contention-free.

use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use crate::db::is_transient;

/// Counter values beyond this cannot be issued. Four-digit padding widens
/// naturally above 9999; seven digits is the hard ceiling.
const MAX_COUNTER: i64 = 9_999_999;

/// Pledge Number Sequence Error
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("Pledge number sequence exhausted for scheme {scheme_id} year {year} (value {value})")]
    Exhausted {
        scheme_id: Uuid,
        year: i32,
        value: i64,
    },

    #[error("Pledge number prefix must not be empty")]
    InvalidPrefix,

    #[error("Sequence allocation failed after {attempts} attempts for scheme {scheme_id} year {year}")]
    RetriesExhausted {
        scheme_id: Uuid,
        year: i32,
        attempts: u32,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl SequenceError {
    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidPrefix)
    }
}

/// Format a pledge number from its parts.
///
/// Counters are zero-padded to four digits and widen beyond 9999 rather
/// than truncate, so numbers stay unique within a scheme and year.
pub fn format_pledge_number(prefix: &str, year: i32, value: i64) -> String {
    format!("{prefix}-{year}-{value:04}")
}

/// Allocator for human-facing pledge numbers
#[derive(Debug, Clone)]
pub struct PledgeNumberSequence {
    pool: PgPool,
}

impl PledgeNumberSequence {
    /// Create a new PledgeNumberSequence
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Allocate the next pledge number for a scheme and year.
    ///
    /// Transient serialization failures are retried with backoff; every
    /// successful call returns a value no other call has received.
    pub async fn next_pledge_number(
        &self,
        scheme_id: Uuid,
        company_id: Uuid,
        prefix: &str,
        year: i32,
    ) -> Result<String, SequenceError> {
        const MAX_RETRIES: u32 = 3;

        if prefix.is_empty() {
            return Err(SequenceError::InvalidPrefix);
        }

        for attempt in 0..MAX_RETRIES {
            match self.try_next_value(scheme_id, company_id, year).await {
                Ok(value) => {
                    if value > MAX_COUNTER {
                        return Err(SequenceError::Exhausted {
                            scheme_id,
                            year,
                            value,
                        });
                    }
                    return Ok(format_pledge_number(prefix, year, value));
                }
                Err(e) if is_transient(&e) && attempt < MAX_RETRIES - 1 => {
                    let delay = Duration::from_millis(50 * (attempt as u64 + 1));
                    tokio::time::sleep(delay).await;
                    tracing::warn!(
                        scheme_id = %scheme_id,
                        year = year,
                        "transient error allocating pledge number, retrying (attempt {}/{})",
                        attempt + 1,
                        MAX_RETRIES
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SequenceError::RetriesExhausted {
            scheme_id,
            year,
            attempts: MAX_RETRIES,
        })
    }

    /// Atomically increment and read the counter (single attempt).
    async fn try_next_value(
        &self,
        scheme_id: Uuid,
        company_id: Uuid,
        year: i32,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            INSERT INTO pledge_counters (scheme_id, year, company_id, value)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (scheme_id, year)
            DO UPDATE SET value = pledge_counters.value + 1, updated_at = NOW()
            RETURNING value
            "#,
        )
        .bind(scheme_id)
        .bind(year)
        .bind(company_id)
        .fetch_one(&self.pool)
        .await
    }

    /// Read the current counter value without consuming a number.
    pub async fn current_value(
        &self,
        scheme_id: Uuid,
        year: i32,
    ) -> Result<Option<i64>, SequenceError> {
        let value: Option<i64> = sqlx::query_scalar(
            "SELECT value FROM pledge_counters WHERE scheme_id = $1 AND year = $2",
        )
        .bind(scheme_id)
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pads_to_four_digits() {
        assert_eq!(format_pledge_number("GOLD", 2025, 1), "GOLD-2025-0001");
        assert_eq!(format_pledge_number("GOLD", 2025, 42), "GOLD-2025-0042");
        assert_eq!(format_pledge_number("GOLD", 2025, 9999), "GOLD-2025-9999");
    }

    #[test]
    fn test_format_widens_beyond_padding() {
        assert_eq!(format_pledge_number("GOLD", 2025, 10000), "GOLD-2025-10000");
        assert_eq!(
            format_pledge_number("GOLD", 2025, 1234567),
            "GOLD-2025-1234567"
        );
    }

    #[test]
    fn test_sequence_error_classification() {
        assert!(SequenceError::InvalidPrefix.is_client_error());

        let err = SequenceError::Exhausted {
            scheme_id: Uuid::nil(),
            year: 2025,
            value: MAX_COUNTER + 1,
        };
        assert!(!err.is_client_error());
        assert!(err.to_string().contains("2025"));
    }
}
