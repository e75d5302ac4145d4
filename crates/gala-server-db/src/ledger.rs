// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Idempotency ledger repository.
//!
//! The primary key on `webhook_ledger.event_id` is the only synchronization
//! point between concurrent deliveries. Claims are single statements: an
//! insert-if-absent, then a conditional re-claim update. Neither reads
//! before writing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use sqlx::SqlitePool;
use tracing::instrument;

use gala_identity_core::{Claim, LedgerEntry, LedgerOutcome};

use crate::error::{DbError, Result};
use crate::{format_timestamp, parse_timestamp};

#[async_trait]
pub trait LedgerStore: Send + Sync {
	/// Claim `event_id` for processing.
	///
	/// A new id, a `failed` row, or a `processing` row whose claim is older
	/// than `lease` is claimed. Anything else is reported as already claimed.
	async fn try_claim(
		&self,
		event_id: &str,
		event_type: &str,
		now: DateTime<Utc>,
		lease: Duration,
	) -> Result<Claim>;

	/// Record the terminal outcome of the claim identified by `attempt`.
	///
	/// Returns false when the row is no longer in `processing` under that
	/// attempt (the claim was taken over or already completed).
	async fn complete(
		&self,
		event_id: &str,
		attempt: u32,
		outcome: LedgerOutcome,
		error: Option<&str>,
		now: DateTime<Utc>,
	) -> Result<bool>;

	async fn get(&self, event_id: &str) -> Result<Option<LedgerEntry>>;

	async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of the ledger.
#[derive(Clone)]
pub struct SqliteLedgerRepository {
	pool: SqlitePool,
}

impl SqliteLedgerRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

type LedgerRow = (
	String,
	String,
	String,
	i64,
	String,
	Option<String>,
	Option<String>,
);

fn entry_from_row(row: LedgerRow) -> Result<LedgerEntry> {
	let (event_id, event_type, outcome, attempts, claimed_at, processed_at, error) = row;
	Ok(LedgerEntry {
		event_id,
		event_type,
		outcome: outcome.parse().map_err(DbError::Internal)?,
		attempts: u32::try_from(attempts)
			.map_err(|_| DbError::Internal(format!("invalid attempts: {attempts}")))?,
		claimed_at: parse_timestamp(&claimed_at)?,
		processed_at: processed_at.as_deref().map(parse_timestamp).transpose()?,
		error,
	})
}

#[async_trait]
impl LedgerStore for SqliteLedgerRepository {
	#[instrument(skip(self))]
	async fn try_claim(
		&self,
		event_id: &str,
		event_type: &str,
		now: DateTime<Utc>,
		lease: Duration,
	) -> Result<Claim> {
		let now_str = format_timestamp(now);

		let inserted = sqlx::query(
			r#"
			INSERT INTO webhook_ledger (event_id, event_type, outcome, attempts, claimed_at)
			VALUES (?, ?, 'processing', 1, ?)
			ON CONFLICT(event_id) DO NOTHING
			"#,
		)
		.bind(event_id)
		.bind(event_type)
		.bind(&now_str)
		.execute(&self.pool)
		.await?;

		if inserted.rows_affected() == 1 {
			return Ok(Claim::Claimed { attempt: 1 });
		}

		let lease = chrono::Duration::from_std(lease)
			.map_err(|e| DbError::Internal(format!("invalid claim lease: {e}")))?;
		let lease_cutoff = format_timestamp(now - lease);
		let reclaimed: Option<(i64,)> = sqlx::query_as(
			r#"
			UPDATE webhook_ledger
			SET outcome = 'processing',
				attempts = attempts + 1,
				claimed_at = ?,
				processed_at = NULL,
				error = NULL
			WHERE event_id = ?
				AND (outcome = 'failed' OR (outcome = 'processing' AND claimed_at < ?))
			RETURNING attempts
			"#,
		)
		.bind(&now_str)
		.bind(event_id)
		.bind(&lease_cutoff)
		.fetch_optional(&self.pool)
		.await?;

		if let Some((attempts,)) = reclaimed {
			let attempt = u32::try_from(attempts)
				.map_err(|_| DbError::Internal(format!("invalid attempts: {attempts}")))?;
			tracing::info!(event_id, attempt, "re-claimed ledger entry");
			return Ok(Claim::Claimed { attempt });
		}

		let outcome: Option<(String,)> =
			sqlx::query_as("SELECT outcome FROM webhook_ledger WHERE event_id = ?")
				.bind(event_id)
				.fetch_optional(&self.pool)
				.await?;

		match outcome {
			Some((outcome,)) => Ok(Claim::AlreadyClaimed {
				outcome: outcome.parse().map_err(DbError::Internal)?,
			}),
			None => Err(DbError::NotFound(event_id.to_string())),
		}
	}

	#[instrument(skip(self, error))]
	async fn complete(
		&self,
		event_id: &str,
		attempt: u32,
		outcome: LedgerOutcome,
		error: Option<&str>,
		now: DateTime<Utc>,
	) -> Result<bool> {
		if !outcome.is_terminal() {
			return Err(DbError::Internal(format!(
				"cannot complete ledger entry with outcome {outcome}"
			)));
		}

		let result = sqlx::query(
			r#"
			UPDATE webhook_ledger
			SET outcome = ?, processed_at = ?, error = ?
			WHERE event_id = ? AND attempts = ? AND outcome = 'processing'
			"#,
		)
		.bind(outcome.as_str())
		.bind(format_timestamp(now))
		.bind(error)
		.bind(event_id)
		.bind(i64::from(attempt))
		.execute(&self.pool)
		.await?;

		let updated = result.rows_affected() == 1;
		if !updated {
			tracing::warn!(event_id, attempt, %outcome, "ledger entry no longer held by this claim");
		}
		Ok(updated)
	}

	#[instrument(skip(self))]
	async fn get(&self, event_id: &str) -> Result<Option<LedgerEntry>> {
		let row = sqlx::query_as::<_, LedgerRow>(
			r#"
			SELECT event_id, event_type, outcome, attempts, claimed_at, processed_at, error
			FROM webhook_ledger
			WHERE event_id = ?
			"#,
		)
		.bind(event_id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(entry_from_row).transpose()
	}

	#[instrument(skip(self))]
	async fn count(&self) -> Result<i64> {
		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM webhook_ledger")
			.fetch_one(&self.pool)
			.await?;
		Ok(count)
	}
}
