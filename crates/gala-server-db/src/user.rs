// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User repository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::instrument;
use uuid::Uuid;

use gala_identity_core::{NewUser, UserId, UserRecord};

use crate::error::{DbError, Result};
use crate::{format_timestamp, parse_timestamp};

/// Result of an upsert by external id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
	Created(UserRecord),
	AlreadyExisted(UserRecord),
}

impl UpsertOutcome {
	pub fn record(&self) -> &UserRecord {
		match self {
			Self::Created(record) | Self::AlreadyExisted(record) => record,
		}
	}

	pub fn was_created(&self) -> bool {
		matches!(self, Self::Created(_))
	}
}

#[async_trait]
pub trait UserStore: Send + Sync {
	/// Insert `user` unless a row with the same `external_id` exists.
	///
	/// A unique violation on any other column is returned as
	/// [`DbError::Conflict`].
	async fn upsert_by_external_id(&self, user: &NewUser) -> Result<UpsertOutcome>;

	async fn get_by_external_id(&self, external_id: &str) -> Result<Option<UserRecord>>;

	async fn count(&self) -> Result<i64>;
}

#[derive(Clone)]
pub struct SqliteUserRepository {
	pool: SqlitePool,
}

impl SqliteUserRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

type UserRow = (String, String, String, String, String, String);

fn record_from_row(row: UserRow) -> Result<UserRecord> {
	let (id, external_id, email, first_name, last_name, created_at) = row;
	let id = Uuid::parse_str(&id)
		.map_err(|e| DbError::Internal(format!("invalid user id {id:?}: {e}")))?;
	Ok(UserRecord {
		id: UserId::new(id),
		external_id,
		email,
		first_name,
		last_name,
		created_at: parse_timestamp(&created_at)?,
	})
}

#[async_trait]
impl UserStore for SqliteUserRepository {
	#[instrument(skip(self, user), fields(external_id = %user.external_id))]
	async fn upsert_by_external_id(&self, user: &NewUser) -> Result<UpsertOutcome> {
		let result = sqlx::query(
			r#"
			INSERT INTO users (id, external_id, email, first_name, last_name, created_at)
			VALUES (?, ?, ?, ?, ?, ?)
			ON CONFLICT(external_id) DO NOTHING
			"#,
		)
		.bind(user.id.to_string())
		.bind(&user.external_id)
		.bind(&user.email)
		.bind(&user.first_name)
		.bind(&user.last_name)
		.bind(format_timestamp(user.created_at))
		.execute(&self.pool)
		.await;

		let result = match result {
			Ok(result) => result,
			Err(e) if crate::is_unique_violation(&e) => {
				tracing::error!(error = %e, user_id = %user.id, "unexpected unique violation inserting user");
				return Err(DbError::Conflict(format!("user {} already exists", user.id)));
			}
			Err(e) => return Err(e.into()),
		};

		if result.rows_affected() == 1 {
			return Ok(UpsertOutcome::Created(user.clone().into_record()));
		}

		let existing = self
			.get_by_external_id(&user.external_id)
			.await?
			.ok_or_else(|| DbError::NotFound(user.external_id.clone()))?;
		Ok(UpsertOutcome::AlreadyExisted(existing))
	}

	#[instrument(skip(self))]
	async fn get_by_external_id(&self, external_id: &str) -> Result<Option<UserRecord>> {
		let row = sqlx::query_as::<_, UserRow>(
			r#"
			SELECT id, external_id, email, first_name, last_name, created_at
			FROM users
			WHERE external_id = ?
			"#,
		)
		.bind(external_id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(record_from_row).transpose()
	}

	#[instrument(skip(self))]
	async fn count(&self) -> Result<i64> {
		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
			.fetch_one(&self.pool)
			.await?;
		Ok(count)
	}
}
