// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database layer for the Gala server.
//!
//! Repositories for the `users` table and the `webhook_ledger` idempotency
//! table, each behind a trait so the ingestion service can be tested with
//! fakes.

pub mod error;
pub mod ledger;
pub mod pool;
pub mod user;

#[doc(hidden)]
pub mod testing;

pub use error::{is_unique_violation, DbError, Result};
pub use ledger::{LedgerStore, SqliteLedgerRepository};
pub use pool::{create_pool, create_pool_with_max_connections, ping, run_migrations};
pub use user::{SqliteUserRepository, UpsertOutcome, UserStore};

pub(crate) fn format_timestamp(ts: chrono::DateTime<chrono::Utc>) -> String {
	// Fixed width so lexical comparison in SQL matches time order.
	ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<chrono::DateTime<chrono::Utc>> {
	chrono::DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&chrono::Utc))
		.map_err(|e| DbError::Internal(format!("invalid timestamp {value:?}: {e}")))
}
