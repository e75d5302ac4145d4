// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// In-memory pool with the schema applied.
///
/// Each `:memory:` connection is its own database, so the pool is capped at
/// one connection.
pub async fn create_test_pool() -> SqlitePool {
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect("sqlite::memory:")
		.await
		.unwrap();
	crate::run_migrations(&pool).await.unwrap();
	pool
}

/// File-backed pool with the schema applied, for tests that need real
/// concurrent writers.
pub async fn create_file_test_pool(dir: &std::path::Path) -> SqlitePool {
	let db_path = dir.join("test.db");
	let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
	let pool = crate::create_pool_with_max_connections(&db_url, 8).await.unwrap();
	crate::run_migrations(&pool).await.unwrap();
	pool
}
