// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health HTTP handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthResponse {
	pub status: &'static str,
	pub database: &'static str,
}

/// GET /health - liveness plus a database round-trip.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let database_ok = matches!(
		tokio::time::timeout(state.store_timeout, gala_server_db::ping(&state.pool)).await,
		Ok(Ok(()))
	);

	if database_ok {
		(
			StatusCode::OK,
			Json(HealthResponse {
				status: "ok",
				database: "ok",
			}),
		)
	} else {
		tracing::warn!("health check failed: database unreachable");
		(
			StatusCode::SERVICE_UNAVAILABLE,
			Json(HealthResponse {
				status: "unhealthy",
				database: "error",
			}),
		)
	}
}
