// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use axum::{
	body::Bytes,
	extract::State,
	http::HeaderMap,
	routing::post,
	Json, Router,
};
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;

use crate::error::IngestError;
use crate::ingest::{IngestOutcome, IngestionService};

pub const IDENTITY_WEBHOOK_PATH: &str = "/api/webhooks/identity";

/// Largest accepted webhook body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct IdentityWebhookState {
	pub service: Arc<IngestionService>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
	pub message: &'static str,
}

pub fn identity_webhook_routes(service: Arc<IngestionService>) -> Router {
	Router::new()
		.route(IDENTITY_WEBHOOK_PATH, post(handle_identity_webhook))
		.layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
		.with_state(IdentityWebhookState { service })
}

#[tracing::instrument(skip(state, headers, body))]
async fn handle_identity_webhook(
	State(state): State<IdentityWebhookState>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Json<WebhookAck>, IngestError> {
	let outcome = state.service.ingest(&headers, &body).await?;

	match &outcome {
		IngestOutcome::Provisioned { user_id, created } => {
			tracing::info!(%user_id, created, "identity webhook processed");
		}
		IngestOutcome::Duplicate { outcome } => {
			tracing::debug!(%outcome, "identity webhook already processed");
		}
		IngestOutcome::Skipped { event_type } => {
			tracing::debug!(%event_type, "identity webhook skipped");
		}
	}

	Ok(Json(WebhookAck { message: "ok" }))
}
