// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gala_identity_core::{EventDataError, ParseError};
use gala_server_db::DbError;
use serde::Serialize;

/// Why an inbound envelope was not accepted as authentic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
	#[error("missing webhook headers")]
	MissingHeaders,
	#[error("webhook timestamp is not an integer")]
	InvalidTimestamp,
	#[error("webhook timestamp outside tolerance")]
	StaleOrFutureTimestamp,
	#[error("no matching webhook signature")]
	InvalidSignature,
}

/// The configured signing secret could not be turned into a key.
#[derive(Debug, thiserror::Error)]
#[error("invalid webhook signing secret: {0}")]
pub struct InvalidSigningSecret(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
	#[error("missing required field: {0}")]
	MissingRequiredField(&'static str),
	#[error("provisioning failed: {0}")]
	ProvisioningFailure(String),
}

impl From<EventDataError> for ProvisionError {
	fn from(e: EventDataError) -> Self {
		match e {
			EventDataError::MissingRequiredField(field) => ProvisionError::MissingRequiredField(field),
		}
	}
}

impl From<DbError> for ProvisionError {
	fn from(e: DbError) -> Self {
		ProvisionError::ProvisioningFailure(e.to_string())
	}
}

/// Every way an ingestion request can fail.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
	#[error(transparent)]
	Verification(#[from] VerificationError),
	#[error(transparent)]
	Parse(#[from] ParseError),
	#[error(transparent)]
	Provision(#[from] ProvisionError),
	#[error("ledger error: {0}")]
	Ledger(#[from] DbError),
	#[error("store call timed out: {0}")]
	Timeout(&'static str),
}

impl IngestError {
	pub fn status_code(&self) -> StatusCode {
		if self.is_retryable() {
			StatusCode::INTERNAL_SERVER_ERROR
		} else {
			StatusCode::BAD_REQUEST
		}
	}

	/// Stable code returned to the caller in the `error` field.
	pub fn error_code(&self) -> &'static str {
		match self {
			IngestError::Verification(VerificationError::MissingHeaders) => "missing_headers",
			IngestError::Verification(VerificationError::InvalidTimestamp) => "invalid_timestamp",
			IngestError::Verification(VerificationError::StaleOrFutureTimestamp) => "stale_timestamp",
			IngestError::Verification(VerificationError::InvalidSignature) => "invalid_signature",
			IngestError::Parse(ParseError::MalformedPayload(_)) => "malformed_payload",
			IngestError::Provision(ProvisionError::MissingRequiredField(_)) => "missing_required_field",
			IngestError::Provision(ProvisionError::ProvisioningFailure(_))
			| IngestError::Ledger(_)
			| IngestError::Timeout(_) => "provisioning_failed",
		}
	}

	/// Whether the provider should redeliver.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			IngestError::Provision(ProvisionError::ProvisioningFailure(_))
				| IngestError::Ledger(_)
				| IngestError::Timeout(_)
		)
	}
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error: &'static str,
}

impl IntoResponse for IngestError {
	fn into_response(self) -> Response {
		(
			self.status_code(),
			Json(ErrorBody {
				error: self.error_code(),
			}),
		)
			.into_response()
	}
}
