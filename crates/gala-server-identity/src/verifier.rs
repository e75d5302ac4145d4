// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Signature verification for identity provider webhooks.
//!
//! The provider signs `"{id}.{timestamp}.{body}"` with HMAC-SHA256 and sends
//! the result in `<prefix>-signature` as space-separated `v1,<base64>`
//! entries. During secret rotation more than one entry may be present; any
//! match is accepted.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use gala_common_config::{Secret, SecretString};
use gala_common_webhook::{compute_hmac_sha256, compute_hmac_sha256_base64, signature_matches};
use gala_identity_core::Clock;
use tracing::{debug, warn};

use crate::error::{InvalidSigningSecret, VerificationError};

const SIGNATURE_VERSION: &str = "v1";

/// Names of the three headers carrying the envelope metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderNames {
	pub id: String,
	pub timestamp: String,
	pub signature: String,
}

impl HeaderNames {
	pub fn with_prefix(prefix: &str) -> Self {
		let prefix = prefix.to_ascii_lowercase();
		Self {
			id: format!("{prefix}-id"),
			timestamp: format!("{prefix}-timestamp"),
			signature: format!("{prefix}-signature"),
		}
	}
}

/// One delivery as it came off the wire.
#[derive(Debug, Clone, Copy)]
pub struct InboundEnvelope<'a> {
	pub event_id: &'a str,
	/// Timestamp exactly as sent; it is part of the signed content.
	pub timestamp: &'a str,
	pub signature_header: &'a str,
	pub raw_body: &'a [u8],
}

/// Checks that envelopes were signed with the shared secret and are fresh.
pub struct SignatureVerifier {
	key: Secret<Vec<u8>>,
	headers: HeaderNames,
	tolerance: Duration,
	clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SignatureVerifier {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SignatureVerifier")
			.field("key", &self.key)
			.field("headers", &self.headers)
			.field("tolerance", &self.tolerance)
			.finish_non_exhaustive()
	}
}

impl SignatureVerifier {
	pub fn new(
		secret: &SecretString,
		header_prefix: &str,
		tolerance: Duration,
		clock: Arc<dyn Clock>,
	) -> Result<Self, InvalidSigningSecret> {
		let key = gala_common_webhook::decode_signing_secret(secret.expose())
			.map_err(|e| InvalidSigningSecret(e.to_string()))?;

		Ok(Self {
			key: Secret::new(key),
			headers: HeaderNames::with_prefix(header_prefix),
			tolerance,
			clock,
		})
	}

	pub fn header_names(&self) -> &HeaderNames {
		&self.headers
	}

	/// Pull the envelope fields out of the request headers.
	pub fn extract<'a>(
		&self,
		headers: &'a HeaderMap,
		raw_body: &'a [u8],
	) -> Result<InboundEnvelope<'a>, VerificationError> {
		let get = |name: &str| {
			headers
				.get(name)
				.and_then(|v| v.to_str().ok())
				.filter(|v| !v.is_empty())
		};

		match (
			get(&self.headers.id),
			get(&self.headers.timestamp),
			get(&self.headers.signature),
		) {
			(Some(event_id), Some(timestamp), Some(signature_header)) => Ok(InboundEnvelope {
				event_id,
				timestamp,
				signature_header,
				raw_body,
			}),
			_ => {
				warn!("webhook request missing signature headers");
				Err(VerificationError::MissingHeaders)
			}
		}
	}

	/// Verify freshness, then the signature.
	pub fn verify(&self, envelope: &InboundEnvelope<'_>) -> Result<(), VerificationError> {
		if envelope.event_id.is_empty()
			|| envelope.timestamp.is_empty()
			|| envelope.signature_header.is_empty()
		{
			warn!("webhook envelope has empty headers");
			return Err(VerificationError::MissingHeaders);
		}

		let timestamp: i64 = envelope.timestamp.parse().map_err(|_| {
			warn!(event_id = envelope.event_id, "webhook timestamp is not an integer");
			VerificationError::InvalidTimestamp
		})?;

		let now = self.clock.now().timestamp();
		let skew = now.abs_diff(timestamp);
		if skew > self.tolerance.as_secs() {
			warn!(
				event_id = envelope.event_id,
				skew_secs = skew,
				"webhook timestamp outside tolerance"
			);
			return Err(VerificationError::StaleOrFutureTimestamp);
		}

		let signed = signed_content(envelope.event_id, envelope.timestamp, envelope.raw_body);
		let expected = compute_hmac_sha256(self.key.expose(), &signed);

		let matched = envelope
			.signature_header
			.split_whitespace()
			.filter_map(|entry| entry.split_once(','))
			.filter(|(version, _)| *version == SIGNATURE_VERSION)
			.any(|(_, signature)| signature_matches(&expected, signature));

		if matched {
			debug!(event_id = envelope.event_id, "webhook signature verified");
			Ok(())
		} else {
			warn!(event_id = envelope.event_id, "webhook signature verification failed");
			Err(VerificationError::InvalidSignature)
		}
	}

	/// [`extract`](Self::extract) followed by [`verify`](Self::verify).
	pub fn verify_request<'a>(
		&self,
		headers: &'a HeaderMap,
		raw_body: &'a [u8],
	) -> Result<InboundEnvelope<'a>, VerificationError> {
		let envelope = self.extract(headers, raw_body)?;
		self.verify(&envelope)?;
		Ok(envelope)
	}
}

fn signed_content(event_id: &str, timestamp: &str, body: &[u8]) -> Vec<u8> {
	let mut content = Vec::with_capacity(event_id.len() + timestamp.len() + body.len() + 2);
	content.extend_from_slice(event_id.as_bytes());
	content.push(b'.');
	content.extend_from_slice(timestamp.as_bytes());
	content.push(b'.');
	content.extend_from_slice(body);
	content
}

/// Compute a `v1,<base64>` signature header entry.
///
/// This is what the provider sends; tests use it to build deliveries.
pub fn compute_signature(key: &[u8], event_id: &str, timestamp: &str, body: &[u8]) -> String {
	let signature = compute_hmac_sha256_base64(key, &signed_content(event_id, timestamp, body));
	format!("{SIGNATURE_VERSION},{signature}")
}
