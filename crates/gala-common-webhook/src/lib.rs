// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared HMAC-SHA256 webhook signature utilities.
//!
//! Signatures travel as standard (padded) base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of an HMAC-SHA256 tag.
pub const TAG_LEN: usize = 32;

/// Compute the raw HMAC-SHA256 tag of `payload` under `key`.
pub fn compute_hmac_sha256(key: &[u8], payload: &[u8]) -> [u8; TAG_LEN] {
	let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
	mac.update(payload);

	let mut tag = [0u8; TAG_LEN];
	tag.copy_from_slice(&mac.finalize().into_bytes());
	tag
}

/// Compute an HMAC-SHA256 signature and return it base64-encoded.
pub fn compute_hmac_sha256_base64(key: &[u8], payload: &[u8]) -> String {
	STANDARD.encode(compute_hmac_sha256(key, payload))
}

/// Compare an expected tag against a base64-encoded candidate in constant time.
///
/// Candidates that are not valid base64 or have the wrong length never match.
pub fn signature_matches(expected: &[u8; TAG_LEN], candidate_b64: &str) -> bool {
	let candidate = match STANDARD.decode(candidate_b64.trim()) {
		Ok(bytes) => bytes,
		Err(_) => return false,
	};

	if candidate.len() != TAG_LEN {
		return false;
	}

	expected.as_slice().ct_eq(candidate.as_slice()).into()
}

/// Verify a base64-encoded HMAC-SHA256 signature for a payload.
pub fn verify_hmac_sha256_base64(key: &[u8], payload: &[u8], signature: &str) -> bool {
	let expected = compute_hmac_sha256(key, payload);
	signature_matches(&expected, signature)
}

/// Prefix marking a base64-encoded signing key.
pub const SECRET_PREFIX: &str = "whsec_";

/// Turn a configured signing secret into HMAC key bytes.
///
/// `whsec_<base64>` decodes to the key. Any other value is used as its raw
/// UTF-8 bytes.
pub fn decode_signing_secret(secret: &str) -> Result<Vec<u8>, base64::DecodeError> {
	match secret.strip_prefix(SECRET_PREFIX) {
		Some(encoded) => STANDARD.decode(encoded.trim()),
		None => Ok(secret.as_bytes().to_vec()),
	}
}
