// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for event decoding.

use thiserror::Error;

/// The verified body could not be decoded into an event.
#[derive(Debug, Error)]
pub enum ParseError {
	#[error("malformed payload: {0}")]
	MalformedPayload(String),
}

/// A decoded event lacks a field its handler needs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventDataError {
	#[error("missing required field: {0}")]
	MissingRequiredField(&'static str),
}
