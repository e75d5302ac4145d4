// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Verified identity events and the envelope parser.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EventDataError, ParseError};

/// Type tag of the one lifecycle event the pipeline acts on.
pub const USER_CREATED: &str = "user.created";

/// An event whose envelope signature has been checked.
///
/// Only [`parse_event`] constructs these, and it is only called on bodies
/// that passed verification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifiedEvent {
	event_id: String,
	event_type: String,
	data: Value,
}

impl VerifiedEvent {
	pub fn event_id(&self) -> &str {
		&self.event_id
	}

	pub fn event_type(&self) -> &str {
		&self.event_type
	}

	pub fn data(&self) -> &Value {
		&self.data
	}

	pub fn kind(&self) -> EventKind {
		EventKind::from_type(&self.event_type)
	}
}

/// Dispatch classification of an event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
	UserCreated,
	/// Recognized as well-formed but not acted upon.
	Other(String),
}

impl EventKind {
	pub fn from_type(event_type: &str) -> Self {
		match event_type {
			USER_CREATED => Self::UserCreated,
			other => Self::Other(other.to_string()),
		}
	}

	pub fn is_handled(&self) -> bool {
		!matches!(self, Self::Other(_))
	}
}

impl fmt::Display for EventKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::UserCreated => write!(f, "{USER_CREATED}"),
			Self::Other(t) => write!(f, "{t}"),
		}
	}
}

#[derive(Deserialize)]
struct RawEnvelopeBody {
	#[serde(rename = "type")]
	event_type: Option<Value>,
	data: Option<Value>,
}

/// Decode a verified body into a [`VerifiedEvent`].
///
/// The body must be a JSON object with a string `type` and an object `data`.
/// Unknown type strings are accepted.
pub fn parse_event(event_id: &str, raw_body: &[u8]) -> Result<VerifiedEvent, ParseError> {
	let body: RawEnvelopeBody = serde_json::from_slice(raw_body)
		.map_err(|e| ParseError::MalformedPayload(format!("invalid JSON object: {e}")))?;

	let event_type = match body.event_type {
		Some(Value::String(t)) if !t.is_empty() => t,
		Some(_) => {
			return Err(ParseError::MalformedPayload(
				"`type` must be a non-empty string".to_string(),
			))
		}
		None => return Err(ParseError::MalformedPayload("missing `type`".to_string())),
	};

	let data = match body.data {
		Some(data @ Value::Object(_)) => data,
		Some(_) => {
			return Err(ParseError::MalformedPayload(
				"`data` must be an object".to_string(),
			))
		}
		None => return Err(ParseError::MalformedPayload("missing `data`".to_string())),
	};

	Ok(VerifiedEvent {
		event_id: event_id.to_string(),
		event_type,
		data,
	})
}

/// Fields a `user.created` event contributes to a user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCreatedData {
	pub external_id: String,
	pub email: String,
	pub first_name: String,
	pub last_name: String,
}

#[derive(Deserialize)]
struct RawUserData {
	id: Option<String>,
	email_addresses: Option<Vec<RawEmailAddress>>,
	#[serde(default)]
	first_name: Option<serde_json::Value>,
	#[serde(default)]
	last_name: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawEmailAddress {
	email_address: Option<String>,
}

fn name_field(value: Option<serde_json::Value>) -> String {
	value
		.as_ref()
		.and_then(serde_json::Value::as_str)
		.unwrap_or_default()
		.to_string()
}

impl UserCreatedData {
	/// Extract user fields from an event payload.
	///
	/// The primary email is the first entry of `email_addresses`. Names
	/// that are absent or not strings default to empty strings.
	pub fn from_event(event: &VerifiedEvent) -> Result<Self, EventDataError> {
		// A wrong-typed id or email list fails the whole payload.
		let raw: RawUserData = serde_json::from_value(event.data.clone())
			.map_err(|_| EventDataError::MissingRequiredField("data"))?;

		let external_id = raw
			.id
			.filter(|id| !id.is_empty())
			.ok_or(EventDataError::MissingRequiredField("data.id"))?;

		let email = raw
			.email_addresses
			.unwrap_or_default()
			.into_iter()
			.next()
			.and_then(|e| e.email_address)
			.filter(|e| !e.is_empty())
			.ok_or(EventDataError::MissingRequiredField(
				"data.email_addresses",
			))?;

		Ok(Self {
			external_id,
			email,
			first_name: name_field(raw.first_name),
			last_name: name_field(raw.last_name),
		})
	}
}
