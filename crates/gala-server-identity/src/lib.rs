// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity provider webhook ingestion for the Gala server.
//!
//! Receives signed lifecycle events from the identity provider, verifies
//! them, deduplicates deliveries through the idempotency ledger, and
//! provisions exactly one user record per external identity.

pub mod error;
pub mod ingest;
pub mod provisioner;
pub mod routes;
pub mod verifier;

pub use error::{IngestError, InvalidSigningSecret, ProvisionError, VerificationError};
pub use ingest::{IngestOutcome, IngestSettings, IngestionService};
pub use provisioner::{ProvisionOutcome, UserProvisioner};
pub use routes::{identity_webhook_routes, IdentityWebhookState, IDENTITY_WEBHOOK_PATH, MAX_BODY_BYTES};
pub use verifier::{compute_signature, HeaderNames, InboundEnvelope, SignatureVerifier};
