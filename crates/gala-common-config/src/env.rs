// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Environment helpers for secrets.

use std::path::PathBuf;

use gala_common_secret::SecretString;

/// Errors raised while reading a secret from the environment.
#[derive(Debug, thiserror::Error)]
pub enum SecretEnvError {
	#[error("both {name} and {name}_FILE are set; use only one")]
	Ambiguous { name: String },

	#[error("failed to read {name}_FILE at {path}: {source}")]
	FileRead {
		name: String,
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("{name}_FILE at {path} is empty")]
	EmptyFile { name: String, path: PathBuf },
}

/// Load a secret from `NAME` or from the file named by `NAME_FILE`.
///
/// Returns `Ok(None)` when neither variable is set (or both are empty).
/// File contents are trimmed of surrounding whitespace.
pub fn load_secret_env(name: &str) -> Result<Option<SecretString>, SecretEnvError> {
	let file_var = format!("{name}_FILE");
	let direct = std::env::var(name).ok().filter(|v| !v.is_empty());
	let file = std::env::var(&file_var).ok().filter(|v| !v.is_empty());

	match (direct, file) {
		(Some(_), Some(_)) => Err(SecretEnvError::Ambiguous {
			name: name.to_string(),
		}),
		(Some(value), None) => Ok(Some(SecretString::new(value))),
		(None, Some(path)) => read_secret_file(name, PathBuf::from(path)).map(Some),
		(None, None) => Ok(None),
	}
}

fn read_secret_file(name: &str, path: PathBuf) -> Result<SecretString, SecretEnvError> {
	let contents = std::fs::read_to_string(&path).map_err(|source| SecretEnvError::FileRead {
		name: name.to_string(),
		path: path.clone(),
		source,
	})?;

	let trimmed = contents.trim();
	if trimmed.is_empty() {
		return Err(SecretEnvError::EmptyFile {
			name: name.to_string(),
			path,
		});
	}

	Ok(SecretString::new(trimmed.to_string()))
}
