// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Build information for gala-server.

/// Format version info for display.
pub fn format_version_info() -> String {
	format!(
		"gala-server version: {}\n\
         Platform:            {}-{}",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH,
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_version_info_contains_version() {
		assert!(format_version_info().contains(env!("CARGO_PKG_VERSION")));
	}
}
