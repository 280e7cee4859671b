// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Errors raised while assembling the CRM server configuration.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// A `CRM_SERVER_*` variable is set but cannot be interpreted.
	#[error("{var}={value:?} is not a valid {expected}")]
	InvalidEnvVar {
		var: String,
		value: String,
		expected: &'static str,
	},

	#[error("cannot read CRM server config file {path}: {source}")]
	ConfigFileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("CRM server config file {path} is not valid TOML: {source}")]
	ConfigFileParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	/// A setting would switch off lockout, session expiry or propagation.
	#[error("{setting} {requirement}")]
	Unsafe {
		setting: &'static str,
		requirement: &'static str,
	},
}

impl ConfigError {
	pub(crate) fn unsafe_setting(setting: &'static str, requirement: &'static str) -> Self {
		ConfigError::Unsafe {
			setting,
			requirement,
		}
	}
}
