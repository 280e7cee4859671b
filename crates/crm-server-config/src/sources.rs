// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, TOML files and environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	AuthConfigLayer, DatabaseConfigLayer, HttpConfigLayer, LoggingConfigLayer,
	PropagationConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/crm/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::ConfigFileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer = toml::from_str(&content).map_err(|e| ConfigError::ConfigFileParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!(path = %self.path.display(), "parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: CRM_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer {
			http: Some(HttpConfigLayer {
				host: env_var("CRM_SERVER_HOST"),
				port: env_parse("CRM_SERVER_PORT")?,
				cors_origin: env_var("CRM_SERVER_CORS_ORIGIN"),
			}),
			database: Some(DatabaseConfigLayer {
				url: env_var("CRM_SERVER_DATABASE_URL"),
			}),
			auth: Some(AuthConfigLayer {
				environment: env_var("CRM_SERVER_ENV"),
				session_ttl_secs: env_parse("CRM_SERVER_AUTH_SESSION_TTL_SECS")?,
				auth_timeout_ms: env_parse("CRM_SERVER_AUTH_TIMEOUT_MS")?,
				max_login_attempts: env_parse("CRM_SERVER_AUTH_MAX_LOGIN_ATTEMPTS")?,
				lock_duration_secs: env_parse("CRM_SERVER_AUTH_LOCK_DURATION_SECS")?,
				session_cleanup_interval_secs: env_parse(
					"CRM_SERVER_AUTH_SESSION_CLEANUP_INTERVAL_SECS",
				)?,
			}),
			propagation: Some(PropagationConfigLayer {
				channel_capacity: env_parse("CRM_SERVER_PROPAGATION_CHANNEL_CAPACITY")?,
				heartbeat_secs: env_parse("CRM_SERVER_PROPAGATION_HEARTBEAT_SECS")?,
				reload_grace_ms: env_parse("CRM_SERVER_PROPAGATION_RELOAD_GRACE_MS")?,
			}),
			logging: Some(LoggingConfigLayer {
				level: env_var("CRM_SERVER_LOG_LEVEL"),
				json: env_bool("CRM_SERVER_LOG_JSON"),
			}),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidEnvVar {
			var: name.to_string(),
			value: v,
			expected: std::any::type_name::<T>(),
		}),
		None => Ok(None),
	}
}
