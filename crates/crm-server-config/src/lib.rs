// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for the CRM server.
//!
//! This crate provides:
//! - Layered configuration from built-in defaults, a TOML file and the environment
//! - Typed sections with validation
//! - Consistent environment variable naming (`CRM_SERVER_*`)

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use std::path::PathBuf;

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub auth: AuthConfig,
	pub propagation: PropagationConfig,
	pub logging: LoggingConfig,
}

impl ServerConfig {
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`CRM_SERVER_*`)
/// 2. Config file (`/etc/crm/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path in place of the system one.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		http: layer.http.unwrap_or_default().finalize(),
		database: layer.database.unwrap_or_default().finalize(),
		auth: layer.auth.unwrap_or_default().finalize(),
		propagation: layer.propagation.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		environment = %config.auth.environment,
		max_login_attempts = config.auth.max_login_attempts,
		lock_duration_secs = config.auth.lock_duration_secs,
		"Server configuration loaded"
	);

	Ok(config)
}

/// Reject settings that would disable a security control outright.
fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	if config.auth.max_login_attempts == 0 {
		return Err(ConfigError::unsafe_setting(
			"auth.max_login_attempts",
			"must be at least 1",
		));
	}
	if config.auth.lock_duration_secs == 0 {
		return Err(ConfigError::unsafe_setting(
			"auth.lock_duration_secs",
			"must be greater than zero",
		));
	}
	if config.auth.auth_timeout_ms == 0 {
		return Err(ConfigError::unsafe_setting(
			"auth.auth_timeout_ms",
			"must be greater than zero",
		));
	}
	if config.auth.session_ttl_secs == 0 {
		return Err(ConfigError::unsafe_setting(
			"auth.session_ttl_secs",
			"must be greater than zero",
		));
	}
	if config.propagation.channel_capacity == 0 {
		return Err(ConfigError::unsafe_setting(
			"propagation.channel_capacity",
			"must be greater than zero",
		));
	}
	Ok(())
}
