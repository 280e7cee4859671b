// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission change propagation configuration.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PropagationConfig {
	/// Buffered events per role or user channel before slow receivers lag.
	pub channel_capacity: usize,
	pub heartbeat_secs: u64,
	/// Delay clients are told to wait between the change notice and the reload.
	pub reload_grace_ms: u64,
}

impl PropagationConfig {
	pub fn heartbeat_interval(&self) -> Duration {
		Duration::from_secs(self.heartbeat_secs)
	}
}

impl Default for PropagationConfig {
	fn default() -> Self {
		PropagationConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropagationConfigLayer {
	#[serde(default)]
	pub channel_capacity: Option<usize>,
	#[serde(default)]
	pub heartbeat_secs: Option<u64>,
	#[serde(default)]
	pub reload_grace_ms: Option<u64>,
}

impl PropagationConfigLayer {
	pub fn merge(&mut self, other: PropagationConfigLayer) {
		if other.channel_capacity.is_some() {
			self.channel_capacity = other.channel_capacity;
		}
		if other.heartbeat_secs.is_some() {
			self.heartbeat_secs = other.heartbeat_secs;
		}
		if other.reload_grace_ms.is_some() {
			self.reload_grace_ms = other.reload_grace_ms;
		}
	}

	pub fn finalize(self) -> PropagationConfig {
		PropagationConfig {
			channel_capacity: self.channel_capacity.unwrap_or(256),
			heartbeat_secs: self.heartbeat_secs.unwrap_or(30),
			reload_grace_ms: self.reload_grace_ms.unwrap_or(3_000),
		}
	}
}
