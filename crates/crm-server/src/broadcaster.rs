// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fan-out of permission change events to live client streams.
//!
//! Channels are keyed by role (every session of every user holding that role)
//! or by user (one person's sessions). Publishing never blocks and never fails
//! the caller: an event with no listeners is simply dropped. Enforcement does
//! not depend on delivery.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crm_rbac_core::{PermissionEvent, RoleId, UserId};
use crm_server_config::PropagationConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

const DEFAULT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
	pub channel_capacity: usize,
	pub heartbeat_interval: Duration,
}

impl Default for BroadcasterConfig {
	fn default() -> Self {
		Self {
			channel_capacity: DEFAULT_CHANNEL_CAPACITY,
			heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
		}
	}
}

impl From<&PropagationConfig> for BroadcasterConfig {
	fn from(config: &PropagationConfig) -> Self {
		Self {
			channel_capacity: config.channel_capacity.max(1),
			heartbeat_interval: config.heartbeat_interval(),
		}
	}
}

/// Address of a broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKey {
	Role(RoleId),
	User(UserId),
}

impl fmt::Display for ChannelKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ChannelKey::Role(id) => write!(f, "role:{id}"),
			ChannelKey::User(id) => write!(f, "user:{id}"),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcasterStats {
	pub channel_count: usize,
	pub total_receivers: usize,
	pub total_events_sent: u64,
	pub total_subscriptions: u64,
}

pub struct PermissionsBroadcaster {
	config: BroadcasterConfig,
	channels: RwLock<HashMap<ChannelKey, broadcast::Sender<PermissionEvent>>>,
	total_events: AtomicU64,
	total_subscriptions: AtomicU64,
}

impl PermissionsBroadcaster {
	pub fn new(config: BroadcasterConfig) -> Self {
		Self {
			config,
			channels: RwLock::new(HashMap::new()),
			total_events: AtomicU64::new(0),
			total_subscriptions: AtomicU64::new(0),
		}
	}

	pub fn with_defaults() -> Self {
		Self::new(BroadcasterConfig::default())
	}

	/// Subscribe to a channel, creating it on first use.
	pub async fn subscribe(&self, key: ChannelKey) -> broadcast::Receiver<PermissionEvent> {
		self.total_subscriptions.fetch_add(1, Ordering::Relaxed);

		{
			let channels = self.channels.read().await;
			if let Some(sender) = channels.get(&key) {
				debug!(
					channel = %key,
					receiver_count = sender.receiver_count(),
					"Subscribed to existing permissions channel"
				);
				return sender.subscribe();
			}
		}

		let mut channels = self.channels.write().await;
		let sender = channels.entry(key).or_insert_with(|| {
			info!(channel = %key, "Created permissions broadcast channel");
			broadcast::channel(self.config.channel_capacity).0
		});
		sender.subscribe()
	}

	pub async fn subscribe_role(&self, role_id: RoleId) -> broadcast::Receiver<PermissionEvent> {
		self.subscribe(ChannelKey::Role(role_id)).await
	}

	pub async fn subscribe_user(&self, user_id: UserId) -> broadcast::Receiver<PermissionEvent> {
		self.subscribe(ChannelKey::User(user_id)).await
	}

	/// Publish an event. Returns how many receivers got it.
	pub async fn broadcast(&self, key: ChannelKey, event: PermissionEvent) -> usize {
		let channels = self.channels.read().await;

		let Some(sender) = channels.get(&key) else {
			debug!(
				channel = %key,
				event_type = event.event_type(),
				"No live streams for channel"
			);
			return 0;
		};

		if sender.receiver_count() == 0 {
			debug!(
				channel = %key,
				event_type = event.event_type(),
				"No receivers for permissions broadcast"
			);
			return 0;
		}

		let event_type = event.event_type();
		match sender.send(event) {
			Ok(count) => {
				self.total_events.fetch_add(1, Ordering::Relaxed);
				debug!(
					channel = %key,
					event_type,
					receiver_count = count,
					"Broadcast permission event"
				);
				count
			}
			Err(e) => {
				warn!(channel = %key, error = %e, "Failed to broadcast permission event");
				0
			}
		}
	}

	pub async fn broadcast_to_role(&self, role_id: RoleId, event: PermissionEvent) -> usize {
		self.broadcast(ChannelKey::Role(role_id), event).await
	}

	pub async fn broadcast_to_user(&self, user_id: UserId, event: PermissionEvent) -> usize {
		self.broadcast(ChannelKey::User(user_id), event).await
	}

	pub async fn broadcast_heartbeat(&self) {
		let event = PermissionEvent::heartbeat();
		let channels = self.channels.read().await;
		for sender in channels.values() {
			let _ = sender.send(event.clone());
		}
		debug!(channel_count = channels.len(), "Broadcast heartbeat");
	}

	pub fn heartbeat_interval(&self) -> Duration {
		self.config.heartbeat_interval
	}

	pub async fn channel_count(&self) -> usize {
		self.channels.read().await.len()
	}

	pub async fn receiver_count(&self, key: ChannelKey) -> usize {
		self
			.channels
			.read()
			.await
			.get(&key)
			.map_or(0, broadcast::Sender::receiver_count)
	}

	/// Drop channels nobody is listening to.
	pub async fn cleanup_empty_channels(&self) -> usize {
		let mut channels = self.channels.write().await;
		let before = channels.len();
		channels.retain(|key, sender| {
			let keep = sender.receiver_count() > 0;
			if !keep {
				debug!(channel = %key, "Removing empty permissions channel");
			}
			keep
		});
		let removed = before - channels.len();
		if removed > 0 {
			info!(removed_channels = removed, "Cleaned up empty permissions channels");
		}
		removed
	}

	pub async fn stats(&self) -> BroadcasterStats {
		let channels = self.channels.read().await;
		BroadcasterStats {
			channel_count: channels.len(),
			total_receivers: channels.values().map(broadcast::Sender::receiver_count).sum(),
			total_events_sent: self.total_events.load(Ordering::Relaxed),
			total_subscriptions: self.total_subscriptions.load(Ordering::Relaxed),
		}
	}
}
