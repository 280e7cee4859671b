// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission change events streamed to live client sessions.
//!
//! # Events
//!
//! - `connected` - First frame on a new stream
//! - `permissions-updated` - A role's permission matrix was saved
//! - `role-updated` - A role document changed (sent alongside `permissions-updated`)
//! - `user-role-changed` - A user was reassigned to another role
//! - `session-revoked` - The user was deactivated; all sessions are gone
//! - `heartbeat` - Keep-alive
//!
//! Payloads carry identifiers only. A receiver must refetch its permission set
//! from the server; nothing in an event is a grant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{RoleId, RoleName, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum PermissionEvent {
	#[serde(rename = "connected")]
	Connected(ConnectedData),

	#[serde(rename = "permissions-updated")]
	PermissionsUpdated(RoleChangeData),

	#[serde(rename = "role-updated")]
	RoleUpdated(RoleChangeData),

	#[serde(rename = "user-role-changed")]
	UserRoleChanged(UserRoleChangeData),

	#[serde(rename = "session-revoked")]
	SessionRevoked(SessionRevokedData),

	#[serde(rename = "heartbeat")]
	Heartbeat(HeartbeatData),
}

impl PermissionEvent {
	/// Returns the event type name as a string.
	pub fn event_type(&self) -> &'static str {
		match self {
			PermissionEvent::Connected(_) => "connected",
			PermissionEvent::PermissionsUpdated(_) => "permissions-updated",
			PermissionEvent::RoleUpdated(_) => "role-updated",
			PermissionEvent::UserRoleChanged(_) => "user-role-changed",
			PermissionEvent::SessionRevoked(_) => "session-revoked",
			PermissionEvent::Heartbeat(_) => "heartbeat",
		}
	}

	/// Whether a receiver should refetch its permissions and reload.
	pub fn invalidates_permissions(&self) -> bool {
		matches!(
			self,
			PermissionEvent::PermissionsUpdated(_)
				| PermissionEvent::RoleUpdated(_)
				| PermissionEvent::UserRoleChanged(_)
		)
	}

	pub fn connected(user_id: UserId, role_id: Option<RoleId>) -> Self {
		PermissionEvent::Connected(ConnectedData {
			user_id,
			role_id,
			timestamp: Utc::now(),
		})
	}

	pub fn permissions_updated(role_id: RoleId, role_name: RoleName) -> Self {
		PermissionEvent::PermissionsUpdated(RoleChangeData {
			role_id,
			role_name,
			timestamp: Utc::now(),
		})
	}

	pub fn role_updated(role_id: RoleId, role_name: RoleName) -> Self {
		PermissionEvent::RoleUpdated(RoleChangeData {
			role_id,
			role_name,
			timestamp: Utc::now(),
		})
	}

	pub fn user_role_changed(user_id: UserId, role_id: RoleId, role_name: RoleName) -> Self {
		PermissionEvent::UserRoleChanged(UserRoleChangeData {
			user_id,
			role_id,
			role_name,
			timestamp: Utc::now(),
		})
	}

	pub fn session_revoked(user_id: UserId) -> Self {
		PermissionEvent::SessionRevoked(SessionRevokedData {
			user_id,
			timestamp: Utc::now(),
		})
	}

	pub fn heartbeat() -> Self {
		PermissionEvent::Heartbeat(HeartbeatData {
			timestamp: Utc::now(),
		})
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectedData {
	pub user_id: UserId,
	pub role_id: Option<RoleId>,
	pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleChangeData {
	pub role_id: RoleId,
	pub role_name: RoleName,
	pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRoleChangeData {
	pub user_id: UserId,
	pub role_id: RoleId,
	pub role_name: RoleName,
	pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRevokedData {
	pub user_id: UserId,
	pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeartbeatData {
	pub timestamp: DateTime<Utc>,
}
