// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Security audit events.
//!
//! Events are emitted as structured `tracing` records on the `crm::audit`
//! target so deployments can route them separately from application logs.

use crm_rbac_core::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const AUDIT_TARGET: &str = "crm::audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
	// Authentication
	LoginSucceeded,
	LoginFailed,
	AccountLocked,
	Logout,

	// Access control
	AccessGranted,
	AccessDenied,

	// Administration
	RolePermissionsChanged,
	RoleDeleted,
	UserRoleChanged,
	UserDeactivated,
	UserReactivated,
}

impl AuditEventType {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuditEventType::LoginSucceeded => "login_succeeded",
			AuditEventType::LoginFailed => "login_failed",
			AuditEventType::AccountLocked => "account_locked",
			AuditEventType::Logout => "logout",
			AuditEventType::AccessGranted => "access_granted",
			AuditEventType::AccessDenied => "access_denied",
			AuditEventType::RolePermissionsChanged => "role_permissions_changed",
			AuditEventType::RoleDeleted => "role_deleted",
			AuditEventType::UserRoleChanged => "user_role_changed",
			AuditEventType::UserDeactivated => "user_deactivated",
			AuditEventType::UserReactivated => "user_reactivated",
		}
	}

	fn is_failure(&self) -> bool {
		matches!(
			self,
			AuditEventType::LoginFailed | AuditEventType::AccountLocked | AuditEventType::AccessDenied
		)
	}
}

impl fmt::Display for AuditEventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A single audit record. Build with [`AuditEvent::new`] and finish with [`AuditEvent::emit`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
	pub event_type: AuditEventType,
	pub actor: Option<UserId>,
	pub resource: Option<String>,
	pub detail: Option<String>,
}

impl AuditEvent {
	pub fn new(event_type: AuditEventType) -> Self {
		Self {
			event_type,
			actor: None,
			resource: None,
			detail: None,
		}
	}

	pub fn actor(mut self, user_id: UserId) -> Self {
		self.actor = Some(user_id);
		self
	}

	pub fn resource(mut self, resource: impl Into<String>) -> Self {
		self.resource = Some(resource.into());
		self
	}

	pub fn detail(mut self, detail: impl Into<String>) -> Self {
		self.detail = Some(detail.into());
		self
	}

	pub fn emit(self) {
		let actor = self.actor.map(|id| id.to_string()).unwrap_or_default();
		let resource = self.resource.unwrap_or_default();
		let detail = self.detail.unwrap_or_default();
		if self.event_type.is_failure() {
			tracing::warn!(
				target: AUDIT_TARGET,
				event = %self.event_type,
				actor = %actor,
				resource = %resource,
				detail = %detail,
				"audit"
			);
		} else {
			tracing::info!(
				target: AUDIT_TARGET,
				event = %self.event_type,
				actor = %actor,
				resource = %resource,
				detail = %detail,
				"audit"
			);
		}
	}
}
