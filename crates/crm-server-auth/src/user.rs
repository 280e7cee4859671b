// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User accounts.
//!
//! This module provides:
//! - [`User`] - the stored account; the password hash never serializes
//! - [`UserWithRole`] - a user joined with its current role document, the
//!   only input from which a [`Principal`] is derived
//! - [`UserProfile`] - the view returned to clients

use chrono::{DateTime, Utc};
use crm_rbac_core::{Branch, PermissionSet, Principal, Role, RoleId, RoleName, UserId};
use serde::{Deserialize, Serialize};

use crate::lockout::LockState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
	pub id: UserId,
	/// Stored lowercased; see [`normalize_email`].
	pub email: String,
	#[serde(skip_serializing, default)]
	pub password_hash: String,
	pub name: String,
	pub role_id: Option<RoleId>,
	pub branch: Branch,
	pub is_active: bool,
	pub login_attempts: u32,
	pub lock_until: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl User {
	pub fn lock_state(&self) -> LockState {
		LockState {
			login_attempts: self.login_attempts,
			lock_until: self.lock_until,
		}
	}
}

/// A user and the role document it references, loaded together.
///
/// `role` is `None` when the reference is missing or the stored permission
/// data could not be read.
#[derive(Debug, Clone)]
pub struct UserWithRole {
	pub user: User,
	pub role: Option<Role>,
}

impl UserWithRole {
	/// Derive the principal from the role as loaded right now.
	pub fn principal(&self) -> Principal {
		Principal::from_role(self.user.id, self.user.branch, self.role.as_ref())
	}

	pub fn profile(&self) -> UserProfile {
		let principal = self.principal();
		UserProfile {
			id: self.user.id,
			email: self.user.email.clone(),
			name: self.user.name.clone(),
			role: principal.role,
			branch: self.user.branch,
			is_active: self.user.is_active,
			permissions: principal.permissions,
		}
	}
}

/// Public view of a user with its flattened permissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
	pub id: UserId,
	pub email: String,
	pub name: String,
	pub role: Option<RoleName>,
	pub branch: Branch,
	pub is_active: bool,
	pub permissions: PermissionSet,
}

/// Emails are unique regardless of case.
pub fn normalize_email(email: &str) -> String {
	email.trim().to_lowercase()
}
