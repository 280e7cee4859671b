// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::permission::PermissionSet;
use crate::role::{flatten, Role};
use crate::types::{Branch, RoleName, UserId};

/// The authenticated identity a decision is made for.
///
/// `role` is optional so that a user whose role reference is dangling or whose
/// role document is unreadable can still be represented; such a principal is
/// denied everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
	pub id: UserId,
	pub role: Option<RoleName>,
	pub branch: Branch,
	pub permissions: PermissionSet,
}

impl Principal {
	pub fn new(id: UserId, role: Option<RoleName>, branch: Branch, permissions: PermissionSet) -> Self {
		Self {
			id,
			role,
			branch,
			permissions,
		}
	}

	/// Builds a principal whose permissions are derived from `role` right now.
	pub fn from_role(id: UserId, branch: Branch, role: Option<&Role>) -> Self {
		Self {
			id,
			role: role.map(|r| r.name),
			branch,
			permissions: role.map(flatten).unwrap_or_default(),
		}
	}

	pub fn role_is(&self, name: RoleName) -> bool {
		self.role == Some(name)
	}
}
