// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role documents and permission flattening.
//!
//! A [`Role`] is data only. `super_admin`'s unlimited access is a rule applied
//! by the evaluator and is never materialized into its permission list.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::RoleValidationError;
use crate::permission::{Permission, PermissionSet};
use crate::types::{Action, Module, RoleId, RoleName};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
	pub id: RoleId,
	pub name: RoleName,
	pub display_name: String,
	pub permissions: Vec<Permission>,
	pub is_default: bool,
}

impl Role {
	pub fn new(name: RoleName, display_name: impl Into<String>, permissions: Vec<Permission>) -> Self {
		Self {
			id: RoleId::generate(),
			name,
			display_name: display_name.into(),
			permissions,
			is_default: false,
		}
	}

	/// The role as it is seeded on a fresh installation.
	pub fn seeded(name: RoleName) -> Self {
		Self {
			is_default: name == RoleName::Agent,
			..Self::new(name, name.default_display_name(), default_permissions(name))
		}
	}

	pub fn with_default(mut self, is_default: bool) -> Self {
		self.is_default = is_default;
		self
	}

	pub fn permission_for(&self, module: Module) -> Option<&Permission> {
		self.permissions.iter().find(|p| p.module == module)
	}

	pub fn validate(&self) -> Result<(), RoleValidationError> {
		if self.display_name.trim().is_empty() {
			return Err(RoleValidationError::EmptyDisplayName);
		}
		validate_permissions(&self.permissions)
	}
}

/// Checks that no module appears twice in a permission matrix.
pub fn validate_permissions(permissions: &[Permission]) -> Result<(), RoleValidationError> {
	let mut seen = BTreeSet::new();
	for permission in permissions {
		if !seen.insert(permission.module) {
			return Err(RoleValidationError::DuplicateModule(permission.module));
		}
	}
	Ok(())
}

/// Expands a role's permission matrix into its `"module:action"` set.
pub fn flatten(role: &Role) -> PermissionSet {
	role.permissions.iter().flat_map(Permission::flat).collect()
}

/// Permission matrix each role starts with on a fresh installation.
pub fn default_permissions(name: RoleName) -> Vec<Permission> {
	use Action::*;
	use Module::*;

	match name {
		RoleName::Agent => vec![
			Permission::new(Clients, [View, Create, Edit]),
			Permission::new(Leads, [View, Create, Edit]),
			Permission::new(Quotations, [View, Create, Edit]),
			Permission::new(Policies, [View]),
			Permission::new(Claims, [View]),
			Permission::new(Activities, [View, Create, Edit]),
			Permission::new(Offers, [View, Create, Edit]),
		],
		RoleName::Manager => vec![
			Permission::new(Clients, [View, Create, Edit, Delete, Export]),
			Permission::new(Leads, [View, Create, Edit, Delete, Export]),
			Permission::new(Quotations, [View, Create, Edit, Delete, Export]),
			Permission::new(Policies, [View, Create, Edit, Approve, Export]),
			Permission::new(Claims, [View, Create, Edit, Approve, Export]),
			Permission::new(Invoices, [View, Create, Edit, Approve, Export]),
			Permission::new(Agents, [View]),
			Permission::new(Reports, [View, Export]),
			Permission::new(Activities, [View, Create, Edit]),
			Permission::new(Offers, [View, Create, Edit]),
		],
		RoleName::Admin => Module::all()
			.iter()
			.map(|module| match module {
				Settings => Permission::new(Settings, [View, Edit]),
				other => Permission::new(*other, Action::all().iter().copied()),
			})
			.collect(),
		RoleName::SuperAdmin => Vec::new(),
	}
}
