// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read-only permission view for UI code.
//!
//! Every check delegates to the evaluator in `crm-rbac-core`, so the client
//! can never grant something the server's rules would not. Decisions made
//! here only shape what is shown; the server still enforces every request.

use crm_rbac_core::{
	has_all_permissions, has_any_permission, has_permission, has_role, is_super_admin, Action,
	Branch, Module, Principal, RoleName, UserId,
};

use crate::filter::{filter_for_principal, EntityType, Filterable};

/// A snapshot of the signed-in user's permissions.
///
/// An empty view (nobody signed in, or permissions not fetched yet) denies
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions {
	principal: Option<Principal>,
}

impl Permissions {
	pub fn new(principal: Principal) -> Self {
		Self {
			principal: Some(principal),
		}
	}

	pub fn empty() -> Self {
		Self::default()
	}

	pub fn principal(&self) -> Option<&Principal> {
		self.principal.as_ref()
	}

	pub fn is_authenticated(&self) -> bool {
		self.principal.is_some()
	}

	pub fn has_permission(&self, module: Module, action: Action) -> bool {
		self
			.principal
			.as_ref()
			.is_some_and(|p| has_permission(p, module, action))
	}

	pub fn has_any_permission(&self, required: &[(Module, Action)]) -> bool {
		self
			.principal
			.as_ref()
			.is_some_and(|p| has_any_permission(p, required))
	}

	pub fn has_all_permissions(&self, required: &[(Module, Action)]) -> bool {
		self
			.principal
			.as_ref()
			.is_some_and(|p| has_all_permissions(p, required))
	}

	pub fn has_role(&self, roles: &[RoleName]) -> bool {
		self.principal.as_ref().is_some_and(|p| has_role(p, roles))
	}

	pub fn is_super_admin(&self) -> bool {
		self.principal.as_ref().is_some_and(is_super_admin)
	}

	pub fn is_admin(&self) -> bool {
		self.has_role(&[RoleName::Admin, RoleName::SuperAdmin])
	}

	pub fn is_manager(&self) -> bool {
		self.has_role(&[RoleName::Manager])
	}

	pub fn is_agent(&self) -> bool {
		self.has_role(&[RoleName::Agent])
	}

	pub fn user_id(&self) -> Option<UserId> {
		self.principal.as_ref().map(|p| p.id)
	}

	pub fn user_role(&self) -> Option<RoleName> {
		self.principal.as_ref().and_then(|p| p.role)
	}

	pub fn user_branch(&self) -> Option<Branch> {
		self.principal.as_ref().map(|p| p.branch)
	}

	/// The records of `entity` this user should see in a list.
	///
	/// Nothing is returned without view permission on the entity's module.
	/// Agents are narrowed to their own records; other roles see everything.
	pub fn get_filtered_data<T>(&self, data: &[T], entity: EntityType) -> Vec<T>
	where
		T: Filterable + Clone,
	{
		if !self.has_permission(entity, Action::View) {
			return Vec::new();
		}
		filter_for_principal(self.principal.as_ref(), data)
	}
}

impl From<Principal> for Permissions {
	fn from(principal: Principal) -> Self {
		Self::new(principal)
	}
}
