// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission evaluation.
//!
//! Every access decision in the server guards and the client SDK goes through
//! these functions. Evaluation order for permission checks:
//!
//! 1. **super_admin**: granted unconditionally ([`is_super_admin`] is the only
//!    place this rule lives)
//! 2. **Membership**: granted iff `"module:action"` is in the principal's
//!    flattened set
//!
//! A principal with no role or an empty set is denied everything it is not a
//! super_admin for. All functions are pure.

use tracing::instrument;

use crate::principal::Principal;
use crate::types::{Action, Branch, Module, RoleName, UserId};

/// Roles that may access resources owned by someone else.
pub const DEFAULT_OVERRIDE_ROLES: &[RoleName] = &[RoleName::Admin, RoleName::SuperAdmin];

/// Roles exempt from branch restrictions.
pub const BRANCH_EXEMPT_ROLES: &[RoleName] = &[RoleName::Admin, RoleName::SuperAdmin];

/// Roles that see every record of a module they may view, in lists and by id.
pub const UNRESTRICTED_RECORD_ROLES: &[RoleName] =
	&[RoleName::Manager, RoleName::Admin, RoleName::SuperAdmin];

pub fn is_super_admin(principal: &Principal) -> bool {
	principal.role_is(RoleName::SuperAdmin)
}

#[instrument(
	level = "debug",
	skip_all,
	fields(user_id = %principal.id, role = ?principal.role, module = %module, action = %action)
)]
pub fn has_permission(principal: &Principal, module: Module, action: Action) -> bool {
	if is_super_admin(principal) {
		return true;
	}
	principal.permissions.contains(module, action)
}

/// True if at least one pair is granted. An empty list grants nothing.
pub fn has_any_permission(principal: &Principal, required: &[(Module, Action)]) -> bool {
	required
		.iter()
		.any(|(module, action)| has_permission(principal, *module, *action))
}

/// True only if every pair is granted.
pub fn has_all_permissions(principal: &Principal, required: &[(Module, Action)]) -> bool {
	required
		.iter()
		.all(|(module, action)| has_permission(principal, *module, *action))
}

/// Exact role match against any of `roles`.
pub fn has_role(principal: &Principal, roles: &[RoleName]) -> bool {
	principal.role.is_some_and(|role| roles.contains(&role))
}

/// Ownership check with the default override roles (admin, super_admin).
pub fn can_access_owned_resource(principal: &Principal, owner_id: &UserId) -> bool {
	can_access_owned_resource_with(principal, owner_id, DEFAULT_OVERRIDE_ROLES)
}

#[instrument(
	level = "debug",
	skip_all,
	fields(user_id = %principal.id, owner_id = %owner_id)
)]
pub fn can_access_owned_resource_with(
	principal: &Principal,
	owner_id: &UserId,
	override_roles: &[RoleName],
) -> bool {
	has_role(principal, override_roles) || principal.id == *owner_id
}

pub fn is_branch_exempt(principal: &Principal) -> bool {
	has_role(principal, BRANCH_EXEMPT_ROLES)
}

pub fn is_same_branch(principal: &Principal, record_branch: Branch) -> bool {
	is_branch_exempt(principal) || principal.branch == record_branch
}

/// Whether a list record is visible to `principal`.
///
/// [`UNRESTRICTED_RECORD_ROLES`] see everything. Agents see records they own
/// or are assigned to, within their own branch. A principal without a role
/// sees nothing.
pub fn is_record_visible(
	principal: &Principal,
	owner_id: Option<&UserId>,
	assigned_to: Option<&UserId>,
	branch: Option<Branch>,
) -> bool {
	if has_role(principal, UNRESTRICTED_RECORD_ROLES) {
		return true;
	}
	if !principal.role_is(RoleName::Agent) {
		return false;
	}
	let own = owner_id == Some(&principal.id) || assigned_to == Some(&principal.id);
	own && branch.map_or(true, |b| is_same_branch(principal, b))
}
