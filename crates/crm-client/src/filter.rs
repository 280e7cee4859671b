// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role-based narrowing of list data.

use crm_rbac_core::{is_record_visible, Branch, Module, Principal, UserId};

/// The kind of record a list holds. Records are gated by their module's
/// `view` permission.
pub type EntityType = Module;

/// A record whose visibility depends on who owns it and where it lives.
///
/// Records without an owner, assignee or branch are only visible to roles
/// that are not narrowed.
pub trait Filterable {
	fn owner_id(&self) -> Option<&UserId>;

	fn assigned_to(&self) -> Option<&UserId> {
		None
	}

	fn branch(&self) -> Option<Branch> {
		None
	}
}

/// Keep the records `principal` may see. Agents are limited to records they
/// own or are assigned in their own branch; elevated roles pass through
/// untouched; no principal sees nothing.
pub fn filter_for_principal<T>(principal: Option<&Principal>, data: &[T]) -> Vec<T>
where
	T: Filterable + Clone,
{
	let Some(principal) = principal else {
		return Vec::new();
	};
	data
		.iter()
		.filter(|record| {
			is_record_visible(
				principal,
				record.owner_id(),
				record.assigned_to(),
				record.branch(),
			)
		})
		.cloned()
		.collect()
}
