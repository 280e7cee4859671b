// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Enabled/disabled state of individual controls.

use crm_rbac_core::{format_requirements, Action, Module};

use crate::permissions::Permissions;

/// How a control bound to a permission should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionState {
	Enabled,
	/// Render disabled with an indicator; `tooltip` explains why on hover.
	Disabled { tooltip: String },
}

impl ActionState {
	pub fn is_enabled(&self) -> bool {
		matches!(self, ActionState::Enabled)
	}

	pub fn tooltip(&self) -> Option<&str> {
		match self {
			ActionState::Enabled => None,
			ActionState::Disabled { tooltip } => Some(tooltip),
		}
	}
}

/// Computes [`ActionState`]s from the local permission snapshot. No server
/// round trip is made.
#[derive(Debug, Clone, Copy)]
pub struct ActionControl<'a> {
	permissions: &'a Permissions,
}

impl<'a> ActionControl<'a> {
	pub fn new(permissions: &'a Permissions) -> Self {
		Self { permissions }
	}

	pub fn for_permission(&self, module: Module, action: Action) -> ActionState {
		if self.permissions.has_permission(module, action) {
			ActionState::Enabled
		} else {
			ActionState::Disabled {
				tooltip: missing_permission_tooltip(module, action),
			}
		}
	}

	pub fn for_any_permission(&self, required: &[(Module, Action)]) -> ActionState {
		if self.permissions.has_any_permission(required) {
			ActionState::Enabled
		} else {
			ActionState::Disabled {
				tooltip: format!(
					"You need one of these permissions: {}",
					format_requirements(required)
				),
			}
		}
	}
}

fn missing_permission_tooltip(module: Module, action: Action) -> String {
	let verb = action.as_str().replace('_', " ");
	format!("You don't have permission to {verb} {module} ({module}:{action})")
}
