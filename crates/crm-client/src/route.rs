// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Page-level access checks.
//!
//! A denied page is rendered as an explanation with a way back, never as a
//! silent redirect.

use crm_rbac_core::{format_requirements, Action, Module, RoleName};

use crate::permissions::Permissions;

/// Where a denied page offers to take the user.
pub const SAFE_PATH: &str = "/dashboard";
/// Where an unauthenticated user is sent.
pub const LOGIN_PATH: &str = "/login";

/// What a page asks of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
	/// Any signed-in user.
	Authenticated,
	Permission(Module, Action),
	AnyPermission(Vec<(Module, Action)>),
	Role(Vec<RoleName>),
}

impl Access {
	pub fn is_satisfied_by(&self, permissions: &Permissions) -> bool {
		match self {
			Access::Authenticated => permissions.is_authenticated(),
			Access::Permission(module, action) => permissions.has_permission(*module, *action),
			Access::AnyPermission(required) => permissions.has_any_permission(required),
			Access::Role(roles) => permissions.has_role(roles),
		}
	}

	fn denial_reason(&self) -> String {
		match self {
			Access::Authenticated => "You need to sign in to view this page".to_string(),
			Access::Permission(module, action) => {
				format!("You need the {module}:{action} permission to view this page")
			}
			Access::AnyPermission(required) => format!(
				"You need one of these permissions to view this page: {}",
				format_requirements(required)
			),
			Access::Role(roles) => format!(
				"This page is limited to: {}",
				roles
					.iter()
					.map(RoleName::as_str)
					.collect::<Vec<_>>()
					.join(", ")
			),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequirement {
	pub path: &'static str,
	pub access: Access,
}

impl RouteRequirement {
	pub fn new(path: &'static str, access: Access) -> Self {
		Self { path, access }
	}

	fn matches(&self, path: &str) -> bool {
		path == self.path
			|| path
				.strip_prefix(self.path)
				.is_some_and(|rest| rest.starts_with('/'))
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
	Granted,
	Denied {
		reason: String,
		safe_path: &'static str,
	},
}

impl AccessDecision {
	pub fn is_granted(&self) -> bool {
		matches!(self, AccessDecision::Granted)
	}
}

/// The application's pages and what each requires.
pub fn route_table() -> Vec<RouteRequirement> {
	use Action::*;
	use Module::*;

	vec![
		RouteRequirement::new("/dashboard", Access::Authenticated),
		RouteRequirement::new("/clients/new", Access::Permission(Clients, Create)),
		RouteRequirement::new("/clients", Access::Permission(Clients, View)),
		RouteRequirement::new("/leads/new", Access::Permission(Leads, Create)),
		RouteRequirement::new("/leads", Access::Permission(Leads, View)),
		RouteRequirement::new("/quotations", Access::Permission(Quotations, View)),
		RouteRequirement::new("/policies", Access::Permission(Policies, View)),
		RouteRequirement::new("/claims", Access::Permission(Claims, View)),
		RouteRequirement::new("/invoices", Access::Permission(Invoices, View)),
		RouteRequirement::new("/agents", Access::Permission(Agents, View)),
		RouteRequirement::new(
			"/reports",
			Access::AnyPermission(vec![(Reports, View), (Reports, Export)]),
		),
		RouteRequirement::new("/activities", Access::Permission(Activities, View)),
		RouteRequirement::new("/offers", Access::Permission(Offers, View)),
		RouteRequirement::new(
			"/settings/roles",
			Access::Role(vec![RoleName::Admin, RoleName::SuperAdmin]),
		),
		RouteRequirement::new(
			"/settings/users",
			Access::Role(vec![RoleName::Admin, RoleName::SuperAdmin]),
		),
		RouteRequirement::new("/settings", Access::Permission(Settings, View)),
	]
}

/// Looks up a page's requirement and decides whether to render it.
#[derive(Debug, Clone)]
pub struct RouteGuard {
	routes: Vec<RouteRequirement>,
}

impl Default for RouteGuard {
	fn default() -> Self {
		Self::new(route_table())
	}
}

impl RouteGuard {
	pub fn new(routes: Vec<RouteRequirement>) -> Self {
		Self { routes }
	}

	/// The most specific requirement covering `path`.
	pub fn requirement_for(&self, path: &str) -> Option<&RouteRequirement> {
		self
			.routes
			.iter()
			.filter(|route| route.matches(path))
			.max_by_key(|route| route.path.len())
	}

	pub fn can_access_route(&self, permissions: &Permissions, path: &str) -> bool {
		self.check(permissions, path, None).is_granted()
	}

	/// Decide whether `path` renders. `extra` is an additional permission the
	/// page asks for on top of its route entry. Unlisted pages only require a
	/// signed-in user.
	pub fn check(
		&self,
		permissions: &Permissions,
		path: &str,
		extra: Option<(Module, Action)>,
	) -> AccessDecision {
		if !permissions.is_authenticated() {
			return AccessDecision::Denied {
				reason: Access::Authenticated.denial_reason(),
				safe_path: LOGIN_PATH,
			};
		}

		let access = self
			.requirement_for(path)
			.map_or(&Access::Authenticated, |route| &route.access);
		if !access.is_satisfied_by(permissions) {
			tracing::debug!(path, role = ?permissions.user_role(), "Route denied");
			return AccessDecision::Denied {
				reason: access.denial_reason(),
				safe_path: SAFE_PATH,
			};
		}

		if let Some((module, action)) = extra {
			let access = Access::Permission(module, action);
			if !access.is_satisfied_by(permissions) {
				return AccessDecision::Denied {
					reason: access.denial_reason(),
					safe_path: SAFE_PATH,
				};
			}
		}

		AccessDecision::Granted
	}
}
