// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request-scoped authentication state.
//!
//! This module provides:
//! - [`CurrentUser`] - the authenticated user plus its freshly derived [`Principal`]
//! - [`AuthContext`] - the per-request authentication outcome
//! - Credential extraction from the `Authorization` header or session cookie
//!
//! # Authentication Flow
//!
//! ```text
//! Request → Extract Token → hash → Session lookup → expiry/active checks
//!                                                  → load user + role (fresh)
//!                                                  → AuthContext
//! ```
//!
//! Token values are never logged.

use crm_rbac_core::{
	has_all_permissions, has_any_permission, has_permission, has_role, Action, Module, Principal,
	RoleName, SessionId,
};
use http::header::{AUTHORIZATION, COOKIE};
use http::HeaderMap;
use tracing::instrument;

use crate::user::UserWithRole;

pub const SESSION_COOKIE_NAME: &str = "crm_session";

/// The authenticated user of a request.
///
/// `principal` is computed from the role document loaded for this request,
/// never from the session snapshot.
#[derive(Debug, Clone)]
pub struct CurrentUser {
	pub account: UserWithRole,
	pub session_id: SessionId,
	pub principal: Principal,
}

impl CurrentUser {
	pub fn from_session(account: UserWithRole, session_id: SessionId) -> Self {
		let principal = account.principal();
		Self {
			account,
			session_id,
			principal,
		}
	}

	pub fn has_permission(&self, module: Module, action: Action) -> bool {
		has_permission(&self.principal, module, action)
	}

	pub fn has_any_permission(&self, required: &[(Module, Action)]) -> bool {
		has_any_permission(&self.principal, required)
	}

	pub fn has_all_permissions(&self, required: &[(Module, Action)]) -> bool {
		has_all_permissions(&self.principal, required)
	}

	pub fn has_role(&self, roles: &[RoleName]) -> bool {
		has_role(&self.principal, roles)
	}
}

/// Authentication outcome attached to every request.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
	pub current_user: Option<CurrentUser>,
}

impl AuthContext {
	pub fn unauthenticated() -> Self {
		Self { current_user: None }
	}

	pub fn authenticated(current_user: CurrentUser) -> Self {
		Self {
			current_user: Some(current_user),
		}
	}

	pub fn is_authenticated(&self) -> bool {
		self.current_user.is_some()
	}

	pub fn user(&self) -> Option<&CurrentUser> {
		self.current_user.as_ref()
	}

	pub fn require_user(&self) -> Result<&CurrentUser, AuthRequired> {
		self.current_user.as_ref().ok_or(AuthRequired)
	}

	/// Permission check bound to this request. Unauthenticated is always denied.
	pub fn has_permission(&self, module: Module, action: Action) -> bool {
		self
			.current_user
			.as_ref()
			.is_some_and(|user| user.has_permission(module, action))
	}
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("authentication required")]
pub struct AuthRequired;

#[instrument(level = "trace", skip_all)]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
	let auth_str = headers.get(AUTHORIZATION)?.to_str().ok()?;
	auth_str
		.strip_prefix("Bearer ")
		.map(str::trim)
		.filter(|token| !token.is_empty())
		.map(ToString::to_string)
}

#[instrument(level = "trace", skip_all)]
pub fn extract_session_cookie(headers: &HeaderMap) -> Option<String> {
	headers
		.get_all(COOKIE)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(|value| value.split(';'))
		.filter_map(|pair| pair.trim().split_once('='))
		.find(|(name, _)| *name == SESSION_COOKIE_NAME)
		.map(|(_, value)| value.to_string())
		.filter(|value| !value.is_empty())
}

/// Bearer header first, then the session cookie.
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
	extract_bearer_token(headers).or_else(|| extract_session_cookie(headers))
}
