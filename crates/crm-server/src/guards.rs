// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Route-level authorization guards.
//!
//! Guards are tower layers placed after [`auth_layer`](crate::auth_middleware::auth_layer):
//!
//! - [`require_permission`] - one `module:action` pair
//! - [`require_any_permission`] - at least one of several pairs
//! - [`require_all_permissions`] - every one of several pairs
//! - [`require_role`] - exact role membership
//! - [`RequireOwnershipLayer`] - the resource belongs to the caller, unless the
//!   caller is admin or super_admin
//!
//! Every guard rejects an unauthenticated request with 401 and an unsatisfied
//! requirement with 403 naming what was missing. A panic while evaluating a
//! requirement becomes a 500; access is never granted on error.
//!
//! ```ignore
//! Router::new()
//!     .route("/api/clients/{id}", delete(clients::delete_client))
//!     .route_layer(require_permission(Module::Clients, Action::Delete))
//! ```

use std::{
	fmt,
	future::Future,
	panic::AssertUnwindSafe,
	pin::Pin,
	sync::Arc,
	task::{Context, Poll},
};

use async_trait::async_trait;
use axum::{
	body::Body,
	extract::{FromRequestParts, RawPathParams},
	http::{request::Parts, Request},
	response::{IntoResponse, Response},
};
use crm_rbac_core::{
	can_access_owned_resource_with, format_requirements, has_all_permissions, has_any_permission,
	has_permission, has_role, Action, Module, Principal, RoleName, UserId,
	DEFAULT_OVERRIDE_ROLES,
};
use crm_server_auth::{AuditEvent, AuditEventType, AuthContext};
use futures::{future::BoxFuture, FutureExt};
use pin_project_lite::pin_project;
use tower::{Layer, Service};

use crate::error::{forbidden_response, internal_error_response, unauthorized_response, ServerError};

pub const OWNERSHIP_DENIED: &str = "Access denied. You can only access your own resources";

type Predicate = Arc<dyn Fn(&Principal) -> bool + Send + Sync>;

/// What a route demands of the caller.
#[derive(Clone)]
pub enum Requirement {
	Permission(Module, Action),
	AnyPermission(Vec<(Module, Action)>),
	AllPermissions(Vec<(Module, Action)>),
	Role(Vec<RoleName>),
	/// An ad-hoc rule; `description` completes "Access denied. ..."
	Predicate { description: String, check: Predicate },
}

impl fmt::Debug for Requirement {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Requirement::Permission(m, a) => write!(f, "Permission({m}:{a})"),
			Requirement::AnyPermission(p) => write!(f, "AnyPermission({})", format_requirements(p)),
			Requirement::AllPermissions(p) => write!(f, "AllPermissions({})", format_requirements(p)),
			Requirement::Role(roles) => write!(f, "Role({})", join_roles(roles)),
			Requirement::Predicate { description, .. } => write!(f, "Predicate({description})"),
		}
	}
}

impl Requirement {
	pub fn is_satisfied_by(&self, principal: &Principal) -> bool {
		match self {
			Requirement::Permission(module, action) => has_permission(principal, *module, *action),
			Requirement::AnyPermission(required) => has_any_permission(principal, required),
			Requirement::AllPermissions(required) => has_all_permissions(principal, required),
			Requirement::Role(roles) => has_role(principal, roles),
			Requirement::Predicate { check, .. } => check(principal),
		}
	}

	pub fn denial_message(&self) -> String {
		match self {
			Requirement::Permission(module, action) => {
				format!("Access denied. Required permission: {module}:{action}")
			}
			Requirement::AnyPermission(required) => format!(
				"Access denied. Required any of permissions: {}",
				format_requirements(required)
			),
			Requirement::AllPermissions(required) => format!(
				"Access denied. Required all permissions: {}",
				format_requirements(required)
			),
			Requirement::Role(roles) => {
				format!("Access denied. Required role: {}", join_roles(roles))
			}
			Requirement::Predicate { description, .. } => format!("Access denied. {description}"),
		}
	}
}

fn join_roles(roles: &[RoleName]) -> String {
	roles
		.iter()
		.map(RoleName::as_str)
		.collect::<Vec<_>>()
		.join(", ")
}

pub fn require_permission(module: Module, action: Action) -> GuardLayer {
	GuardLayer::new(Requirement::Permission(module, action))
}

pub fn require_any_permission(required: impl IntoIterator<Item = (Module, Action)>) -> GuardLayer {
	GuardLayer::new(Requirement::AnyPermission(required.into_iter().collect()))
}

pub fn require_all_permissions(required: impl IntoIterator<Item = (Module, Action)>) -> GuardLayer {
	GuardLayer::new(Requirement::AllPermissions(required.into_iter().collect()))
}

pub fn require_role(roles: impl IntoIterator<Item = RoleName>) -> GuardLayer {
	GuardLayer::new(Requirement::Role(roles.into_iter().collect()))
}

/// admin or super_admin.
pub fn require_admin() -> GuardLayer {
	require_role([RoleName::Admin, RoleName::SuperAdmin])
}

pub fn require(
	description: impl Into<String>,
	check: impl Fn(&Principal) -> bool + Send + Sync + 'static,
) -> GuardLayer {
	GuardLayer::new(Requirement::Predicate {
		description: description.into(),
		check: Arc::new(check),
	})
}

// =============================================================================
// Requirement guard
// =============================================================================

#[derive(Clone)]
pub struct GuardLayer {
	requirement: Arc<Requirement>,
}

impl GuardLayer {
	pub fn new(requirement: Requirement) -> Self {
		Self {
			requirement: Arc::new(requirement),
		}
	}

	pub fn requirement(&self) -> &Requirement {
		&self.requirement
	}
}

impl<S> Layer<S> for GuardLayer {
	type Service = GuardService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		GuardService {
			inner,
			requirement: Arc::clone(&self.requirement),
		}
	}
}

#[derive(Clone)]
pub struct GuardService<S> {
	inner: S,
	requirement: Arc<Requirement>,
}

enum Decision {
	Granted,
	Rejected(Response),
}

/// Evaluate `requirement` against the request's auth context.
fn decide(requirement: &Requirement, ctx: Option<&AuthContext>, path: &str) -> Decision {
	let Some(user) = ctx.and_then(AuthContext::user) else {
		tracing::debug!(requirement = ?requirement, "Guard denied: not authenticated");
		return Decision::Rejected(unauthorized_response());
	};
	let principal = &user.principal;

	let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| requirement.is_satisfied_by(principal)));

	match outcome {
		Ok(true) => {
			tracing::debug!(user_id = %principal.id, requirement = ?requirement, "Guard passed");
			Decision::Granted
		}
		Ok(false) => {
			let message = requirement.denial_message();
			tracing::info!(
				user_id = %principal.id,
				role = ?principal.role,
				requirement = ?requirement,
				"Guard denied: requirement not met"
			);
			AuditEvent::new(AuditEventType::AccessDenied)
				.actor(principal.id)
				.resource(path)
				.detail(message.clone())
				.emit();
			Decision::Rejected(forbidden_response(message))
		}
		Err(_) => {
			tracing::error!(user_id = %principal.id, requirement = ?requirement, "Guard check panicked");
			Decision::Rejected(internal_error_response())
		}
	}
}

impl<S> Service<Request<Body>> for GuardService<S>
where
	S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
	S::Future: Send,
{
	type Response = Response;
	type Error = S::Error;
	type Future = GuardFuture<S::Future>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, req: Request<Body>) -> Self::Future {
		let decision = decide(
			&self.requirement,
			req.extensions().get::<AuthContext>(),
			req.uri().path(),
		);

		match decision {
			Decision::Granted => GuardFuture::Inner {
				fut: self.inner.call(req),
			},
			Decision::Rejected(resp) => GuardFuture::Rejected { resp: Some(resp) },
		}
	}
}

pin_project! {
	#[project = GuardFutureProj]
	pub enum GuardFuture<F> {
		Inner { #[pin] fut: F },
		Rejected { resp: Option<Response> },
	}
}

impl<F, E> Future for GuardFuture<F>
where
	F: Future<Output = Result<Response, E>>,
{
	type Output = Result<Response, E>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match self.project() {
			GuardFutureProj::Inner { fut } => fut.poll(cx),
			GuardFutureProj::Rejected { resp } => {
				Poll::Ready(Ok(resp.take().unwrap_or_else(internal_error_response)))
			}
		}
	}
}

// =============================================================================
// Ownership guard
// =============================================================================

/// Resolves who owns the resource named by a path parameter.
#[async_trait]
pub trait OwnerLookup: Send + Sync {
	/// `Ok(None)` means the resource does not exist.
	async fn owner_of(&self, resource_id: &str) -> Result<Option<UserId>, ServerError>;
}

#[derive(Clone)]
enum OwnerSource {
	/// The path parameter is the owner's user id.
	PathParam,
	Lookup(Arc<dyn OwnerLookup>),
}

#[derive(Clone)]
pub struct RequireOwnershipLayer {
	param: &'static str,
	source: OwnerSource,
	override_roles: &'static [RoleName],
}

impl RequireOwnershipLayer {
	/// The path parameter `param` holds the owning user's id.
	pub fn path_param(param: &'static str) -> Self {
		Self {
			param,
			source: OwnerSource::PathParam,
			override_roles: DEFAULT_OVERRIDE_ROLES,
		}
	}

	/// The path parameter `param` identifies a resource whose owner `lookup` resolves.
	pub fn lookup(param: &'static str, lookup: Arc<dyn OwnerLookup>) -> Self {
		Self {
			param,
			source: OwnerSource::Lookup(lookup),
			override_roles: DEFAULT_OVERRIDE_ROLES,
		}
	}

	/// Roles allowed through regardless of ownership. Defaults to
	/// [`DEFAULT_OVERRIDE_ROLES`].
	pub fn override_roles(mut self, roles: &'static [RoleName]) -> Self {
		self.override_roles = roles;
		self
	}
}

impl<S> Layer<S> for RequireOwnershipLayer {
	type Service = RequireOwnershipService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		RequireOwnershipService {
			inner,
			param: self.param,
			source: self.source.clone(),
			override_roles: self.override_roles,
		}
	}
}

#[derive(Clone)]
pub struct RequireOwnershipService<S> {
	inner: S,
	param: &'static str,
	source: OwnerSource,
	override_roles: &'static [RoleName],
}

impl<S> Service<Request<Body>> for RequireOwnershipService<S>
where
	S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
	S::Future: Send,
{
	type Response = Response;
	type Error = S::Error;
	type Future = BoxFuture<'static, Result<Response, S::Error>>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, req: Request<Body>) -> Self::Future {
		let clone = self.inner.clone();
		let mut inner = std::mem::replace(&mut self.inner, clone);
		let param = self.param;
		let source = self.source.clone();
		let override_roles = self.override_roles;

		Box::pin(async move {
			let (mut parts, body) = req.into_parts();
			let outcome = AssertUnwindSafe(check_ownership(&mut parts, param, &source, override_roles))
				.catch_unwind()
				.await;
			let req = Request::from_parts(parts, body);

			match outcome {
				Ok(Decision::Granted) => inner.call(req).await,
				Ok(Decision::Rejected(resp)) => Ok(resp),
				Err(_) => {
					tracing::error!(param, "Ownership check panicked");
					Ok(internal_error_response())
				}
			}
		})
	}
}

async fn check_ownership(
	parts: &mut Parts,
	param: &'static str,
	source: &OwnerSource,
	override_roles: &[RoleName],
) -> Decision {
	let Some(user) = parts
		.extensions
		.get::<AuthContext>()
		.and_then(|ctx| ctx.current_user.clone())
	else {
		tracing::debug!(param, "Ownership denied: not authenticated");
		return Decision::Rejected(unauthorized_response());
	};
	let principal = &user.principal;

	// Override roles need no lookup.
	if has_role(principal, override_roles) {
		return Decision::Granted;
	}

	let raw = match RawPathParams::from_request_parts(parts, &()).await {
		Ok(params) => params
			.iter()
			.find(|(key, _)| *key == param)
			.map(|(_, value)| value.to_string()),
		Err(e) => {
			tracing::error!(param, error = %e, "Ownership guard could not read path parameters");
			None
		}
	};
	let Some(raw) = raw else {
		tracing::error!(param, "Ownership guard is missing its path parameter");
		return Decision::Rejected(internal_error_response());
	};

	let owner = match source {
		OwnerSource::PathParam => raw.parse::<UserId>().ok(),
		OwnerSource::Lookup(lookup) => match lookup.owner_of(&raw).await {
			Ok(Some(owner)) => Some(owner),
			Ok(None) => return Decision::Rejected(ServerError::NotFound("Resource".into()).into_response()),
			Err(e) => return Decision::Rejected(e.into_response()),
		},
	};

	match owner {
		Some(owner) if can_access_owned_resource_with(principal, &owner, override_roles) => {
			Decision::Granted
		}
		_ => {
			tracing::info!(
				user_id = %principal.id,
				resource = %raw,
				"Ownership denied: resource belongs to another user"
			);
			AuditEvent::new(AuditEventType::AccessDenied)
				.actor(principal.id)
				.resource(parts.uri.path())
				.detail(OWNERSHIP_DENIED)
				.emit();
			Decision::Rejected(forbidden_response(OWNERSHIP_DENIED))
		}
	}
}
