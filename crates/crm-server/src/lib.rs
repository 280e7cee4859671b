// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! CRM access-control server.
//!
//! Every request is authenticated, its principal's permissions are derived
//! from the role as currently stored, and route guards decide before any
//! handler runs. Permission changes are pushed to live clients over SSE; the
//! push only shortens how long a client shows stale controls, the server's
//! per-request evaluation is what enforces access.

pub mod api;
pub mod auth_middleware;
pub mod broadcaster;
pub mod error;
pub mod guards;
pub mod jobs;
pub mod routes;
pub mod seed;
pub mod version;

pub use api::{create_app_state, create_router, AppState, AuthSettings};
pub use broadcaster::{BroadcasterConfig, ChannelKey, PermissionsBroadcaster};
pub use crm_server_config::ServerConfig;
pub use error::{ErrorResponse, ServerError};
pub use guards::{
	require, require_admin, require_all_permissions, require_any_permission, require_permission,
	require_role, GuardLayer, OwnerLookup, RequireOwnershipLayer, Requirement,
};
