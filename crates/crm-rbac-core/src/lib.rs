// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role-based access control for the CRM.
//!
//! This crate is the single definition of "who may do what", compiled into
//! both the server and the client SDK so the two can never disagree:
//!
//! - **Model**: [`Module`], [`Action`], [`RoleName`], [`Branch`], [`Permission`],
//!   [`Role`] and the flattened `"module:action"` form ([`FlatPermission`],
//!   [`PermissionSet`])
//! - **Evaluator**: pure decision functions ([`has_permission`],
//!   [`has_any_permission`], [`has_all_permissions`], [`has_role`],
//!   [`can_access_owned_resource`], [`is_same_branch`])
//! - **Events**: the wire contract for permission-change propagation
//!   ([`PermissionEvent`])
//!
//! Nothing in here performs I/O.

pub mod error;
pub mod evaluator;
pub mod event;
pub mod permission;
pub mod principal;
pub mod role;
pub mod types;

pub use error::{ParseError, RoleValidationError};
pub use evaluator::{
	can_access_owned_resource, can_access_owned_resource_with, has_all_permissions,
	has_any_permission, has_permission, has_role, is_branch_exempt, is_record_visible, is_same_branch,
	is_super_admin, BRANCH_EXEMPT_ROLES, DEFAULT_OVERRIDE_ROLES, UNRESTRICTED_RECORD_ROLES,
};
pub use event::{
	ConnectedData, HeartbeatData, PermissionEvent, RoleChangeData, SessionRevokedData,
	UserRoleChangeData,
};
pub use permission::{format_requirements, FlatPermission, Permission, PermissionSet};
pub use principal::Principal;
pub use role::{default_permissions, flatten, Role};
pub use types::{Action, Branch, Module, RoleId, RoleName, SessionId, UserId};
