// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client SDK for CRM permissions.
//!
//! Everything here is advisory: it decides what the UI shows, never what the
//! server allows. The server evaluates every request against the stored role.
//!
//! # Features
//!
//! - **Permission fetch**: [`PermissionsClient`] loads the signed-in user's
//!   permission set into a shared [`PermissionStore`]
//! - **Checks**: [`Permissions`] answers permission, role and branch questions
//!   with the same evaluator the server uses
//! - **Pages and controls**: [`RouteGuard`] explains denied pages,
//!   [`ActionControl`] disables controls with a tooltip
//! - **List filtering**: [`filter_for_principal`] narrows agent lists
//! - **Live updates**: [`PermissionSubscriber`] refetches on change notices
//!   and asks the UI to reload
//!
//! # Example
//!
//! ```ignore
//! use crm_client::{ActionControl, PermissionSubscriber, PermissionsClient, SubscriberConfig};
//! use crm_rbac_core::{Action, Module};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PermissionsClient::builder()
//!         .base_url("https://crm.example.com")
//!         .token(session_token)
//!         .build()?;
//!
//!     let permissions = client.fetch_permissions().await?;
//!     let delete = ActionControl::new(&permissions).for_permission(Module::Clients, Action::Delete);
//!
//!     let mut subscriber = PermissionSubscriber::new(client, SubscriberConfig::default());
//!     let mut signals = subscriber.signals();
//!     subscriber.start().await?;
//!
//!     while let Ok(signal) = signals.recv().await {
//!         // show notices, reload on request
//!     }
//!     Ok(())
//! }
//! ```

mod action;
mod client;
mod error;
mod filter;
mod permissions;
mod route;
mod store;
mod subscriber;

pub use action::{ActionControl, ActionState};
pub use client::{PermissionsClient, PermissionsClientBuilder};
pub use error::{ClientError, Result};
pub use filter::{filter_for_principal, EntityType, Filterable};
pub use permissions::Permissions;
pub use route::{route_table, Access, AccessDecision, RouteGuard, RouteRequirement, LOGIN_PATH, SAFE_PATH};
pub use store::PermissionStore;
pub use subscriber::{
	reconnect_delay, EventOutcome, PermissionNotice, PermissionSubscriber, RefetchHandle,
	RefetchStatus, ReloadRequest, SubscriberConfig, UiSignal, DEFAULT_RELOAD_GRACE,
	PERMISSIONS_CHANGED_MESSAGE,
};
