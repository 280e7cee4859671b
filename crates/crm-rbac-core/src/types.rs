// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core vocabulary of the permission model.
//!
//! - **ID newtypes**: [`UserId`], [`RoleId`], [`SessionId`] wrap UUIDs so a
//!   role id can never be passed where a user id is expected
//! - **Closed enums**: [`Module`], [`Action`], [`RoleName`] and [`Branch`].
//!   Each has a fixed wire form (snake_case) shared by serde, [`fmt::Display`]
//!   and [`FromStr`]; unknown strings are rejected rather than coerced.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ParseError;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = ParseError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s)
					.map(Self)
					.map_err(|_| ParseError::InvalidId(s.to_string()))
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(UserId, "Unique identifier for a user (principal).");
define_id_type!(RoleId, "Unique identifier for a role document.");
define_id_type!(SessionId, "Unique identifier for a login session.");

// =============================================================================
// Closed Enumerations
// =============================================================================

macro_rules! closed_enum {
	(
		$(#[$meta:meta])*
		$name:ident ($kind:literal) {
			$($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
		}
	) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(rename_all = "snake_case")]
		pub enum $name {
			$($(#[$vmeta])* $variant),+
		}

		impl $name {
			/// Returns every value, in declaration order.
			pub fn all() -> &'static [$name] {
				&[$($name::$variant),+]
			}

			/// Wire form of the value.
			pub fn as_str(&self) -> &'static str {
				match self {
					$($name::$variant => $wire),+
				}
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(self.as_str())
			}
		}

		impl FromStr for $name {
			type Err = ParseError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				match s {
					$($wire => Ok($name::$variant),)+
					other => Err(ParseError::UnknownVariant {
						kind: $kind,
						value: other.to_string(),
					}),
				}
			}
		}
	};
}

closed_enum! {
	/// Coarse resource category a permission applies to.
	Module ("module") {
		Clients => "clients",
		Leads => "leads",
		Quotations => "quotations",
		Policies => "policies",
		Claims => "claims",
		Invoices => "invoices",
		Agents => "agents",
		Reports => "reports",
		Settings => "settings",
		Activities => "activities",
		Offers => "offers",
	}
}

closed_enum! {
	/// Operation on a module.
	///
	/// `EditSensitive` and `EditStatus` are reserved fine-grained actions. They
	/// are granted and checked independently; holding `Edit` never implies them.
	Action ("action") {
		View => "view",
		Create => "create",
		Edit => "edit",
		Delete => "delete",
		Export => "export",
		Approve => "approve",
		EditSensitive => "edit_sensitive",
		EditStatus => "edit_status",
	}
}

closed_enum! {
	/// Name of a role document. Unique across roles.
	RoleName ("role") {
		Agent => "agent",
		Manager => "manager",
		Admin => "admin",
		SuperAdmin => "super_admin",
	}
}

closed_enum! {
	/// Office a user or record belongs to.
	Branch ("branch") {
		Main => "main",
		North => "north",
		South => "south",
		East => "east",
		West => "west",
	}
}

impl RoleName {
	/// Human label used when seeding role documents.
	pub fn default_display_name(&self) -> &'static str {
		match self {
			RoleName::Agent => "Agent",
			RoleName::Manager => "Manager",
			RoleName::Admin => "Administrator",
			RoleName::SuperAdmin => "Super Administrator",
		}
	}
}

impl Default for Branch {
	fn default() -> Self {
		Branch::Main
	}
}
