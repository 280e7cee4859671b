// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::types::Module;

/// Failure to parse one of the closed RBAC vocabularies from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
	#[error("unknown {kind}: '{value}'")]
	UnknownVariant { kind: &'static str, value: String },

	#[error("malformed permission '{0}', expected 'module:action'")]
	MalformedPermission(String),

	#[error("invalid id '{0}'")]
	InvalidId(String),
}

/// A role document that violates the permission matrix rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoleValidationError {
	#[error("module '{0}' appears more than once in the permission list")]
	DuplicateModule(Module),

	#[error("display name must not be empty")]
	EmptyDisplayName,
}
