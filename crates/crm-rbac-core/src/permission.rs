// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission entries and their flattened string form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::types::{Action, Module};

/// The actions a role may perform on one module.
///
/// Actions are a set: duplicates in stored or submitted data collapse on
/// deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
	pub module: Module,
	pub actions: BTreeSet<Action>,
}

impl Permission {
	pub fn new(module: Module, actions: impl IntoIterator<Item = Action>) -> Self {
		Self {
			module,
			actions: actions.into_iter().collect(),
		}
	}

	pub fn allows(&self, action: Action) -> bool {
		self.actions.contains(&action)
	}

	/// Iterates the flattened form of this entry.
	pub fn flat(&self) -> impl Iterator<Item = FlatPermission> + '_ {
		self
			.actions
			.iter()
			.map(move |action| FlatPermission::new(self.module, *action))
	}
}

/// A single granted capability, rendered as `"module:action"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct FlatPermission {
	pub module: Module,
	pub action: Action,
}

impl FlatPermission {
	pub fn new(module: Module, action: Action) -> Self {
		Self { module, action }
	}
}

impl fmt::Display for FlatPermission {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.module, self.action)
	}
}

impl FromStr for FlatPermission {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (module, action) = s
			.split_once(':')
			.ok_or_else(|| ParseError::MalformedPermission(s.to_string()))?;
		Ok(Self {
			module: module.parse()?,
			action: action.parse()?,
		})
	}
}

impl From<FlatPermission> for String {
	fn from(p: FlatPermission) -> Self {
		p.to_string()
	}
}

impl TryFrom<String> for FlatPermission {
	type Error = ParseError;

	fn try_from(s: String) -> Result<Self, Self::Error> {
		s.parse()
	}
}

impl From<(Module, Action)> for FlatPermission {
	fn from((module, action): (Module, Action)) -> Self {
		Self::new(module, action)
	}
}

/// The flattened permission set of a principal.
///
/// Serialized as a sorted array of `"module:action"` strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<FlatPermission>);

impl PermissionSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn contains(&self, module: Module, action: Action) -> bool {
		self.0.contains(&FlatPermission::new(module, action))
	}

	pub fn insert(&mut self, permission: FlatPermission) -> bool {
		self.0.insert(permission)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &FlatPermission> {
		self.0.iter()
	}

	pub fn to_strings(&self) -> Vec<String> {
		self.0.iter().map(ToString::to_string).collect()
	}

	/// Parses a list of `"module:action"` strings. Any malformed entry fails
	/// the whole set.
	pub fn from_strings<I, S>(items: I) -> Result<Self, ParseError>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		items
			.into_iter()
			.map(|s| s.as_ref().parse::<FlatPermission>())
			.collect()
	}
}

impl FromIterator<FlatPermission> for PermissionSet {
	fn from_iter<T: IntoIterator<Item = FlatPermission>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}

impl<'a> IntoIterator for &'a PermissionSet {
	type Item = &'a FlatPermission;
	type IntoIter = std::collections::btree_set::Iter<'a, FlatPermission>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.iter()
	}
}

/// Renders a requirement list for denial messages, e.g. `clients:view, leads:edit`.
pub fn format_requirements(required: &[(Module, Action)]) -> String {
	required
		.iter()
		.map(|(m, a)| FlatPermission::new(*m, *a).to_string())
		.collect::<Vec<_>>()
		.join(", ")
}
