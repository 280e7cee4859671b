// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Installation seeding: default roles and an initial super_admin account.

use crm_rbac_core::{Branch, Role, RoleName};
use crm_server_auth::{hash_password, normalize_email, validate_password_strength, User};
use crm_server_db::{NewUser, RoleStore, UserStore};

use crate::error::{Result, ServerError};

#[derive(Debug)]
pub struct SeedReport {
	pub roles: Vec<Role>,
	/// Role assigned to accounts created without an explicit one.
	pub default_role: Option<Role>,
	/// The account created, `None` when none was requested or it already existed.
	pub admin: Option<User>,
}

/// Seed the default roles and, when credentials are given, a super_admin.
/// Safe to run repeatedly.
#[tracing::instrument(skip(role_repo, user_repo, admin_password))]
pub async fn seed_installation(
	role_repo: &dyn RoleStore,
	user_repo: &dyn UserStore,
	admin_email: Option<&str>,
	admin_password: Option<&str>,
) -> Result<SeedReport> {
	let roles = role_repo.seed_default_roles().await?;
	let default_role = role_repo.default_role().await?;
	tracing::info!(
		count = roles.len(),
		default_role = ?default_role.as_ref().map(|r| r.name),
		"Default roles present"
	);

	let (Some(email), Some(password)) = (admin_email, admin_password) else {
		return Ok(SeedReport {
			roles,
			default_role,
			admin: None,
		});
	};

	let email = normalize_email(email);
	if user_repo.get_user_by_email(&email).await?.is_some() {
		tracing::info!(%email, "Administrator already exists; leaving it unchanged");
		return Ok(SeedReport {
			roles,
			default_role,
			admin: None,
		});
	}

	validate_password_strength(password).map_err(ServerError::BadRequest)?;
	let super_admin = roles
		.iter()
		.find(|role| role.name == RoleName::SuperAdmin)
		.ok_or_else(|| ServerError::Internal("super_admin role missing after seeding".to_string()))?;

	let admin = user_repo
		.create_user(&NewUser {
			email,
			password_hash: hash_password(password)?,
			name: "Administrator".to_string(),
			role_id: Some(super_admin.id),
			branch: Branch::Main,
		})
		.await?;

	tracing::info!(user_id = %admin.id, "Created super_admin account");
	Ok(SeedReport {
		roles,
		default_role,
		admin: Some(admin),
	})
}
