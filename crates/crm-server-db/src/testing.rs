// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::Utc;
use crm_rbac_core::{Branch, Role, RoleName, UserId};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::pool::run_migrations;
use crate::role::RoleRepository;
use crate::user::{NewUser, UserRepository};

/// A migrated in-memory database. One connection so every query sees the same
/// database.
pub async fn create_test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str("sqlite::memory:")
		.unwrap()
		.foreign_keys(true);
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await
		.unwrap();
	run_migrations(&pool).await.unwrap();
	pool
}

pub async fn seed_role(pool: &SqlitePool, name: RoleName) -> Role {
	let repo = RoleRepository::new(pool.clone());
	match repo.load_role_by_name(name).await.unwrap() {
		Some(role) => role,
		None => {
			let role = Role::seeded(name);
			repo.create_role(&role).await.unwrap();
			role
		}
	}
}

pub async fn seed_user(pool: &SqlitePool, email: &str, role: Option<&Role>, branch: Branch) -> UserId {
	let repo = UserRepository::new(pool.clone());
	let user = repo
		.create_user(&NewUser {
			email: email.to_string(),
			password_hash: format!("hash-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default()),
			name: email.split('@').next().unwrap_or(email).to_string(),
			role_id: role.map(|r| r.id),
			branch,
		})
		.await
		.unwrap();
	user.id
}
