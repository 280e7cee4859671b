// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role repository.
//!
//! Role documents are the persisted source of truth for permissions. Every
//! authenticated request reads them fresh; nothing here is cached.

use async_trait::async_trait;
use chrono::Utc;
use crm_rbac_core::{Permission, Role, RoleId, RoleName};
use sqlx::{sqlite::SqlitePool, sqlite::SqliteRow, Row};

use crate::error::DbError;
use crate::row::parse_column;

#[async_trait]
pub trait RoleStore: Send + Sync {
	async fn load_role(&self, id: &RoleId) -> Result<Option<Role>, DbError>;
	async fn load_role_by_name(&self, name: RoleName) -> Result<Option<Role>, DbError>;
	async fn list_roles(&self) -> Result<Vec<Role>, DbError>;
	async fn create_role(&self, role: &Role) -> Result<(), DbError>;
	async fn save_role_permissions(
		&self,
		id: &RoleId,
		permissions: &[Permission],
	) -> Result<Role, DbError>;
	async fn delete_role(&self, id: &RoleId) -> Result<(), DbError>;
	async fn default_role(&self) -> Result<Option<Role>, DbError>;
	async fn seed_default_roles(&self) -> Result<Vec<Role>, DbError>;
}

#[async_trait]
impl RoleStore for RoleRepository {
	async fn load_role(&self, id: &RoleId) -> Result<Option<Role>, DbError> {
		self.load_role(id).await
	}

	async fn load_role_by_name(&self, name: RoleName) -> Result<Option<Role>, DbError> {
		self.load_role_by_name(name).await
	}

	async fn list_roles(&self) -> Result<Vec<Role>, DbError> {
		self.list_roles().await
	}

	async fn create_role(&self, role: &Role) -> Result<(), DbError> {
		self.create_role(role).await
	}

	async fn save_role_permissions(
		&self,
		id: &RoleId,
		permissions: &[Permission],
	) -> Result<Role, DbError> {
		self.save_role_permissions(id, permissions).await
	}

	async fn delete_role(&self, id: &RoleId) -> Result<(), DbError> {
		self.delete_role(id).await
	}

	async fn default_role(&self) -> Result<Option<Role>, DbError> {
		self.default_role().await
	}

	async fn seed_default_roles(&self) -> Result<Vec<Role>, DbError> {
		self.seed_default_roles().await
	}
}

#[derive(Clone)]
pub struct RoleRepository {
	pool: SqlitePool,
}

impl RoleRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self), fields(role_id = %id))]
	pub async fn load_role(&self, id: &RoleId) -> Result<Option<Role>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, display_name, permissions, is_default
			FROM roles
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_role_row).transpose()
	}

	#[tracing::instrument(skip(self), fields(role = %name))]
	pub async fn load_role_by_name(&self, name: RoleName) -> Result<Option<Role>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, display_name, permissions, is_default
			FROM roles
			WHERE name = ?
			"#,
		)
		.bind(name.as_str())
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_role_row).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_roles(&self) -> Result<Vec<Role>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, name, display_name, permissions, is_default
			FROM roles
			ORDER BY created_at ASC
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_role_row).collect()
	}

	/// Insert a role document. A second role with the same name is a `Conflict`.
	#[tracing::instrument(skip(self, role), fields(role_id = %role.id, role = %role.name))]
	pub async fn create_role(&self, role: &Role) -> Result<(), DbError> {
		let now = Utc::now().to_rfc3339();
		let permissions = serde_json::to_string(&role.permissions)?;

		sqlx::query(
			r#"
			INSERT INTO roles (id, name, display_name, permissions, is_default, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(role.id.to_string())
		.bind(role.name.as_str())
		.bind(&role.display_name)
		.bind(&permissions)
		.bind(role.is_default)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_insert(e, &format!("role '{}'", role.name)))?;

		tracing::debug!(role_id = %role.id, "role created");
		Ok(())
	}

	/// Replace a role's permission matrix and return the stored document.
	#[tracing::instrument(skip(self, permissions), fields(role_id = %id, entries = permissions.len()))]
	pub async fn save_role_permissions(
		&self,
		id: &RoleId,
		permissions: &[Permission],
	) -> Result<Role, DbError> {
		let encoded = serde_json::to_string(permissions)?;

		let result = sqlx::query(
			r#"
			UPDATE roles
			SET permissions = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(&encoded)
		.bind(Utc::now().to_rfc3339())
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("role {id}")));
		}

		tracing::debug!(role_id = %id, "role permissions saved");
		self
			.load_role(id)
			.await?
			.ok_or_else(|| DbError::NotFound(format!("role {id}")))
	}

	/// Delete a role. Refused with `Conflict` while any user references it.
	#[tracing::instrument(skip(self), fields(role_id = %id))]
	pub async fn delete_role(&self, id: &RoleId) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;

		let referencing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role_id = ?")
			.bind(id.to_string())
			.fetch_one(&mut *tx)
			.await?;

		if referencing > 0 {
			return Err(DbError::Conflict(format!(
				"role {id} is assigned to {referencing} user(s)"
			)));
		}

		let result = sqlx::query("DELETE FROM roles WHERE id = ?")
			.bind(id.to_string())
			.execute(&mut *tx)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("role {id}")));
		}

		tx.commit().await?;
		tracing::debug!(role_id = %id, "role deleted");
		Ok(())
	}

	/// The role auto-assigned to new users, if one is marked default.
	#[tracing::instrument(skip(self))]
	pub async fn default_role(&self) -> Result<Option<Role>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, display_name, permissions, is_default
			FROM roles
			WHERE is_default = 1
			ORDER BY created_at ASC
			LIMIT 1
			"#,
		)
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_role_row).transpose()
	}

	/// Create any missing built-in role with its default matrix. Existing roles
	/// are left untouched.
	#[tracing::instrument(skip(self))]
	pub async fn seed_default_roles(&self) -> Result<Vec<Role>, DbError> {
		let mut roles = Vec::with_capacity(RoleName::all().len());
		for name in RoleName::all() {
			let role = match self.load_role_by_name(*name).await? {
				Some(existing) => existing,
				None => {
					let role = Role::seeded(*name);
					self.create_role(&role).await?;
					tracing::info!(role = %name, "seeded default role");
					role
				}
			};
			roles.push(role);
		}
		Ok(roles)
	}
}

/// Decode a role row. Unreadable permission JSON is a `Serialization` error.
pub(crate) fn parse_role_row(row: &SqliteRow) -> Result<Role, DbError> {
	let id: String = row.get("id");
	let name: String = row.get("name");
	let permissions: String = row.get("permissions");

	Ok(Role {
		id: parse_column("role id", &id)?,
		name: parse_column("role name", &name)?,
		display_name: row.get("display_name"),
		permissions: serde_json::from_str(&permissions)?,
		is_default: row.get::<bool, _>("is_default"),
	})
}
