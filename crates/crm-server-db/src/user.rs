// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crm_rbac_core::{Branch, Role, RoleId, UserId};
use crm_server_auth::{normalize_email, LockState, LockoutPolicy, User, UserWithRole};
use sqlx::{
	sqlite::{SqliteConnection, SqlitePool, SqliteRow},
	Row,
};

use crate::error::DbError;
use crate::row::{parse_column, parse_optional_timestamp, parse_timestamp};

/// Fields required to register a user.
#[derive(Debug, Clone)]
pub struct NewUser {
	pub email: String,
	pub password_hash: String,
	pub name: String,
	pub role_id: Option<RoleId>,
	pub branch: Branch,
}

#[async_trait]
pub trait UserStore: Send + Sync {
	async fn create_user(&self, new_user: &NewUser) -> Result<User, DbError>;
	async fn get_user_by_id(&self, id: &UserId) -> Result<Option<User>, DbError>;
	async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError>;
	async fn load_user_with_role(&self, id: &UserId) -> Result<Option<UserWithRole>, DbError>;
	async fn list_users(&self) -> Result<Vec<User>, DbError>;
	async fn set_user_role(&self, id: &UserId, role_id: &RoleId) -> Result<(), DbError>;
	async fn set_user_active(&self, id: &UserId, is_active: bool) -> Result<(), DbError>;
	async fn update_lock_state(&self, id: &UserId, state: LockState) -> Result<(), DbError>;
	async fn register_failed_login(
		&self,
		id: &UserId,
		policy: LockoutPolicy,
		now: DateTime<Utc>,
	) -> Result<LockState, DbError>;
	async fn reset_login_attempts(&self, id: &UserId) -> Result<(), DbError>;
}

#[async_trait]
impl UserStore for UserRepository {
	async fn create_user(&self, new_user: &NewUser) -> Result<User, DbError> {
		self.create_user(new_user).await
	}

	async fn get_user_by_id(&self, id: &UserId) -> Result<Option<User>, DbError> {
		self.get_user_by_id(id).await
	}

	async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
		self.get_user_by_email(email).await
	}

	async fn load_user_with_role(&self, id: &UserId) -> Result<Option<UserWithRole>, DbError> {
		self.load_user_with_role(id).await
	}

	async fn list_users(&self) -> Result<Vec<User>, DbError> {
		self.list_users().await
	}

	async fn set_user_role(&self, id: &UserId, role_id: &RoleId) -> Result<(), DbError> {
		self.set_user_role(id, role_id).await
	}

	async fn set_user_active(&self, id: &UserId, is_active: bool) -> Result<(), DbError> {
		self.set_user_active(id, is_active).await
	}

	async fn update_lock_state(&self, id: &UserId, state: LockState) -> Result<(), DbError> {
		self.update_lock_state(id, state).await
	}

	async fn register_failed_login(
		&self,
		id: &UserId,
		policy: LockoutPolicy,
		now: DateTime<Utc>,
	) -> Result<LockState, DbError> {
		self.register_failed_login(id, policy, now).await
	}

	async fn reset_login_attempts(&self, id: &UserId) -> Result<(), DbError> {
		self.reset_login_attempts(id).await
	}
}

const USER_COLUMNS: &str = "u.id, u.email, u.password_hash, u.name, u.role_id, u.branch, \
	u.is_active, u.login_attempts, u.lock_until, u.created_at, u.updated_at";

#[derive(Clone)]
pub struct UserRepository {
	pool: SqlitePool,
}

impl UserRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, new_user), fields(branch = %new_user.branch))]
	pub async fn create_user(&self, new_user: &NewUser) -> Result<User, DbError> {
		let now = Utc::now();
		let user = User {
			id: UserId::generate(),
			email: normalize_email(&new_user.email),
			password_hash: new_user.password_hash.clone(),
			name: new_user.name.clone(),
			role_id: new_user.role_id,
			branch: new_user.branch,
			is_active: true,
			login_attempts: 0,
			lock_until: None,
			created_at: now,
			updated_at: now,
		};

		sqlx::query(
			r#"
			INSERT INTO users (id, email, password_hash, name, role_id, branch, is_active,
				login_attempts, lock_until, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, 1, 0, NULL, ?, ?)
			"#,
		)
		.bind(user.id.to_string())
		.bind(&user.email)
		.bind(&user.password_hash)
		.bind(&user.name)
		.bind(user.role_id.map(|id| id.to_string()))
		.bind(user.branch.as_str())
		.bind(now.to_rfc3339())
		.bind(now.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| DbError::from_insert(e, "user with this email"))?;

		tracing::debug!(user_id = %user.id, "user created");
		Ok(user)
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn get_user_by_id(&self, id: &UserId) -> Result<Option<User>, DbError> {
		let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?"))
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(parse_user_row).transpose()
	}

	/// Case-insensitive lookup.
	#[tracing::instrument(skip(self, email))]
	pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {USER_COLUMNS} FROM users u WHERE u.email = ? COLLATE NOCASE"
		))
		.bind(normalize_email(email))
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_user_row).transpose()
	}

	/// Load a user together with its current role document.
	///
	/// A dangling role reference or an unreadable permission document yields
	/// `role: None`, which the evaluator treats as no access.
	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn load_user_with_role(&self, id: &UserId) -> Result<Option<UserWithRole>, DbError> {
		let row = sqlx::query(&format!(
			r#"
			SELECT {USER_COLUMNS},
				r.id AS r_id, r.name AS r_name, r.display_name AS r_display_name,
				r.permissions AS r_permissions, r.is_default AS r_is_default
			FROM users u
			LEFT JOIN roles r ON r.id = u.role_id
			WHERE u.id = ?
			"#
		))
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		let Some(row) = row else {
			return Ok(None);
		};

		let user = parse_user_row(&row)?;
		let role = match parse_joined_role(&row) {
			Ok(role) => role,
			Err(e) => {
				tracing::warn!(user_id = %id, error = %e, "unreadable role document; denying all permissions");
				None
			}
		};

		Ok(Some(UserWithRole { user, role }))
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_users(&self) -> Result<Vec<User>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {USER_COLUMNS} FROM users u ORDER BY u.created_at ASC"
		))
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_user_row).collect()
	}

	#[tracing::instrument(skip(self), fields(user_id = %id, role_id = %role_id))]
	pub async fn set_user_role(&self, id: &UserId, role_id: &RoleId) -> Result<(), DbError> {
		let result = sqlx::query("UPDATE users SET role_id = ?, updated_at = ? WHERE id = ?")
			.bind(role_id.to_string())
			.bind(Utc::now().to_rfc3339())
			.bind(id.to_string())
			.execute(&self.pool)
			.await
			.map_err(|e| match &e {
				sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
					DbError::NotFound(format!("role {role_id}"))
				}
				_ => DbError::Sqlx(e),
			})?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("user {id}")));
		}
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn set_user_active(&self, id: &UserId, is_active: bool) -> Result<(), DbError> {
		let result = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
			.bind(is_active)
			.bind(Utc::now().to_rfc3339())
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("user {id}")));
		}
		Ok(())
	}

	#[tracing::instrument(skip(self, state), fields(user_id = %id, attempts = state.login_attempts))]
	pub async fn update_lock_state(&self, id: &UserId, state: LockState) -> Result<(), DbError> {
		sqlx::query("UPDATE users SET login_attempts = ?, lock_until = ?, updated_at = ? WHERE id = ?")
			.bind(i64::from(state.login_attempts))
			.bind(state.lock_until.map(|t| t.to_rfc3339()))
			.bind(Utc::now().to_rfc3339())
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	/// Count one failed login and lock the account once the policy says so.
	///
	/// The counters are read and written under `BEGIN IMMEDIATE`, so concurrent
	/// failures for the same user are applied one after another.
	#[tracing::instrument(skip(self, policy), fields(user_id = %id))]
	pub async fn register_failed_login(
		&self,
		id: &UserId,
		policy: LockoutPolicy,
		now: DateTime<Utc>,
	) -> Result<LockState, DbError> {
		let mut conn = self.pool.acquire().await?;
		sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

		match apply_failed_login(&mut conn, id, policy, now).await {
			Ok(state) => {
				sqlx::query("COMMIT").execute(&mut *conn).await?;
				Ok(state)
			}
			Err(e) => {
				if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
					tracing::warn!(error = %rollback, "rollback failed; discarding connection");
					drop(conn.detach());
				}
				Err(e)
			}
		}
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn reset_login_attempts(&self, id: &UserId) -> Result<(), DbError> {
		self.update_lock_state(id, LockState::default()).await
	}
}

async fn apply_failed_login(
	conn: &mut SqliteConnection,
	id: &UserId,
	policy: LockoutPolicy,
	now: DateTime<Utc>,
) -> Result<LockState, DbError> {
	let row = sqlx::query("SELECT login_attempts, lock_until FROM users WHERE id = ?")
		.bind(id.to_string())
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| DbError::NotFound(format!("user {id}")))?;

	let login_attempts: i64 = row.get("login_attempts");
	let current = LockState {
		login_attempts: u32::try_from(login_attempts).unwrap_or(u32::MAX),
		lock_until: parse_optional_timestamp(row.get("lock_until"))?,
	};
	let next = policy.register_failure(current, now);
	if next == current {
		return Ok(next);
	}

	sqlx::query("UPDATE users SET login_attempts = ?, lock_until = ?, updated_at = ? WHERE id = ?")
		.bind(i64::from(next.login_attempts))
		.bind(next.lock_until.map(|t| t.to_rfc3339()))
		.bind(now.to_rfc3339())
		.bind(id.to_string())
		.execute(&mut *conn)
		.await?;
	Ok(next)
}

fn parse_user_row(row: &SqliteRow) -> Result<User, DbError> {
	let id: String = row.get("id");
	let role_id: Option<String> = row.get("role_id");
	let branch: String = row.get("branch");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	let login_attempts: i64 = row.get("login_attempts");

	Ok(User {
		id: parse_column("user id", &id)?,
		email: row.get("email"),
		password_hash: row.get("password_hash"),
		name: row.get("name"),
		role_id: role_id
			.as_deref()
			.map(|v| parse_column("role id", v))
			.transpose()?,
		branch: parse_column("branch", &branch)?,
		is_active: row.get::<bool, _>("is_active"),
		login_attempts: u32::try_from(login_attempts).unwrap_or(u32::MAX),
		lock_until: parse_optional_timestamp(row.get("lock_until"))?,
		created_at: parse_timestamp(&created_at)?,
		updated_at: parse_timestamp(&updated_at)?,
	})
}

fn parse_joined_role(row: &SqliteRow) -> Result<Option<Role>, DbError> {
	let Some(id) = row.get::<Option<String>, _>("r_id") else {
		return Ok(None);
	};
	let name: String = row.get("r_name");
	let permissions: String = row.get("r_permissions");

	Ok(Some(Role {
		id: parse_column("role id", &id)?,
		name: parse_column("role name", &name)?,
		display_name: row.get("r_display_name"),
		permissions: serde_json::from_str(&permissions)?,
		is_default: row.get::<bool, _>("r_is_default"),
	}))
}
