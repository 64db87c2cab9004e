//! User and role repository

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db::parse_db_timestamp;
use crate::models::{Role, User, ADMIN_ROLE};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: String,
    password_hash: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    id: String,
    name: String,
    display_name: String,
    description: Option<String>,
    is_system: bool,
    created_at: String,
}

const USER_COLUMNS: &str = "id, username, email, password_hash, is_active, created_at, updated_at";
const ROLE_COLUMNS: &str = "id, name, display_name, description, is_system, created_at";

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY username",
            USER_COLUMNS
        ))
        .fetch_all(self.pool)
        .await
        .context("Failed to list users")?;

        Ok(rows.into_iter().map(row_to_user).collect())
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch user")?;

        Ok(row.map(row_to_user))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch user by username")?;

        Ok(row.map(row_to_user))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch user by email")?;

        Ok(row.map(row_to_user))
    }

    pub async fn insert(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(self.pool)
        .await
        .context("Failed to insert user")?;

        Ok(())
    }

    pub async fn update(
        &self,
        id: Uuid,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE users SET username = ?, email = ?, password_hash = ?, updated_at = ? WHERE id = ?",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(&now)
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to update user")?;

        Ok(())
    }

    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(&now)
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to update password")?;

        Ok(())
    }

    // =========================================================================
    // Roles
    // =========================================================================

    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {} FROM roles ORDER BY name",
            ROLE_COLUMNS
        ))
        .fetch_all(self.pool)
        .await
        .context("Failed to list roles")?;

        Ok(rows.into_iter().map(row_to_role).collect())
    }

    pub async fn find_role(&self, id: Uuid) -> Result<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {} FROM roles WHERE id = ?",
            ROLE_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch role")?;

        Ok(row.map(row_to_role))
    }

    pub async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {} FROM roles WHERE name = ?",
            ROLE_COLUMNS
        ))
        .bind(name)
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch role by name")?;

        Ok(row.map(row_to_role))
    }

    /// Role names held by a user, for tokens and access checks.
    pub async fn get_user_role_names(&self, user_id: Uuid) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT r.name FROM roles r
             INNER JOIN user_roles ur ON r.id = ur.role_id
             WHERE ur.user_id = ?
             ORDER BY r.name",
        )
        .bind(user_id.to_string())
        .fetch_all(self.pool)
        .await
        .context("Failed to fetch user role names")?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    pub async fn get_user_roles(&self, user_id: Uuid) -> Result<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            "SELECT r.id, r.name, r.display_name, r.description, r.is_system, r.created_at
             FROM roles r
             INNER JOIN user_roles ur ON r.id = ur.role_id
             WHERE ur.user_id = ?
             ORDER BY r.name",
        )
        .bind(user_id.to_string())
        .fetch_all(self.pool)
        .await
        .context("Failed to fetch user roles")?;

        Ok(rows.into_iter().map(row_to_role).collect())
    }

    /// Number of users currently holding the administrator role.
    pub async fn count_administrators(&self) -> Result<i64> {
        count_administrators_on(self.pool).await
    }

    pub async fn add_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT OR IGNORE INTO user_roles (id, user_id, role_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id.to_string())
        .bind(role_id.to_string())
        .bind(&now)
        .execute(self.pool)
        .await
        .context("Failed to add role to user")?;

        Ok(())
    }
}

async fn count_administrators_on<'e, E>(executor: E) -> Result<i64>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT ur.user_id) FROM user_roles ur
         INNER JOIN roles r ON ur.role_id = r.id
         INNER JOIN users u ON ur.user_id = u.id
         WHERE r.name = ? AND u.is_active = TRUE",
    )
    .bind(ADMIN_ROLE)
    .fetch_one(executor)
    .await
    .context("Failed to count administrators")?;

    Ok(count)
}

/// Administrator count, evaluated inside an open transaction so the
/// admin-floor check and the mutation it guards see the same state.
pub async fn count_administrators_in_tx(conn: &mut SqliteConnection) -> Result<i64> {
    count_administrators_on(&mut *conn).await
}

/// Whether the user holds the administrator role, inside an open transaction.
pub async fn user_is_admin_in_tx(conn: &mut SqliteConnection, user_id: Uuid) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM user_roles ur
         INNER JOIN roles r ON ur.role_id = r.id
         WHERE ur.user_id = ? AND r.name = ?",
    )
    .bind(user_id.to_string())
    .bind(ADMIN_ROLE)
    .fetch_one(&mut *conn)
    .await
    .context("Failed to check administrator role")?;

    Ok(count > 0)
}

pub async fn remove_role_in_tx(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    role_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role_id = ?")
        .bind(user_id.to_string())
        .bind(role_id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to remove role from user")?;

    Ok(result.rows_affected() > 0)
}

/// Replace the user's full role set.
pub async fn set_roles_in_tx(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    role_ids: &[Uuid],
) -> Result<()> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
        .bind(user_id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to clear role assignments")?;

    let now = Utc::now().to_rfc3339();
    for role_id in role_ids {
        sqlx::query("INSERT INTO user_roles (id, user_id, role_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(Uuid::new_v4().to_string())
            .bind(user_id.to_string())
            .bind(role_id.to_string())
            .bind(&now)
            .execute(&mut *conn)
            .await
            .context("Failed to assign role")?;
    }

    Ok(())
}

pub async fn set_user_active_in_tx(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    is_active: bool,
) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
        .bind(is_active)
        .bind(&now)
        .bind(user_id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to update user active flag")?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_user_in_tx(conn: &mut SqliteConnection, user_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to delete user")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_user(row: UserRow) -> User {
    User {
        id: Uuid::parse_str(&row.id).unwrap_or_else(|_| Uuid::nil()),
        username: row.username,
        email: row.email,
        password_hash: row.password_hash,
        is_active: row.is_active,
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    }
}

fn row_to_role(row: RoleRow) -> Role {
    Role {
        id: Uuid::parse_str(&row.id).unwrap_or_else(|_| Uuid::nil()),
        name: row.name,
        display_name: row.display_name,
        description: row.description,
        is_system: row.is_system,
        created_at: parse_db_timestamp(&row.created_at),
    }
}
