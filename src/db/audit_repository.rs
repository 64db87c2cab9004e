//! Audit trail repository
//!
//! Both tables are append-only: no updates, and the only deletion is the
//! administrative purge by subject.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db::parse_db_timestamp;
use crate::models::{
    AssignmentLogEntry, AssignmentLogQuery, SecurityLogEntry, SecurityLogQuery,
};

#[derive(Debug, sqlx::FromRow)]
struct AssignmentLogRow {
    id: String,
    assignment_id: Option<String>,
    created_at: String,
    action: String,
    license_id: String,
    license_name: String,
    user_id: String,
    username: String,
    email: String,
    details: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct SecurityLogRow {
    id: String,
    created_at: String,
    action: String,
    object: String,
    user_id: Option<String>,
    username: String,
    email: String,
    details: Option<String>,
}

/// Field set for a new assignment-history entry, already denormalized
#[derive(Debug, Clone)]
pub struct NewAssignmentLog {
    pub assignment_id: Option<Uuid>,
    pub action: String,
    pub license_id: Uuid,
    pub license_name: String,
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub details: Option<String>,
}

/// Field set for a new security-history entry
#[derive(Debug, Clone)]
pub struct NewSecurityLog {
    pub action: String,
    pub object: String,
    pub user_id: Option<Uuid>,
    pub username: String,
    pub email: String,
    pub details: Option<String>,
}

pub struct AuditRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuditRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_assignment_log(
        &self,
        query: &AssignmentLogQuery,
    ) -> Result<Vec<AssignmentLogEntry>> {
        let mut sql = String::from(
            "SELECT id, assignment_id, created_at, action, license_id, license_name, user_id, username, email, details
             FROM assignment_log WHERE 1=1",
        );

        if query.user_id.is_some() {
            sql.push_str(" AND user_id = ?");
        }
        if query.license_id.is_some() {
            sql.push_str(" AND license_id = ?");
        }
        if query.action.is_some() {
            sql.push_str(" AND action = ?");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

        let mut q = sqlx::query_as::<_, AssignmentLogRow>(&sql);
        if let Some(user_id) = query.user_id {
            q = q.bind(user_id.to_string());
        }
        if let Some(license_id) = query.license_id {
            q = q.bind(license_id.to_string());
        }
        if let Some(ref action) = query.action {
            q = q.bind(action.clone());
        }
        q = q
            .bind(query.limit.unwrap_or(100) as i64)
            .bind(query.offset.unwrap_or(0) as i64);

        let rows = q
            .fetch_all(self.pool)
            .await
            .context("Failed to list assignment log")?;

        Ok(rows.into_iter().map(row_to_assignment_log).collect())
    }

    pub async fn list_security_log(
        &self,
        query: &SecurityLogQuery,
    ) -> Result<Vec<SecurityLogEntry>> {
        let mut sql = String::from(
            "SELECT id, created_at, action, object, user_id, username, email, details
             FROM security_log WHERE 1=1",
        );

        if query.user_id.is_some() {
            sql.push_str(" AND user_id = ?");
        }
        if query.action.is_some() {
            sql.push_str(" AND action = ?");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

        let mut q = sqlx::query_as::<_, SecurityLogRow>(&sql);
        if let Some(user_id) = query.user_id {
            q = q.bind(user_id.to_string());
        }
        if let Some(ref action) = query.action {
            q = q.bind(action.clone());
        }
        q = q
            .bind(query.limit.unwrap_or(100) as i64)
            .bind(query.offset.unwrap_or(0) as i64);

        let rows = q
            .fetch_all(self.pool)
            .await
            .context("Failed to list security log")?;

        Ok(rows.into_iter().map(row_to_security_log).collect())
    }

    /// Administrative purge of assignment history by subject.
    pub async fn purge_assignment_log_for_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM assignment_log WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to purge assignment log")?;

        Ok(result.rows_affected())
    }

    /// Administrative purge of security history by subject.
    pub async fn purge_security_log_for_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM security_log WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to purge security log")?;

        Ok(result.rows_affected())
    }
}

/// Append an assignment-history entry inside an open transaction so it
/// commits or rolls back together with the transition it records.
pub async fn insert_assignment_log_in_tx(
    conn: &mut SqliteConnection,
    entry: &NewAssignmentLog,
) -> Result<AssignmentLogEntry> {
    let id = Uuid::new_v4();
    let created_at = Utc::now();

    sqlx::query(
        "INSERT INTO assignment_log (id, assignment_id, created_at, action, license_id, license_name, user_id, username, email, details)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(entry.assignment_id.map(|a| a.to_string()))
    .bind(created_at.to_rfc3339())
    .bind(&entry.action)
    .bind(entry.license_id.to_string())
    .bind(&entry.license_name)
    .bind(entry.user_id.to_string())
    .bind(&entry.username)
    .bind(&entry.email)
    .bind(&entry.details)
    .execute(&mut *conn)
    .await
    .context("Failed to insert assignment log entry")?;

    Ok(AssignmentLogEntry {
        id,
        assignment_id: entry.assignment_id,
        created_at,
        action: entry.action.clone(),
        license_id: entry.license_id,
        license_name: entry.license_name.clone(),
        user_id: entry.user_id,
        username: entry.username.clone(),
        email: entry.email.clone(),
        details: entry.details.clone(),
    })
}

/// Append a security-history entry inside an open transaction.
pub async fn insert_security_log_in_tx(
    conn: &mut SqliteConnection,
    entry: &NewSecurityLog,
) -> Result<SecurityLogEntry> {
    let id = Uuid::new_v4();
    let created_at = Utc::now();

    sqlx::query(
        "INSERT INTO security_log (id, created_at, action, object, user_id, username, email, details)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(created_at.to_rfc3339())
    .bind(&entry.action)
    .bind(&entry.object)
    .bind(entry.user_id.map(|u| u.to_string()))
    .bind(&entry.username)
    .bind(&entry.email)
    .bind(&entry.details)
    .execute(&mut *conn)
    .await
    .context("Failed to insert security log entry")?;

    Ok(SecurityLogEntry {
        id,
        created_at,
        action: entry.action.clone(),
        object: entry.object.clone(),
        user_id: entry.user_id,
        username: entry.username.clone(),
        email: entry.email.clone(),
        details: entry.details.clone(),
    })
}

fn row_to_assignment_log(row: AssignmentLogRow) -> AssignmentLogEntry {
    AssignmentLogEntry {
        id: Uuid::parse_str(&row.id).unwrap_or_else(|_| Uuid::nil()),
        assignment_id: row
            .assignment_id
            .as_deref()
            .and_then(|s| Uuid::parse_str(s).ok()),
        created_at: parse_db_timestamp(&row.created_at),
        action: row.action,
        license_id: Uuid::parse_str(&row.license_id).unwrap_or_else(|_| Uuid::nil()),
        license_name: row.license_name,
        user_id: Uuid::parse_str(&row.user_id).unwrap_or_else(|_| Uuid::nil()),
        username: row.username,
        email: row.email,
        details: row.details,
    }
}

fn row_to_security_log(row: SecurityLogRow) -> SecurityLogEntry {
    SecurityLogEntry {
        id: Uuid::parse_str(&row.id).unwrap_or_else(|_| Uuid::nil()),
        created_at: parse_db_timestamp(&row.created_at),
        action: row.action,
        object: row.object,
        user_id: row.user_id.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
        username: row.username,
        email: row.email,
        details: row.details,
    }
}
