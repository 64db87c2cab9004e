//! Assignment repository
//!
//! The state-changing writes live as free functions taking an open
//! transaction so the lifecycle service can commit them together with the
//! matching audit entry. Capacity-sensitive writes are single guarded
//! statements: the seat comparison and the insert/update execute atomically
//! under the store's write serialization, so two concurrent activations
//! cannot both take the last seat.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db::parse_db_timestamp;
use crate::models::{Assignment, AssignmentState, AssignmentTarget};

#[derive(Debug, sqlx::FromRow)]
struct AssignmentRow {
    id: String,
    license_id: String,
    user_id: Option<String>,
    device_id: Option<String>,
    state: String,
    assignment_date: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

const ASSIGNMENT_COLUMNS: &str =
    "id, license_id, user_id, device_id, state, assignment_date, notes, created_at, updated_at";

pub struct AssignmentRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AssignmentRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Assignment>> {
        let row = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {} FROM assignments WHERE id = ?",
            ASSIGNMENT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch assignment")?;

        Ok(row.map(row_to_assignment))
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Assignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {} FROM assignments WHERE user_id = ? ORDER BY assignment_date DESC",
            ASSIGNMENT_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(self.pool)
        .await
        .context("Failed to list assignments for user")?;

        Ok(rows.into_iter().map(row_to_assignment).collect())
    }

    pub async fn list_for_license(&self, license_id: Uuid) -> Result<Vec<Assignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {} FROM assignments WHERE license_id = ? ORDER BY assignment_date DESC",
            ASSIGNMENT_COLUMNS
        ))
        .bind(license_id.to_string())
        .fetch_all(self.pool)
        .await
        .context("Failed to list assignments for license")?;

        Ok(rows.into_iter().map(row_to_assignment).collect())
    }

    /// The actor's active assignment on the license, if any.
    pub async fn find_active_for_user(
        &self,
        license_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Assignment>> {
        let row = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {} FROM assignments WHERE license_id = ? AND user_id = ? AND state = 'active'",
            ASSIGNMENT_COLUMNS
        ))
        .bind(license_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch active assignment")?;

        Ok(row.map(row_to_assignment))
    }
}

/// Insert an active assignment, guarded by remaining seat capacity.
///
/// Returns `None` when the license has no free seat at execution time; the
/// comparison and the insert are one statement, closing the check-then-act
/// window.
pub async fn insert_active_in_tx(
    conn: &mut SqliteConnection,
    license_id: Uuid,
    target: AssignmentTarget,
    notes: Option<&str>,
) -> Result<Option<Assignment>> {
    let id = Uuid::new_v4();
    let now = Utc::now().to_rfc3339();
    let license_id_str = license_id.to_string();

    let result = sqlx::query(
        "INSERT INTO assignments (id, license_id, user_id, device_id, state, assignment_date, notes, created_at, updated_at)
         SELECT ?, ?, ?, ?, 'active', ?, ?, ?, ?
         WHERE (SELECT seat_count FROM licenses WHERE id = ?)
               > (SELECT COUNT(*) FROM assignments WHERE license_id = ? AND state = 'active')",
    )
    .bind(id.to_string())
    .bind(&license_id_str)
    .bind(target.user_id().map(|u| u.to_string()))
    .bind(target.device_id().map(|d| d.to_string()))
    .bind(&now)
    .bind(notes)
    .bind(&now)
    .bind(&now)
    .bind(&license_id_str)
    .bind(&license_id_str)
    .execute(&mut *conn)
    .await
    .context("Failed to insert active assignment")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    fetch_in_tx(conn, id).await.map(Some)
}

/// Insert an inactive (pre-approved) assignment. No capacity guard: the seat
/// is only taken on activation.
pub async fn insert_inactive_in_tx(
    conn: &mut SqliteConnection,
    license_id: Uuid,
    target: AssignmentTarget,
    notes: Option<&str>,
) -> Result<Assignment> {
    let id = Uuid::new_v4();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO assignments (id, license_id, user_id, device_id, state, assignment_date, notes, created_at, updated_at)
         VALUES (?, ?, ?, ?, 'inactive', ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(license_id.to_string())
    .bind(target.user_id().map(|u| u.to_string()))
    .bind(target.device_id().map(|d| d.to_string()))
    .bind(&now)
    .bind(notes)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await
    .context("Failed to insert inactive assignment")?;

    fetch_in_tx(conn, id).await
}

/// Flip an inactive assignment to active, guarded by remaining capacity.
/// Returns `None` when the assignment was not inactive or no seat is free.
pub async fn activate_in_tx(
    conn: &mut SqliteConnection,
    assignment_id: Uuid,
) -> Result<Option<Assignment>> {
    let now = Utc::now().to_rfc3339();

    let result = sqlx::query(
        "UPDATE assignments SET state = 'active', updated_at = ?
         WHERE id = ? AND state = 'inactive'
           AND (SELECT seat_count FROM licenses WHERE id = assignments.license_id)
               > (SELECT COUNT(*) FROM assignments other
                  WHERE other.license_id = assignments.license_id AND other.state = 'active')",
    )
    .bind(&now)
    .bind(assignment_id.to_string())
    .execute(&mut *conn)
    .await
    .context("Failed to activate assignment")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    fetch_in_tx(conn, assignment_id).await.map(Some)
}

/// Flip an active assignment to inactive. Returns `None` when the assignment
/// was not active.
pub async fn deactivate_in_tx(
    conn: &mut SqliteConnection,
    assignment_id: Uuid,
) -> Result<Option<Assignment>> {
    let now = Utc::now().to_rfc3339();

    let result = sqlx::query(
        "UPDATE assignments SET state = 'inactive', updated_at = ? WHERE id = ? AND state = 'active'",
    )
    .bind(&now)
    .bind(assignment_id.to_string())
    .execute(&mut *conn)
    .await
    .context("Failed to deactivate assignment")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    fetch_in_tx(conn, assignment_id).await.map(Some)
}

/// Hard-delete an assignment; permitted only from the inactive state.
/// Returns `false` when the row was missing or still active.
pub async fn delete_inactive_in_tx(
    conn: &mut SqliteConnection,
    assignment_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM assignments WHERE id = ? AND state = 'inactive'")
        .bind(assignment_id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to delete assignment")?;

    Ok(result.rows_affected() > 0)
}

async fn fetch_in_tx(conn: &mut SqliteConnection, id: Uuid) -> Result<Assignment> {
    let row = sqlx::query_as::<_, AssignmentRow>(&format!(
        "SELECT {} FROM assignments WHERE id = ?",
        ASSIGNMENT_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_one(&mut *conn)
    .await
    .context("Failed to fetch assignment inside transaction")?;

    Ok(row_to_assignment(row))
}

fn row_to_assignment(row: AssignmentRow) -> Assignment {
    Assignment {
        id: Uuid::parse_str(&row.id).unwrap_or_else(|_| Uuid::nil()),
        license_id: Uuid::parse_str(&row.license_id).unwrap_or_else(|_| Uuid::nil()),
        user_id: row.user_id.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
        device_id: row
            .device_id
            .as_deref()
            .and_then(|s| Uuid::parse_str(s).ok()),
        state: row.state.parse().unwrap_or(AssignmentState::Inactive),
        assignment_date: parse_db_timestamp(&row.assignment_date),
        notes: row.notes,
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    }
}
