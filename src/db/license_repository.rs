//! License repository

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db::parse_db_timestamp;
use crate::models::{CreateLicenseRequest, License, LicenseStatus, UpdateLicenseRequest};

#[derive(Debug, sqlx::FromRow)]
struct LicenseRow {
    id: String,
    product_id: String,
    name: String,
    seat_count: i64,
    status: String,
    expire_date: Option<String>,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

const LICENSE_COLUMNS: &str =
    "id, product_id, name, seat_count, status, expire_date, notes, created_at, updated_at";

pub struct LicenseRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LicenseRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<License>> {
        let rows = sqlx::query_as::<_, LicenseRow>(&format!(
            "SELECT {} FROM licenses ORDER BY name",
            LICENSE_COLUMNS
        ))
        .fetch_all(self.pool)
        .await
        .context("Failed to list licenses")?;

        Ok(rows.into_iter().map(row_to_license).collect())
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<License>> {
        let row = sqlx::query_as::<_, LicenseRow>(&format!(
            "SELECT {} FROM licenses WHERE id = ?",
            LICENSE_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch license")?;

        Ok(row.map(row_to_license))
    }

    /// Count assignments currently holding a seat on the license.
    pub async fn count_active_assignments(&self, license_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM assignments WHERE license_id = ? AND state = 'active'",
        )
        .bind(license_id.to_string())
        .fetch_one(self.pool)
        .await
        .context("Failed to count active assignments")?;

        Ok(count)
    }

    pub async fn create(&self, request: &CreateLicenseRequest) -> Result<License> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO licenses (id, product_id, name, seat_count, status, expire_date, notes, created_at, updated_at)
             VALUES (?, ?, ?, ?, 'active', ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(request.product_id.to_string())
        .bind(&request.name)
        .bind(request.seat_count)
        .bind(request.expire_date.map(|d| d.to_string()))
        .bind(&request.notes)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await
        .context("Failed to create license")?;

        self.find(id)
            .await?
            .context("Failed to fetch created license")
    }

    pub async fn update(&self, id: Uuid, request: &UpdateLicenseRequest) -> Result<License> {
        let existing = self.find(id).await?.context("License not found")?;

        let name = request.name.as_deref().unwrap_or(&existing.name);
        let seat_count = request.seat_count.unwrap_or(existing.seat_count);
        let status = request.status.unwrap_or(existing.status);
        let expire_date = request.expire_date.or(existing.expire_date);
        let notes = request.notes.as_deref().or(existing.notes.as_deref());
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE licenses SET name = ?, seat_count = ?, status = ?, expire_date = ?, notes = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(name)
        .bind(seat_count)
        .bind(status.as_str())
        .bind(expire_date.map(|d| d.to_string()))
        .bind(notes)
        .bind(&now)
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to update license")?;

        self.find(id)
            .await?
            .context("License not found after update")
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM licenses WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to delete license")?;

        Ok(result.rows_affected() > 0)
    }

    /// Licenses still marked active whose expire date has passed.
    pub async fn list_expiry_candidates(&self, today: NaiveDate) -> Result<Vec<License>> {
        let rows = sqlx::query_as::<_, LicenseRow>(&format!(
            "SELECT {} FROM licenses
             WHERE status = 'active' AND expire_date IS NOT NULL AND expire_date < ?",
            LICENSE_COLUMNS
        ))
        .bind(today.to_string())
        .fetch_all(self.pool)
        .await
        .context("Failed to list expiry candidates")?;

        Ok(rows.into_iter().map(row_to_license).collect())
    }
}

/// Mark a license expired inside an open transaction.
pub async fn mark_expired_in_tx(conn: &mut SqliteConnection, license_id: Uuid) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "UPDATE licenses SET status = 'expired', updated_at = ? WHERE id = ? AND status = 'active'",
    )
    .bind(&now)
    .bind(license_id.to_string())
    .execute(&mut *conn)
    .await
    .context("Failed to mark license expired")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_license(row: LicenseRow) -> License {
    License {
        id: Uuid::parse_str(&row.id).unwrap_or_else(|_| Uuid::nil()),
        product_id: Uuid::parse_str(&row.product_id).unwrap_or_else(|_| Uuid::nil()),
        name: row.name,
        seat_count: row.seat_count,
        status: row.status.parse().unwrap_or(LicenseStatus::Archived),
        expire_date: row.expire_date.and_then(|d| d.parse().ok()),
        notes: row.notes,
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    }
}
