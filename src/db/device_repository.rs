//! Device repository

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::parse_db_timestamp;
use crate::models::{CreateDeviceRequest, Device};

#[derive(Debug, sqlx::FromRow)]
struct DeviceRow {
    id: String,
    name: String,
    serial: Option<String>,
    created_at: String,
}

pub struct DeviceRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DeviceRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Device>> {
        let rows = sqlx::query_as::<_, DeviceRow>(
            "SELECT id, name, serial, created_at FROM devices ORDER BY name",
        )
        .fetch_all(self.pool)
        .await
        .context("Failed to list devices")?;

        Ok(rows.into_iter().map(row_to_device).collect())
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Device>> {
        let row = sqlx::query_as::<_, DeviceRow>(
            "SELECT id, name, serial, created_at FROM devices WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch device")?;

        Ok(row.map(row_to_device))
    }

    pub async fn create(&self, request: &CreateDeviceRequest) -> Result<Device> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        sqlx::query("INSERT INTO devices (id, name, serial, created_at) VALUES (?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(&request.name)
            .bind(&request.serial)
            .bind(&now)
            .execute(self.pool)
            .await
            .context("Failed to create device")?;

        self.find(id)
            .await?
            .context("Failed to fetch created device")
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM devices WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to delete device")?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_device(row: DeviceRow) -> Device {
    Device {
        id: Uuid::parse_str(&row.id).unwrap_or_else(|_| Uuid::nil()),
        name: row.name,
        serial: row.serial,
        created_at: parse_db_timestamp(&row.created_at),
    }
}
