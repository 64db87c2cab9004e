//! Product repository

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::parse_db_timestamp;
use crate::models::{CreateProductRequest, Product, UpdateProductRequest};

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    vendor: Option<String>,
    description: Option<String>,
    created_at: String,
    updated_at: String,
}

const PRODUCT_COLUMNS: &str = "id, name, vendor, description, created_at, updated_at";

pub struct ProductRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProductRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products ORDER BY name",
            PRODUCT_COLUMNS
        ))
        .fetch_all(self.pool)
        .await
        .context("Failed to list products")?;

        Ok(rows.into_iter().map(row_to_product).collect())
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = ?",
            PRODUCT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch product")?;

        Ok(row.map(row_to_product))
    }

    pub async fn create(&self, request: &CreateProductRequest) -> Result<Product> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO products (id, name, vendor, description, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&request.name)
        .bind(&request.vendor)
        .bind(&request.description)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await
        .context("Failed to create product")?;

        self.find(id)
            .await?
            .context("Failed to fetch created product")
    }

    pub async fn update(&self, id: Uuid, request: &UpdateProductRequest) -> Result<Product> {
        let existing = self.find(id).await?.context("Product not found")?;

        let name = request.name.as_deref().unwrap_or(&existing.name);
        let vendor = request.vendor.as_deref().or(existing.vendor.as_deref());
        let description = request
            .description
            .as_deref()
            .or(existing.description.as_deref());
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE products SET name = ?, vendor = ?, description = ?, updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(vendor)
        .bind(description)
        .bind(&now)
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to update product")?;

        self.find(id)
            .await?
            .context("Product not found after update")
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to delete product")?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_product(row: ProductRow) -> Product {
    Product {
        id: Uuid::parse_str(&row.id).unwrap_or_else(|_| Uuid::nil()),
        name: row.name,
        vendor: row.vendor,
        description: row.description,
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    }
}
