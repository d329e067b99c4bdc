//! # Category Repository
//!
//! Admin-defined categories. Listings reference a category by name.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use cardshop_core::Category;

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Creates a category.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - name already taken
    /// * `DbError::ForeignKeyViolation` - `parent_id` does not exist
    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        parent_id: Option<i64>,
    ) -> DbResult<Category> {
        let name = name.trim();
        debug!(name, "Creating category");

        let category: Category = sqlx::query_as(
            r#"
            INSERT INTO ebay_categories (name, description, parent_id, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, name, description, parent_id, created_at
            "#,
        )
        .bind(name)
        .bind(description.map(str::trim).filter(|d| !d.is_empty()))
        .bind(parent_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, name),
            other => other,
        })?;

        info!(id = category.id, name = %category.name, "Category created");
        Ok(category)
    }

    /// Creates a category unless one with the same name exists.
    ///
    /// Returns `true` when a row was inserted.
    pub async fn ensure(&self, name: &str, description: Option<&str>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO ebay_categories (name, description, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(name.trim())
        .bind(description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All categories ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as(
            "SELECT id, name, description, parent_id, created_at \
             FROM ebay_categories ORDER BY name COLLATE NOCASE",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Category>> {
        let category = sqlx::query_as(
            "SELECT id, name, description, parent_id, created_at \
             FROM ebay_categories WHERE name = ?1",
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    /// Deletes a category. Listings keep their category text.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM ebay_categories WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }
        Ok(())
    }
}
