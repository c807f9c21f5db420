use chrono::Utc;

use super::db::Database;
use super::types::{StorageError, User};

impl Database {
    /// Create a user. A duplicate name yields `StorageError::Duplicate`.
    pub async fn create_user(&self, name: &str) -> Result<User, StorageError> {
        let now = Utc::now().timestamp();
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, created_at, updated_at)
            VALUES (?, ?, ?)
            RETURNING id, name, created_at, updated_at
        "#,
        )
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)
    }

    pub async fn get_user_by_name(&self, name: &str) -> Result<User, StorageError> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, created_at, updated_at FROM users WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?
        .ok_or(StorageError::NotFound)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, created_at, updated_at FROM users ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Delete all users. Feeds, follows and posts cascade.
    pub async fn delete_all_users(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM users")
            .execute(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?;
        Ok(())
    }
}
