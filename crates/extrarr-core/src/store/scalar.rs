//! Scalar values: one byte string per key.

use sqlx::Row;

use super::db::Store;
use super::error::StoreError;

impl Store {
    /// Read a scalar value. Fails with [`StoreError::NotFound`] when absent.
    pub async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let row = sqlx::query("SELECT value FROM kv_scalar WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.get("value")),
            None => Err(StoreError::not_found(key)),
        }
    }

    /// Write (insert or replace) a scalar value.
    pub async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO kv_scalar (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}
