//! Field maps: `key -> field -> value`.

use sqlx::Row;

use super::db::Store;
use super::error::StoreError;

impl Store {
    pub async fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO kv_hash (key, field, value) VALUES (?1, ?2, ?3)
            ON CONFLICT(key, field) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(field)
        .bind(value)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Read one field. Fails with [`StoreError::NotFound`] when the field is absent.
    pub async fn hget(&self, key: &str, field: &str) -> Result<Vec<u8>, StoreError> {
        let row = sqlx::query("SELECT value FROM kv_hash WHERE key = ?1 AND field = ?2")
            .bind(key)
            .bind(field)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.get("value")),
            None => Err(StoreError::not_found(format!("{key}/{field}"))),
        }
    }

    /// All values of the map in bucket iteration order (ascending field).
    pub async fn hvals(&self, key: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let rows = sqlx::query("SELECT value FROM kv_hash WHERE key = ?1 ORDER BY field ASC")
            .bind(key)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| row.get("value")).collect())
    }

    /// Delete one field. Returns whether it existed.
    pub async fn hdel(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let r = sqlx::query("DELETE FROM kv_hash WHERE key = ?1 AND field = ?2")
            .bind(key)
            .bind(field)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(r.rows_affected() > 0)
    }
}
