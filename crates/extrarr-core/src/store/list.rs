//! Ordered lists: elements keyed by `(key, seq)` with a per-key monotonic counter.

use sqlx::{Row, SqliteConnection};

use super::db::Store;
use super::error::StoreError;
use super::window::{resolve_index, resolve_window};

/// All `(seq, value)` rows of a list in order.
async fn load_list(
    conn: &mut SqliteConnection,
    key: &str,
) -> Result<Vec<(i64, Vec<u8>)>, StoreError> {
    let rows = sqlx::query("SELECT seq, value FROM kv_list WHERE key = ?1 ORDER BY seq ASC")
        .bind(key)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.get("seq"), row.get("value")))
        .collect())
}

async fn delete_bucket(conn: &mut SqliteConnection, key: &str) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM kv_list WHERE key = ?1")
        .bind(key)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM kv_list_seq WHERE key = ?1")
        .bind(key)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

impl Store {
    /// Append `value` to the tail of the list. Returns the new length.
    pub async fn rpush(&self, key: &str, value: &[u8]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO kv_list_seq (key, next_seq) VALUES (?1, 1)
            ON CONFLICT(key) DO UPDATE SET next_seq = next_seq + 1
            RETURNING next_seq - 1
            "#,
        )
        .bind(key)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("INSERT INTO kv_list (key, seq, value) VALUES (?1, ?2, ?3)")
            .bind(key)
            .bind(seq)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        let len: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_list WHERE key = ?1")
            .bind(key)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(len as usize)
    }

    /// Number of elements in the list (0 when the key is absent).
    pub async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        let len: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_list WHERE key = ?1")
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        Ok(len as usize)
    }

    /// Elements in the inclusive window `[start, stop]`; negative indices are
    /// tail-relative. A missing or empty list yields an empty vec.
    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let rows = load_list(&mut conn, key).await?;
        let Some((from, to)) = resolve_window(rows.len(), start, stop) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .into_iter()
            .skip(from)
            .take(to - from + 1)
            .map(|(_, v)| v)
            .collect())
    }

    /// Replace the element at `index` (negative allowed).
    pub async fn lset(&self, key: &str, index: i64, value: &[u8]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let rows = load_list(&mut tx, key).await?;
        let Some(pos) = resolve_index(rows.len(), index) else {
            return Err(StoreError::IndexOutOfRange {
                key: key.to_string(),
                index,
                len: rows.len(),
            });
        };
        sqlx::query("UPDATE kv_list SET value = ?1 WHERE key = ?2 AND seq = ?3")
            .bind(value)
            .bind(key)
            .bind(rows[pos].0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Keep only the window `[start, stop]`, dropping everything else.
    ///
    /// Retained elements keep their sequence numbers and the counter is left
    /// alone, so later appends never collide. An empty window deletes the list.
    pub async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let rows = load_list(&mut tx, key).await?;
        match resolve_window(rows.len(), start, stop) {
            None => delete_bucket(&mut tx, key).await?,
            Some((from, to)) => {
                sqlx::query("DELETE FROM kv_list WHERE key = ?1 AND (seq < ?2 OR seq > ?3)")
                    .bind(key)
                    .bind(rows[from].0)
                    .bind(rows[to].0)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    /// Remove up to `|count|` elements equal to `value`.
    ///
    /// `count > 0` removes from the head, `count < 0` from the tail and
    /// `count == 0` removes every match. Survivors keep their relative order and
    /// are rewritten under a fresh counter. Returns the number removed.
    pub async fn lrem(&self, key: &str, count: i64, value: &[u8]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        let rows = load_list(&mut tx, key).await?;

        let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() as usize };
        let mut remove = vec![false; rows.len()];
        let mut removed = 0usize;
        let positions: Box<dyn Iterator<Item = usize>> = if count < 0 {
            Box::new((0..rows.len()).rev())
        } else {
            Box::new(0..rows.len())
        };
        for pos in positions {
            if removed == limit {
                break;
            }
            if rows[pos].1 == value {
                remove[pos] = true;
                removed += 1;
            }
        }

        if removed > 0 {
            delete_bucket(&mut tx, key).await?;
            let survivors: Vec<&Vec<u8>> = rows
                .iter()
                .zip(&remove)
                .filter(|(_, gone)| !**gone)
                .map(|((_, v), _)| v)
                .collect();
            for (seq, v) in survivors.iter().enumerate() {
                sqlx::query("INSERT INTO kv_list (key, seq, value) VALUES (?1, ?2, ?3)")
                    .bind(key)
                    .bind(seq as i64)
                    .bind(v.as_slice())
                    .execute(&mut *tx)
                    .await?;
            }
            if !survivors.is_empty() {
                sqlx::query("INSERT INTO kv_list_seq (key, next_seq) VALUES (?1, ?2)")
                    .bind(key)
                    .bind(survivors.len() as i64)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;
        Ok(removed)
    }
}
