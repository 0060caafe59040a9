//! SQLite-backed store implementation.
//!
//! Handles connection and migrations. Shape-specific operations live in
//! `scalar`, `hash` and `list`.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;

use super::error::StoreError;

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}?mode=rwc", out)
}

/// Handle to the embedded key/value store.
///
/// The database file is stored under the XDG state directory:
/// `~/.local/state/extrarr/store.db` on Linux.
#[derive(Clone)]
pub struct Store {
    pub(crate) pool: Pool<Sqlite>,
}

impl Store {
    /// Open (or create) the default store and run migrations.
    pub async fn open_default() -> Result<Self, StoreError> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("extrarr")?;
        let state_dir = xdg_dirs.get_state_home();
        Self::open_at(state_dir.join("store.db")).await
    }

    /// Open (or create) the store at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // One connection: transactions serialize instead of racing for the write lock.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&path_to_sqlite_uri(path))
            .await?;
        let store = Store { pool };
        store.migrate().await?;
        tracing::debug!(path = %path.display(), "store opened");
        Ok(store)
    }

    /// Open a private in-memory store (no disk I/O). Contents vanish on drop.
    pub async fn open_memory() -> Result<Self, StoreError> {
        // The single connection must never be recycled or the database goes with it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let store = Store { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        // - `kv_list.seq` orders list elements; values are never compared for order.
        // - `kv_list_seq.next_seq` survives trims so appends never reuse a retained seq.
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS kv_scalar (
                key TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS kv_hash (
                key TEXT NOT NULL,
                field TEXT NOT NULL,
                value BLOB NOT NULL,
                PRIMARY KEY (key, field)
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS kv_list (
                key TEXT NOT NULL,
                seq INTEGER NOT NULL,
                value BLOB NOT NULL,
                PRIMARY KEY (key, seq)
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS kv_list_seq (
                key TEXT PRIMARY KEY NOT NULL,
                next_seq INTEGER NOT NULL
            );
            "#,
        ];
        for sql in statements {
            sqlx::query(sql).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Remove the key's list, hash and scalar entries. Missing keys are not an error.
    pub async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for sql in [
            "DELETE FROM kv_scalar WHERE key = ?1",
            "DELETE FROM kv_hash WHERE key = ?1",
            "DELETE FROM kv_list WHERE key = ?1",
            "DELETE FROM kv_list_seq WHERE key = ?1",
        ] {
            sqlx::query(sql).bind(key).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
