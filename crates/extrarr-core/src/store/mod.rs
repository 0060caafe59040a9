//! Keyed persistent store (SQLite via sqlx).
//!
//! Exposes three shapes over named keys so the engine can use one embedded
//! database like a small structured cache:
//! - scalar values (`get` / `set`)
//! - field maps (`hset` / `hget` / `hvals` / `hdel`)
//! - ordered lists keyed by a monotonic sequence (`rpush`, `lrange`, `lset`,
//!   `ltrim`, `lrem`)
//!
//! Every mutating call runs in its own transaction. The pool holds a single
//! connection, so all transactions are serialized store-wide; no cross-key
//! atomicity is offered beyond that.

mod db;
mod error;
mod hash;
mod list;
mod scalar;
mod window;

pub use db::Store;
pub use error::StoreError;
