//! Store Error Types
//!
//! ## Error Categories
//!
//! ### Constraint Errors
//! - `DuplicateChunk`: insert violates the per-mid kind uniqueness rule;
//!   the whole insert transaction is rolled back
//!
//! ### Lookup Errors
//! - `ChunkNotFound`: delete of a chunk id that does not exist
//!
//! ### Database Errors
//! - `Database`: SQLite operation failed (connection, query, disk). These are
//!   fatal to the calling operation; nothing is partially persisted
//!
//! ### Data Errors
//! - `Payload`: typed payload encoding/decoding failed
//!
//! All store operations return `Result<T>` aliased to `Result<T, StoreError>`,
//! so errors propagate cleanly with `?`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate chunk: a '{kind}' chunk already exists for mid {mid}")]
    DuplicateChunk { mid: String, kind: String },

    #[error("Chunk not found: {0}")]
    ChunkNotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Payload error: {0}")]
    Payload(#[from] wiretap_core::Error),

    #[error("Migration error: {0}")]
    Migration(String),
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        StoreError::Migration(e.to_string())
    }
}
