//! SQLite Chunk Store Implementation
//!
//! ## What Does This Do?
//!
//! `SqliteChunkStore` persists capture chunks and serves the projection
//! queries, implementing the `ChunkStore` trait over a SQLite database.
//!
//! ## Why SQLite?
//!
//! The capture workload is a single interactive process appending chunks:
//! - **Zero configuration**: embedded database, no separate server
//! - **ACID transactions**: insert + sequencing + uniqueness commit together
//! - **WAL mode**: readers never block the writer and see committed state only
//! - **Indexes**: filter queries stay interactive at tens of thousands of flows
//!
//! ## Write Path
//!
//! `insert` runs one transaction per chunk:
//!
//! 1. Bump the mid's row in `mid_sequence` (upsert, RETURNING the new seq).
//!    This is the transaction's first statement, so SQLite's write lock is
//!    taken before anything is read - two inserts for one mid can never
//!    observe the same counter value.
//! 2. Insert the chunk row with that seq, the derived method column, and the
//!    insert timestamp. The `(mid, kind)` unique index rejects duplicates of
//!    non-repeatable kinds here, rolling back the counter bump with the rest
//!    of the transaction.
//! 3. For `http_flow` payloads, insert one `header` row per header entry.
//!
//! ## Read Path
//!
//! Projections recompute from committed chunk state on every call - there is
//! no materialized table to maintain or invalidate. Field extraction happens
//! in Rust (wiretap-core); SQL does the scans, index lookups, and the size
//! aggregation.
//!
//! ## Thread Safety
//!
//! - `SqliteChunkStore` is Send + Sync; share it via `Arc`
//! - The connection pool handles concurrent access; WAL mode allows
//!   concurrent readers alongside the single writer

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::Row;
use tracing::{debug, info, warn};

use wiretap_core::{kind as chunk_kind, HttpFlowState};

use crate::{
    config::StoreConfig,
    error::{Result, StoreError},
    types::*,
    ChunkStore,
};

/// SQLite-backed chunk store.
pub struct SqliteChunkStore {
    pool: SqlitePool,
    config: StoreConfig,
}

impl SqliteChunkStore {
    /// Open (creating if missing) a file-backed store with default
    /// configuration.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, StoreConfig::default()).await
    }

    /// Open a file-backed store.
    pub async fn open_with_config<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", path.as_ref().display()))?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .foreign_keys(true)
                .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let store = Self::init(pool, config).await?;
        info!(path = %path.as_ref().display(), "chunk store opened");
        Ok(store)
    }

    /// In-memory store (for testing). Uses a single connection: every SQLite
    /// in-memory connection is a distinct database.
    pub async fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with_config(StoreConfig::default()).await
    }

    /// In-memory store with explicit configuration.
    pub async fn open_in_memory_with_config(config: StoreConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::init(pool, config).await
    }

    async fn init(pool: SqlitePool, config: StoreConfig) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;

        // The uniqueness guard is a partial unique index derived from the
        // configured exemption set, so it is rebuilt at open rather than
        // baked into the migration.
        sqlx::query("DROP INDEX IF EXISTS chunk_mid_kind_key")
            .execute(&pool)
            .await?;
        let index_sql = if config.repeatable_kinds.is_empty() {
            "CREATE UNIQUE INDEX chunk_mid_kind_key ON chunk (mid, kind)".to_string()
        } else {
            let exempt = config
                .repeatable_kinds
                .iter()
                .map(|k| format!("'{}'", k.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "CREATE UNIQUE INDEX chunk_mid_kind_key ON chunk (mid, kind) \
                 WHERE kind NOT IN ({exempt})"
            )
        };
        sqlx::query(&index_sql).execute(&pool).await?;

        Ok(Self { pool, config })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn chunk_from_row(row: &SqliteRow) -> Chunk {
        Chunk {
            id: row.get("id"),
            mid: row.get("mid"),
            kind: row.get("kind"),
            seq: row.get("seq"),
            payload: row.get("payload"),
            method: row.get("method"),
            created_at: row.get("created_at"),
        }
    }

    fn chunk_ref_from_row(row: &SqliteRow) -> ChunkRef {
        ChunkRef {
            id: row.get("id"),
            mid: row.get("mid"),
            kind: row.get("kind"),
            seq: row.get("seq"),
            created_at: row.get("created_at"),
        }
    }

    /// Build one flow table row. Extraction is tolerant: a payload the flow
    /// state cannot be decoded from yields empty/None fields, not an error.
    fn summarize(mid: String, created_at: i64, payload: &[u8], size: u64) -> FlowSummary {
        let state = match HttpFlowState::decode(payload) {
            Ok(state) => state,
            Err(e) => {
                debug!(mid = %mid, error = %e, "flow payload did not decode; summary left empty");
                HttpFlowState::default()
            }
        };
        FlowSummary {
            method: state.method().to_string(),
            host: state.host().map(str::to_string),
            path: state.path().map(str::to_string),
            status_code: state.status_code(),
            content_type: state.content_type(),
            duration: state.duration(),
            mid,
            created_at,
            size,
        }
    }

    /// Aggregate content-chunk payload sizes per mid.
    async fn content_sizes(&self, mid: Option<&str>) -> Result<HashMap<String, u64>> {
        let mut sql = String::from(
            "SELECT mid, COALESCE(SUM(LENGTH(payload)), 0) AS total \
             FROM chunk WHERE kind IN (?, ?)",
        );
        if mid.is_some() {
            sql.push_str(" AND mid = ?");
        }
        sql.push_str(" GROUP BY mid");

        let mut query = sqlx::query(&sql)
            .bind(chunk_kind::REQUEST_CONTENT)
            .bind(chunk_kind::RESPONSE_CONTENT);
        if let Some(mid) = mid {
            query = query.bind(mid);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let total: i64 = r.get("total");
                (r.get("mid"), total.max(0) as u64)
            })
            .collect())
    }

    /// Shared flow table query: optional mid restriction, optional indexed
    /// method filter, optional SQL-side paging.
    async fn fetch_summaries(
        &self,
        mid: Option<&str>,
        method: Option<&str>,
        page: Option<(u32, u32)>,
    ) -> Result<Vec<FlowSummary>> {
        let mut sql =
            String::from("SELECT mid, payload, created_at FROM chunk WHERE kind = ?");
        if mid.is_some() {
            sql.push_str(" AND mid = ?");
        }
        if method.is_some() {
            sql.push_str(" AND method = ? COLLATE NOCASE");
        }
        sql.push_str(" ORDER BY id");
        if page.is_some() {
            sql.push_str(" LIMIT ? OFFSET ?");
        }

        let mut query = sqlx::query(&sql).bind(chunk_kind::HTTP_FLOW);
        if let Some(mid) = mid {
            query = query.bind(mid);
        }
        if let Some(method) = method {
            query = query.bind(method);
        }
        if let Some((offset, limit)) = page {
            query = query.bind(limit as i64).bind(offset as i64);
        }

        let rows = query.fetch_all(&self.pool).await?;
        let sizes = self.content_sizes(mid).await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let mid: String = r.get("mid");
                let payload: Vec<u8> = r.get("payload");
                let size = sizes.get(&mid).copied().unwrap_or(0);
                Self::summarize(mid, r.get("created_at"), &payload, size)
            })
            .collect())
    }
}

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    async fn insert(&self, mid: &str, kind: &str, payload: &[u8]) -> Result<ChunkRef> {
        let created_at = Self::now_ms();

        // Derived fields are computed up front from the payload; a flow
        // payload that does not decode is tolerated and stored with them
        // empty.
        let flow_state = if kind == chunk_kind::HTTP_FLOW {
            match HttpFlowState::decode(payload) {
                Ok(state) => Some(state),
                Err(e) => {
                    warn!(mid, error = %e, "flow payload did not decode; derived fields left empty");
                    None
                }
            }
        } else {
            None
        };
        let method = flow_state
            .as_ref()
            .map(|s| s.method().to_string())
            .unwrap_or_default();

        let mut tx = self.pool.begin().await?;

        // Counter bump first: the transaction's opening write serializes
        // concurrent inserts for the same mid on SQLite's write lock, and a
        // rolled-back insert rolls the counter back with it.
        let seq: i64 = sqlx::query_scalar(
            "INSERT INTO mid_sequence (mid, last_seq) VALUES (?, 1) \
             ON CONFLICT (mid) DO UPDATE SET last_seq = last_seq + 1 \
             RETURNING last_seq",
        )
        .bind(mid)
        .fetch_one(&mut *tx)
        .await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO chunk (mid, kind, seq, payload, method, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             RETURNING id",
        )
        .bind(mid)
        .bind(kind)
        .bind(seq)
        .bind(payload)
        .bind(&method)
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                StoreError::DuplicateChunk {
                    mid: mid.to_string(),
                    kind: kind.to_string(),
                }
            } else {
                StoreError::from(e)
            }
        })?;

        if let Some(state) = &flow_state {
            for (name, value) in state.header_entries() {
                sqlx::query(
                    "INSERT INTO header (chunk_id, mid, name, value, kv) \
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(id)
                .bind(mid)
                .bind(name)
                .bind(value)
                .bind(format!("{name}={value}"))
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        debug!(mid, kind, seq, id, "chunk inserted");

        Ok(ChunkRef {
            id,
            mid: mid.to_string(),
            kind: kind.to_string(),
            seq,
            created_at,
        })
    }

    async fn get(&self, id: i64) -> Result<Option<Chunk>> {
        let row = sqlx::query(
            "SELECT id, mid, kind, seq, payload, method, created_at \
             FROM chunk WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Self::chunk_from_row(&r)))
    }

    async fn list_by_mid(&self, mid: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT id, mid, kind, seq, payload, method, created_at \
             FROM chunk WHERE mid = ? ORDER BY seq",
        )
        .bind(mid)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::chunk_from_row).collect())
    }

    async fn list_by_kind(&self, kind: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT id, mid, kind, seq, payload, method, created_at \
             FROM chunk WHERE kind = ? ORDER BY id",
        )
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::chunk_from_row).collect())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM chunk WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ChunkNotFound(id));
        }
        debug!(id, "chunk deleted");
        Ok(())
    }

    async fn delete_by_mid(&self, mid: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chunk WHERE mid = ?")
            .bind(mid)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected();
        debug!(mid, removed, "chunks deleted");
        Ok(removed)
    }

    async fn find_flows_by_method(&self, method: &str) -> Result<Vec<ChunkRef>> {
        let rows = sqlx::query(
            "SELECT id, mid, kind, seq, created_at FROM chunk \
             WHERE kind = ? AND method = ? COLLATE NOCASE \
             ORDER BY id",
        )
        .bind(chunk_kind::HTTP_FLOW)
        .bind(method)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::chunk_ref_from_row).collect())
    }

    async fn flow_table(&self) -> Result<Vec<FlowSummary>> {
        self.fetch_summaries(None, None, None).await
    }

    async fn flow_page(
        &self,
        filter: &FlowFilter,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<FlowSummary>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // With only SQL-expressible predicates, paging is pushed into the
        // query; otherwise rows are filtered here first and paged after.
        if filter.is_sql_only() {
            return self
                .fetch_summaries(None, filter.method.as_deref(), Some((offset, limit)))
                .await;
        }

        let mut summaries = self
            .fetch_summaries(None, filter.method.as_deref(), None)
            .await?;

        if let Some(status) = filter.status_code {
            summaries.retain(|s| s.status_code == Some(status));
        }
        if let Some(fragment) = &filter.host_contains {
            summaries.retain(|s| {
                s.host
                    .as_deref()
                    .is_some_and(|host| host.contains(fragment.as_str()))
            });
        }
        if let Some(pattern) = &filter.header_pattern {
            let matching: HashSet<String> = self.search_headers(pattern).await?.into_iter().collect();
            summaries.retain(|s| matching.contains(&s.mid));
        }

        Ok(summaries
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn flow_summary(&self, mid: &str) -> Result<Option<FlowSummary>> {
        let mut summaries = self.fetch_summaries(Some(mid), None, None).await?;
        Ok(if summaries.is_empty() {
            None
        } else {
            Some(summaries.remove(0))
        })
    }

    async fn headers_for(&self, mid: &str) -> Result<Vec<HeaderRow>> {
        let rows = sqlx::query(
            "SELECT mid, name, value, kv FROM header WHERE mid = ? ORDER BY id",
        )
        .bind(mid)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| HeaderRow {
                mid: r.get("mid"),
                name: r.get("name"),
                value: r.get("value"),
                kv: r.get("kv"),
            })
            .collect())
    }

    async fn search_headers(&self, pattern: &Regex) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT mid, kv FROM header ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut seen = HashSet::new();
        let mut mids = Vec::new();
        for row in rows {
            let kv: String = row.get("kv");
            if pattern.is_match(&kv) {
                let mid: String = row.get("mid");
                if seen.insert(mid.clone()) {
                    mids.push(mid);
                }
            }
        }
        Ok(mids)
    }
}
