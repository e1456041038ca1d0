//! Wiretap Chunk Store
//!
//! This crate is the persistence layer of the wiretap capture tool: it keeps
//! the chunks of captured exchanges and answers the queries the front-end
//! lists and filters traffic with, without reconstructing full flow objects.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ Capture pipeline │
//! └────────┬─────────┘
//!          │ insert(mid, kind, payload)
//!          ▼
//! ┌─────────────────────────────────────────┐
//! │ Chunk Store (SQLite)                    │ ◄── You are here
//! │  - per-mid sequencer (atomic w/ insert) │
//! │  - (mid, kind) uniqueness guard         │
//! │  - derived method column                │
//! │  - header rows for search               │
//! └────────┬────────────────────────────────┘
//!          │ flow_table() / headers / filters
//!          ▼
//! ┌──────────────────┐
//! │ UI / front-end   │
//! └──────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Insert, sequence assignment, uniqueness check, and derived fields commit
//!   as one transaction; a failed insert leaves nothing behind
//! - Per-mid sequence numbers are strictly increasing ranks of insertion
//!   (1, 2, 3, ...) even under concurrent writers, and are never reused after
//!   a delete
//! - Projections are computed from committed chunk state on every call; there
//!   is no cache to invalidate
//!
//! ## Usage
//!
//! ```ignore
//! use wiretap_store::{ChunkStore, SqliteChunkStore};
//!
//! let store = SqliteChunkStore::open("capture.db").await?;
//!
//! let chunk = store.insert(&flow_id, "http_flow", &state_json).await?;
//! assert_eq!(chunk.seq, 1);
//!
//! for row in store.flow_table().await? {
//!     println!("{} {} {:?}", row.method, row.host.unwrap_or_default(), row.status_code);
//! }
//! ```

pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use store::SqliteChunkStore;
pub use types::*;

use async_trait::async_trait;
use regex::Regex;
use wiretap_core::{CapturedFlow, Payload};

/// Chunk store interface - the read/write contract between the capture
/// pipeline, the store, and the query surface.
///
/// ## Thread Safety
///
/// Implementations are Send + Sync and safe to share via
/// `Arc<dyn ChunkStore>`. Reads run concurrently with writes and see
/// committed state only.
///
/// ## Error Handling
///
/// All methods return `Result<T>` which is `Result<T, StoreError>`. Common
/// errors:
/// - `DuplicateChunk`: insert violates the per-mid kind uniqueness rule
/// - `ChunkNotFound`: delete of a missing chunk id
/// - `Database`: underlying SQLite failure
#[async_trait]
pub trait ChunkStore: Send + Sync {
    // ============================================================
    // CHUNK OPERATIONS
    // ============================================================

    /// Insert one chunk.
    ///
    /// Atomically (one transaction): assigns the next per-mid sequence
    /// number, enforces the `(mid, kind)` uniqueness rule for non-repeatable
    /// kinds, computes the derived method column and header rows for
    /// `http_flow` payloads, and commits the row.
    ///
    /// # Errors
    ///
    /// - `DuplicateChunk`: a chunk of this kind already exists for the mid
    ///   and the kind is not configured as repeatable. Nothing is persisted
    ///   and the sequence counter is not advanced.
    /// - `Database`: the write failed; the transaction is rolled back
    async fn insert(&self, mid: &str, kind: &str, payload: &[u8]) -> Result<ChunkRef>;

    /// Fetch a chunk by id.
    async fn get(&self, id: i64) -> Result<Option<Chunk>>;

    /// All chunks sharing a mid, ordered by seq.
    async fn list_by_mid(&self, mid: &str) -> Result<Vec<Chunk>>;

    /// All chunks of one kind, in insertion order.
    async fn list_by_kind(&self, kind: &str) -> Result<Vec<Chunk>>;

    /// Delete a chunk by id. Its header rows go with it; its seq is never
    /// reassigned.
    ///
    /// # Errors
    ///
    /// - `ChunkNotFound`: no chunk with this id
    async fn delete(&self, id: i64) -> Result<()>;

    /// Delete every chunk of a mid. Returns the number of chunks removed.
    async fn delete_by_mid(&self, mid: &str) -> Result<u64>;

    // ============================================================
    // QUERY SURFACE
    // ============================================================

    /// Flow chunks whose method matches, case-insensitively, via the
    /// case-normalized method index (no full scan).
    async fn find_flows_by_method(&self, method: &str) -> Result<Vec<ChunkRef>>;

    /// The flow table projection: one summary row per flow, in insertion
    /// order, computed from current chunk state on every call.
    async fn flow_table(&self) -> Result<Vec<FlowSummary>>;

    /// One page of the flow table, filtered. Ordering is insertion order;
    /// `offset`/`limit` page the filtered rows.
    async fn flow_page(
        &self,
        filter: &FlowFilter,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<FlowSummary>>;

    /// Summary row for a single mid, if it has a flow chunk.
    async fn flow_summary(&self, mid: &str) -> Result<Option<FlowSummary>>;

    /// Header projection rows for one mid, in header list order.
    async fn headers_for(&self, mid: &str) -> Result<Vec<HeaderRow>>;

    /// Distinct mids with at least one `"name=value"` header row matching
    /// the pattern, in insertion order.
    async fn search_headers(&self, pattern: &Regex) -> Result<Vec<String>>;

    // ============================================================
    // TYPED CONVENIENCES
    // ============================================================

    /// Insert a typed payload under its own kind tag.
    async fn insert_payload(&self, mid: &str, payload: &Payload) -> Result<ChunkRef> {
        let bytes = payload.encode().map_err(StoreError::Payload)?;
        self.insert(mid, payload.kind(), &bytes).await
    }

    /// Write all chunks of a captured exchange. Each chunk insert is
    /// individually atomic.
    async fn insert_captured(&self, mid: &str, flow: CapturedFlow) -> Result<Vec<ChunkRef>> {
        let mut refs = Vec::new();
        for payload in flow.into_chunks() {
            refs.push(self.insert_payload(mid, &payload).await?);
        }
        Ok(refs)
    }

    /// Read a mid's chunks back into a `CapturedFlow`. None when the mid has
    /// no chunks at all.
    async fn get_captured(&self, mid: &str) -> Result<Option<CapturedFlow>> {
        let chunks = self.list_by_mid(mid).await?;
        if chunks.is_empty() {
            return Ok(None);
        }
        let payloads = chunks
            .iter()
            .map(|c| Payload::decode(&c.kind, &c.payload))
            .collect::<wiretap_core::Result<Vec<_>>>()
            .map_err(StoreError::Payload)?;
        let flow = CapturedFlow::from_chunks(payloads).map_err(StoreError::Payload)?;
        Ok(Some(flow))
    }
}
