//! Store Type Definitions
//!
//! ## Types Overview
//!
//! ### Chunk / ChunkRef
//! A full stored chunk and the lightweight handle `insert` returns.
//!
//! ### FlowSummary
//! One denormalized row per flow in the flow table projection: the display
//! fields a front-end lists and filters on, computed from chunk payloads at
//! query time.
//!
//! ### HeaderRow
//! One row per header entry per flow chunk, carrying the precomputed
//! `"name=value"` composite used for search.
//!
//! ### FlowFilter
//! Declarative filter over the flow table; translated into SQL where an index
//! helps and applied in Rust otherwise.
//!
//! ## Design Decisions
//!
//! - Timestamps are i64 milliseconds since epoch
//! - Fields a partial capture may lack (host, status, duration...) are
//!   Option and render as None rather than failing the query

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A stored chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Store-assigned id, strictly increasing by insertion order
    pub id: i64,

    /// Message id grouping all chunks of one captured exchange
    pub mid: String,

    /// Payload kind tag
    pub kind: String,

    /// Per-mid sequence number assigned at insert (1, 2, 3, ...)
    pub seq: i64,

    /// Opaque serialized payload
    pub payload: Vec<u8>,

    /// Derived HTTP method, empty for non-flow chunks; maintained by the
    /// store, never set by callers
    pub method: String,

    /// Insert timestamp (milliseconds since Unix epoch)
    pub created_at: i64,
}

/// Handle to a freshly inserted (or listed) chunk, without its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    pub id: i64,
    pub mid: String,
    pub kind: String,
    pub seq: i64,
    pub created_at: i64,
}

/// One row of the flow table projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSummary {
    /// Message id of the flow
    pub mid: String,

    /// When the flow chunk was inserted (milliseconds since Unix epoch)
    pub created_at: i64,

    /// HTTP method, empty when not captured
    pub method: String,

    pub host: Option<String>,

    pub path: Option<String>,

    /// Response status, None while the response is pending
    pub status_code: Option<u16>,

    /// Primary media type of the response, parameters stripped
    pub content_type: Option<String>,

    /// Response duration in seconds, None unless both response timestamps
    /// were captured
    pub duration: Option<f64>,

    /// Total payload bytes across the flow's content chunks
    pub size: u64,
}

/// One row of the header projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRow {
    pub mid: String,

    pub name: String,

    pub value: String,

    /// Precomputed `"name=value"` composite; search targets this column
    pub kv: String,
}

/// Filter over the flow table.
///
/// `method` uses the case-normalized method index; `status_code` and
/// `host_contains` are applied to the extracted summary fields;
/// `header_pattern` matches against the header projection's composite rows.
#[derive(Debug, Clone, Default)]
pub struct FlowFilter {
    /// Exact method match, case-insensitive
    pub method: Option<String>,

    /// Exact response status match
    pub status_code: Option<u16>,

    /// Substring match on the request host
    pub host_contains: Option<String>,

    /// Regex over `"name=value"` header rows
    pub header_pattern: Option<Regex>,
}

impl FlowFilter {
    /// True when no predicate beyond the SQL-expressible method filter is
    /// set, so paging can be pushed down into the query.
    pub(crate) fn is_sql_only(&self) -> bool {
        self.status_code.is_none() && self.host_contains.is_none() && self.header_pattern.is_none()
    }
}
