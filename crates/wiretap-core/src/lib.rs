//! Wiretap Core Data Model
//!
//! This crate defines the data model shared by the capture pipeline and the
//! chunk store: chunk kinds, the tagged payload variants stored per kind, and
//! the HTTP flow state types that derived fields are extracted from.
//!
//! ## What is a Chunk?
//!
//! One captured exchange (a "flow") is persisted as several chunks sharing a
//! message id (mid). Each chunk carries one kind of data:
//!
//! - **http_flow**: the flow's structured state (request/response metadata,
//!   headers, timestamps) serialized as JSON
//! - **request_content** / **response_content**: raw body bytes
//! - **client_conn** / **server_conn**: connection details as JSON
//!
//! ```text
//! ┌───────────────┐  into_chunks()   ┌─────────────────────────────┐
//! │ CapturedFlow  │ ───────────────► │ request_content (bytes)     │
//! │  state        │                  │ response_content (bytes)    │
//! │  contents     │                  │ client_conn (json)          │
//! │  conn details │ ◄─────────────── │ server_conn (json)          │
//! └───────────────┘  from_chunks()   │ http_flow (json state)      │
//!                                    └─────────────────────────────┘
//! ```
//!
//! ## Design Decisions
//!
//! - The store layer stays payload-type-agnostic; typing lives here in the
//!   `Payload` enum, keyed by chunk kind
//! - Flow state decoding is tolerant: every field is optional so a flow whose
//!   response has not arrived yet (or whose payload predates a field) still
//!   decodes, and extraction functions return empty/None for what is missing
//! - Extraction functions are pure so the store can recompute derived columns
//!   inside its insert transaction

pub mod error;
pub mod flow;
pub mod payload;

pub use error::{Error, Result};
pub use flow::{HeaderList, HttpFlowState, RequestState, ResponseState};
pub use payload::{kind, CapturedFlow, Payload};
