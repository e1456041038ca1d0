//! Store Configuration
//!
//! ## StoreConfig
//!
//! - **repeatable_kinds**: chunk kinds exempt from the one-chunk-per-(mid, kind)
//!   uniqueness rule, e.g. streamed body fragments that arrive as many chunks
//!   of one kind. This is a producer-declared input, not business logic baked
//!   into the store; by default every kind is unique per mid.
//! - **max_connections**: SQLite pool size for file-backed stores (default: 10)
//!
//! ## Usage
//!
//! ```ignore
//! use wiretap_store::StoreConfig;
//!
//! // A producer that streams response bodies as repeated fragments
//! let config = StoreConfig {
//!     repeatable_kinds: vec!["response_stream_fragment".to_string()],
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Kinds allowed to repeat per mid (exempt from the uniqueness guard)
    #[serde(default)]
    pub repeatable_kinds: Vec<String>,

    /// Connection pool size for file-backed stores (default: 10)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            repeatable_kinds: Vec::new(),
            max_connections: default_max_connections(),
        }
    }
}
