//! Error Types for the Core Model
//!
//! Payload decoding is the only fallible surface here. Projections in the
//! store tolerate `MalformedPayload` (affected fields render as empty/None);
//! typed accessors such as `CapturedFlow::from_chunks` surface it.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("Missing chunk of kind: {0}")]
    MissingChunk(&'static str),
}
