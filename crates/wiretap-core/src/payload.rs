//! Chunk Payload Variants
//!
//! A chunk's payload shape depends on its kind. `Payload` is the typed,
//! tagged view of that: each variant owns its own schema, while the store
//! itself only ever sees `(kind, bytes)`.
//!
//! `CapturedFlow` bundles everything a producer captured for one exchange and
//! splits it into the per-kind chunks that get written (and back again when
//! the chunks are read).

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::flow::HttpFlowState;

/// Chunk kind tags. The vocabulary is open ended; these are the kinds the
/// capture pipeline writes today.
pub mod kind {
    /// Structured flow state (JSON)
    pub const HTTP_FLOW: &str = "http_flow";
    /// Raw request body bytes
    pub const REQUEST_CONTENT: &str = "request_content";
    /// Raw response body bytes
    pub const RESPONSE_CONTENT: &str = "response_content";
    /// Client connection details (JSON)
    pub const CLIENT_CONN: &str = "client_conn";
    /// Server connection details (JSON)
    pub const SERVER_CONN: &str = "server_conn";
}

/// Typed payload of a single chunk, keyed by chunk kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    HttpFlow(HttpFlowState),
    RequestContent(Bytes),
    ResponseContent(Bytes),
    ClientConn(serde_json::Value),
    ServerConn(serde_json::Value),
    /// Any kind this crate has no schema for; stored verbatim
    Raw { kind: String, data: Bytes },
}

impl Payload {
    /// The chunk kind this payload is stored under.
    pub fn kind(&self) -> &str {
        match self {
            Payload::HttpFlow(_) => kind::HTTP_FLOW,
            Payload::RequestContent(_) => kind::REQUEST_CONTENT,
            Payload::ResponseContent(_) => kind::RESPONSE_CONTENT,
            Payload::ClientConn(_) => kind::CLIENT_CONN,
            Payload::ServerConn(_) => kind::SERVER_CONN,
            Payload::Raw { kind, .. } => kind,
        }
    }

    /// Serialize into the byte form the store persists.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Payload::HttpFlow(state) => state.encode(),
            Payload::RequestContent(data) | Payload::ResponseContent(data) => Ok(data.to_vec()),
            Payload::ClientConn(value) | Payload::ServerConn(value) => {
                Ok(serde_json::to_vec(value)?)
            }
            Payload::Raw { data, .. } => Ok(data.to_vec()),
        }
    }

    /// Reconstruct a typed payload from a stored chunk.
    pub fn decode(kind: &str, data: &[u8]) -> Result<Self> {
        match kind {
            kind::HTTP_FLOW => Ok(Payload::HttpFlow(HttpFlowState::decode(data)?)),
            kind::REQUEST_CONTENT => Ok(Payload::RequestContent(Bytes::copy_from_slice(data))),
            kind::RESPONSE_CONTENT => Ok(Payload::ResponseContent(Bytes::copy_from_slice(data))),
            kind::CLIENT_CONN => Ok(Payload::ClientConn(serde_json::from_slice(data)?)),
            kind::SERVER_CONN => Ok(Payload::ServerConn(serde_json::from_slice(data)?)),
            other => Ok(Payload::Raw {
                kind: other.to_string(),
                data: Bytes::copy_from_slice(data),
            }),
        }
    }
}

/// Everything captured for one exchange, before it is split into chunks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedFlow {
    pub state: HttpFlowState,
    pub request_content: Option<Bytes>,
    pub response_content: Option<Bytes>,
    pub client_conn: Option<serde_json::Value>,
    pub server_conn: Option<serde_json::Value>,
}

impl CapturedFlow {
    /// Split into the per-kind chunk payloads the producer writes. Content
    /// and connection chunks come first, the flow state last, so a reader
    /// replaying chunks in reverse sees the state before its attachments.
    pub fn into_chunks(self) -> Vec<Payload> {
        let mut chunks = Vec::with_capacity(5);
        if let Some(data) = self.request_content {
            chunks.push(Payload::RequestContent(data));
        }
        if let Some(data) = self.response_content {
            chunks.push(Payload::ResponseContent(data));
        }
        if let Some(value) = self.client_conn {
            chunks.push(Payload::ClientConn(value));
        }
        if let Some(value) = self.server_conn {
            chunks.push(Payload::ServerConn(value));
        }
        chunks.push(Payload::HttpFlow(self.state));
        chunks
    }

    /// Reassemble from chunks read back from the store. Order-insensitive;
    /// fails if no `http_flow` chunk is present.
    pub fn from_chunks<I>(chunks: I) -> Result<Self>
    where
        I: IntoIterator<Item = Payload>,
    {
        let mut state = None;
        let mut flow = CapturedFlow::default();
        for chunk in chunks {
            match chunk {
                Payload::HttpFlow(s) => state = Some(s),
                Payload::RequestContent(data) => flow.request_content = Some(data),
                Payload::ResponseContent(data) => flow.response_content = Some(data),
                Payload::ClientConn(value) => flow.client_conn = Some(value),
                Payload::ServerConn(value) => flow.server_conn = Some(value),
                Payload::Raw { .. } => {}
            }
        }
        flow.state = state.ok_or(Error::MissingChunk(kind::HTTP_FLOW))?;
        Ok(flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::RequestState;

    fn sample_flow() -> CapturedFlow {
        CapturedFlow {
            state: HttpFlowState {
                request: Some(RequestState {
                    method: Some("POST".to_string()),
                    host: Some("api.example.com".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            request_content: Some(Bytes::from_static(b"{\"q\":1}")),
            response_content: None,
            client_conn: Some(serde_json::json!({"address": ["10.0.0.1", 52311]})),
            server_conn: None,
        }
    }

    #[test]
    fn split_assemble_round_trip() {
        let flow = sample_flow();
        let chunks = flow.clone().into_chunks();
        // state chunk is written last
        assert_eq!(chunks.last().unwrap().kind(), kind::HTTP_FLOW);

        let restored = CapturedFlow::from_chunks(chunks).unwrap();
        assert_eq!(restored, flow);
    }

    #[test]
    fn from_chunks_requires_flow_state() {
        let err = CapturedFlow::from_chunks(vec![Payload::RequestContent(Bytes::from_static(
            b"body",
        ))])
        .unwrap_err();
        assert!(matches!(err, Error::MissingChunk(k) if k == kind::HTTP_FLOW));
    }

    #[test]
    fn encode_decode_preserves_kind() {
        for payload in sample_flow().into_chunks() {
            let kind = payload.kind().to_string();
            let bytes = payload.encode().unwrap();
            let decoded = Payload::decode(&kind, &bytes).unwrap();
            assert_eq!(decoded.kind(), kind);
        }
    }

    #[test]
    fn unknown_kind_decodes_as_raw() {
        let decoded = Payload::decode("websocket_frame", b"\x81\x05hello").unwrap();
        assert!(matches!(decoded, Payload::Raw { ref kind, .. } if kind == "websocket_frame"));
        assert_eq!(decoded.encode().unwrap(), b"\x81\x05hello");
    }
}
