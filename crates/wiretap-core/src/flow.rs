//! HTTP Flow State
//!
//! Typed view of the JSON document stored in an `http_flow` chunk, plus the
//! pure extraction functions that derived columns and the flow summary
//! projection are computed from.
//!
//! ## Tolerant Decoding
//!
//! Capture data is incomplete by nature: a flow is written before its response
//! arrives, and producers may omit fields. Every field here is therefore
//! optional and unknown fields are ignored, so decoding only fails when the
//! payload is not a JSON object at all. Extraction returns empty/None for
//! anything missing instead of erroring.
//!
//! ## Headers
//!
//! Headers are stored the way producers serialize them: an ordered list of
//! `[name, value]` pairs. List order is significant: when the same header
//! name occurs more than once, extraction picks the first occurrence.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Ordered header list as serialized in flow state: `[["Name", "value"], ...]`.
pub type HeaderList = Vec<(String, String)>;

/// Request half of a flow's state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestState {
    /// HTTP method as captured (case preserved)
    #[serde(default)]
    pub method: Option<String>,

    /// URL scheme ("http"/"https")
    #[serde(default)]
    pub scheme: Option<String>,

    /// Target host
    #[serde(default)]
    pub host: Option<String>,

    /// Target port
    #[serde(default)]
    pub port: Option<u16>,

    /// Request path including query string
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub http_version: Option<String>,

    /// Request headers in wire order
    #[serde(default)]
    pub headers: HeaderList,

    /// Seconds since epoch when the request started
    #[serde(default)]
    pub timestamp_start: Option<f64>,

    /// Seconds since epoch when the request was fully read
    #[serde(default)]
    pub timestamp_end: Option<f64>,
}

/// Response half of a flow's state. Absent entirely while the response is
/// still pending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseState {
    /// HTTP status code
    #[serde(default)]
    pub status_code: Option<u16>,

    /// Status reason phrase
    #[serde(default)]
    pub reason: Option<String>,

    #[serde(default)]
    pub http_version: Option<String>,

    /// Response headers in wire order
    #[serde(default)]
    pub headers: HeaderList,

    /// Seconds since epoch when the response started
    #[serde(default)]
    pub timestamp_start: Option<f64>,

    /// Seconds since epoch when the response was fully read
    #[serde(default)]
    pub timestamp_end: Option<f64>,
}

/// State of one captured HTTP exchange, as stored in an `http_flow` chunk.
///
/// Body bytes are not part of the state; they live in separate
/// `request_content`/`response_content` chunks sharing the flow's mid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpFlowState {
    /// Producer-side flow identifier, if the producer recorded one
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub request: Option<RequestState>,

    #[serde(default)]
    pub response: Option<ResponseState>,
}

impl HttpFlowState {
    /// Decode flow state from a stored payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Encode flow state into the stored payload form.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// HTTP method, or the empty string when the request (or its method) is
    /// missing. This is the value the store persists as the derived method
    /// column.
    pub fn method(&self) -> &str {
        self.request
            .as_ref()
            .and_then(|r| r.method.as_deref())
            .unwrap_or("")
    }

    pub fn host(&self) -> Option<&str> {
        self.request.as_ref().and_then(|r| r.host.as_deref())
    }

    pub fn path(&self) -> Option<&str> {
        self.request.as_ref().and_then(|r| r.path.as_deref())
    }

    pub fn status_code(&self) -> Option<u16> {
        self.response.as_ref().and_then(|r| r.status_code)
    }

    /// Primary media type of the response: the value of the first
    /// `content-type` response header (name compared case-insensitively),
    /// truncated at the first `;` and trimmed.
    ///
    /// When the header is repeated, the first occurrence in list order wins.
    pub fn content_type(&self) -> Option<String> {
        let headers = &self.response.as_ref()?.headers;
        let value = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())?;
        let media_type = value.split(';').next().unwrap_or(value);
        Some(media_type.trim().to_string())
    }

    /// Response duration in seconds, None unless both response timestamps are
    /// present.
    pub fn duration(&self) -> Option<f64> {
        let response = self.response.as_ref()?;
        match (response.timestamp_start, response.timestamp_end) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// All header entries of the flow, request headers first, each list in
    /// wire order. This is the source of the header projection rows.
    pub fn header_entries(&self) -> Vec<(&str, &str)> {
        let mut entries = Vec::new();
        if let Some(request) = &self.request {
            for (name, value) in &request.headers {
                entries.push((name.as_str(), value.as_str()));
            }
        }
        if let Some(response) = &self.response {
            for (name, value) in &response.headers {
                entries.push((name.as_str(), value.as_str()));
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow_with_response_headers(headers: HeaderList) -> HttpFlowState {
        HttpFlowState {
            response: Some(ResponseState {
                status_code: Some(200),
                headers,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn content_type_strips_parameters() {
        let flow = flow_with_response_headers(vec![(
            "Content-Type".to_string(),
            "text/html; charset=utf-8".to_string(),
        )]);
        assert_eq!(flow.content_type().as_deref(), Some("text/html"));
    }

    #[test]
    fn content_type_name_match_is_case_insensitive() {
        let flow = flow_with_response_headers(vec![(
            "CONTENT-TYPE".to_string(),
            "application/json".to_string(),
        )]);
        assert_eq!(flow.content_type().as_deref(), Some("application/json"));
    }

    #[test]
    fn content_type_first_occurrence_wins() {
        let flow = flow_with_response_headers(vec![
            ("Content-Type".to_string(), "text/plain".to_string()),
            ("content-type".to_string(), "text/html".to_string()),
        ]);
        assert_eq!(flow.content_type().as_deref(), Some("text/plain"));
    }

    #[test]
    fn duration_requires_both_timestamps() {
        let mut flow = HttpFlowState {
            response: Some(ResponseState {
                timestamp_start: Some(10.0),
                timestamp_end: Some(10.25),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(flow.duration(), Some(0.25));

        flow.response.as_mut().unwrap().timestamp_end = None;
        assert_eq!(flow.duration(), None);

        flow.response = None;
        assert_eq!(flow.duration(), None);
    }

    #[test]
    fn method_is_empty_when_request_missing() {
        let flow = HttpFlowState::default();
        assert_eq!(flow.method(), "");
        assert_eq!(flow.host(), None);
        assert_eq!(flow.status_code(), None);
    }

    #[test]
    fn decode_tolerates_partial_state() {
        // A flow captured before its response arrived, with fields we don't model.
        let payload = br#"{"request": {"method": "GET", "host": "example.com", "marked": ""}, "response": null, "mode": "regular"}"#;
        let flow = HttpFlowState::decode(payload).unwrap();
        assert_eq!(flow.method(), "GET");
        assert_eq!(flow.host(), Some("example.com"));
        assert!(flow.response.is_none());
        assert_eq!(flow.duration(), None);
    }

    #[test]
    fn decode_rejects_non_object_payload() {
        assert!(HttpFlowState::decode(b"\x00\x01binary").is_err());
    }

    #[test]
    fn header_entries_request_then_response_order() {
        let flow = HttpFlowState {
            request: Some(RequestState {
                headers: vec![("Host".to_string(), "example.com".to_string())],
                ..Default::default()
            }),
            response: Some(ResponseState {
                headers: vec![("Server".to_string(), "nginx".to_string())],
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            flow.header_entries(),
            vec![("Host", "example.com"), ("Server", "nginx")]
        );
    }
}
