//! On-disk representation of a cached response

use chrono::{DateTime, Utc};
use ganadero_core::{Headers, Request, Response, ResponseKind};
use serde::{Deserialize, Serialize};

/// A response snapshot as persisted in a cache partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    /// Status code
    pub status: u16,
    /// Response headers
    pub headers: Headers,
    /// Body bytes
    #[serde(with = "hex_body")]
    pub body: Vec<u8>,
    /// Response type
    #[serde(default)]
    pub kind: ResponseKind,
    /// When the entry was written
    pub stored_at: DateTime<Utc>,
}

impl StoredResponse {
    /// Snapshot `response` now
    pub fn capture(response: &Response) -> Self {
        Self {
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.to_vec(),
            kind: response.kind,
            stored_at: Utc::now(),
        }
    }

    /// Rebuild the response exactly as it was stored
    pub fn into_response(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: self.body.into(),
            kind: self.kind,
        }
    }
}

/// Cache key for a request: method and URL
pub fn request_key(request: &Request) -> String {
    format!("{} {}", request.method, request.url)
}

mod hex_body {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded).map_err(serde::de::Error::custom)
    }
}
