//! Exchange results.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// Outcome of one submit or retrieve call.
///
/// Any status the relay answers with is returned here; only failures below
/// HTTP (connect, handshake, transport) are errors.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Exchange {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self { status, headers, body }
    }

    pub fn status(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// 200 with a non-empty body: the relay handed over a payload.
    pub fn has_payload(&self) -> bool {
        self.status == StatusCode::OK && !self.body.is_empty()
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl From<http::Response<Bytes>> for Exchange {
    fn from(response: http::Response<Bytes>) -> Self {
        let (parts, body) = response.into_parts();
        Self::new(parts.status, parts.headers, body)
    }
}
