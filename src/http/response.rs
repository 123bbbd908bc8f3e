use crate::error::ParseError;
use crate::http::body::HttpMessage;
use crate::http::headers::Headers;
use crate::http::parser::{parse_head, split_start_line};

/// An HTTP response read from the upstream.
///
/// Like [`Request`](crate::http::request::Request), the cached wire form is
/// refreshed only by [`Response::parse`] and [`Response::serialize`].
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP version from the status line
    pub version: String,
    /// Numeric status code
    pub status: u16,
    /// Reason phrase, may be empty or contain spaces
    pub reason: String,
    /// Response headers
    pub headers: Headers,
    /// Body bytes accumulated so far
    pub body: Vec<u8>,
    raw: Vec<u8>,
}

impl Response {
    /// Parses a response from the bytes of one read. The body may be partial.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let head = parse_head(raw)?;
        let tokens = split_start_line(head.start_line, 3, true)?;

        let status = tokens[1]
            .parse::<u16>()
            .map_err(|_| ParseError::InvalidStatusCode(tokens[1].to_string()))?;

        Ok(Response {
            version: tokens[0].to_string(),
            status,
            reason: tokens[2].to_string(),
            headers: head.headers,
            body: head.body.to_vec(),
            raw: raw.to_vec(),
        })
    }

    /// Creates a response with no headers and an empty body.
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        let mut response = Response {
            version: "HTTP/1.1".to_string(),
            status,
            reason: reason.into(),
            headers: Headers::new(),
            body: Vec::new(),
            raw: Vec::new(),
        };
        response.serialize();
        response
    }

    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.set(key, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Rebuilds the wire form from the structured fields and returns it.
    pub fn serialize(&mut self) -> &[u8] {
        let mut buf = Vec::with_capacity(self.body.len() + 256);
        buf.extend_from_slice(self.start_line().as_bytes());
        buf.extend_from_slice(b"\r\n");
        self.headers.write_to(&mut buf);
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(&self.body);
        self.raw = buf;
        &self.raw
    }

    /// The wire form as of the last parse or serialize.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn start_line(&self) -> String {
        format!("{} {} {}", self.version, self.status, self.reason)
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// 301 and 302 carry a Location the relay has to map back.
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302)
    }
}

impl HttpMessage for Response {
    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn body_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }
}
