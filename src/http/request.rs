use crate::error::ParseError;
use crate::http::body::HttpMessage;
use crate::http::headers::Headers;
use crate::http::parser::{is_numeric, parse_head, split_start_line};

/// Port assumed when the Host header does not carry one.
pub const DEFAULT_PORT: u16 = 80;

/// An HTTP request read from a client.
///
/// The structured fields and the cached wire form (`raw`) are only in sync
/// right after [`Request::parse`] or [`Request::serialize`]. Mutate the fields,
/// then serialize before sending.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method, kept verbatim ("GET", "PROPFIND", ...)
    pub method: String,
    /// Request target as sent (origin form or absolute form)
    pub target: String,
    /// HTTP version (typically "HTTP/1.1")
    pub version: String,
    /// Request headers
    pub headers: Headers,
    /// Body bytes accumulated so far
    pub body: Vec<u8>,
    /// Host part of the Host header at parse time
    pub host: String,
    /// Port part of the Host header at parse time
    pub port: u16,
    raw: Vec<u8>,
}

/// Builder for constructing Request objects.
pub struct RequestBuilder {
    method: Option<String>,
    target: Option<String>,
    version: Option<String>,
    headers: Headers,
    body: Vec<u8>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            target: None,
            version: None,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        let mut request = Request {
            method: self.method.ok_or("method missing")?,
            target: self.target.ok_or("target missing")?,
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers: self.headers,
            body: self.body,
            host: String::new(),
            port: DEFAULT_PORT,
            raw: Vec::new(),
        };
        request.refresh_authority();
        request.serialize();
        Ok(request)
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    /// Parses a request from the bytes of one read. The body may be partial.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let head = parse_head(raw)?;
        let tokens = split_start_line(head.start_line, 3, false)?;

        let mut request = Request {
            method: tokens[0].to_string(),
            target: tokens[1].to_string(),
            version: tokens[2].to_string(),
            headers: head.headers,
            body: head.body.to_vec(),
            host: String::new(),
            port: DEFAULT_PORT,
            raw: raw.to_vec(),
        };
        request.refresh_authority();
        Ok(request)
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
        format!("{} {} {}", self.method, self.target, self.version)
    }

    /// Retrieves a header value by name.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    // Host header "name[:port]" -> (name, port). Only a numeric suffix counts
    // as a port, so bracketed IPv6 literals without a port stay whole.
    fn refresh_authority(&mut self) {
        let host = self.headers.get("Host").unwrap_or_default();
        let (name, port) = match host.rsplit_once(':') {
            Some((name, port)) if is_numeric(port) => match port.parse() {
                Ok(port) => (name, port),
                Err(_) => (host, DEFAULT_PORT),
            },
            _ => (host, DEFAULT_PORT),
        };
        self.host = name.to_string();
        self.port = port;
    }
}

impl HttpMessage for Request {
    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn body_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }
}
