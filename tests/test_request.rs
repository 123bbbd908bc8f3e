use forwarder::error::ParseError;
use forwarder::http::request::{Request, RequestBuilder};

#[test]
fn test_parse_simple_get_request() {
    let raw = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let req = Request::parse(raw).unwrap();

    assert_eq!(req.method, "GET");
    assert_eq!(req.target, "/");
    assert_eq!(req.version, "HTTP/1.1");
    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.raw(), raw);
}

#[test]
fn test_parse_unknown_method_is_kept() {
    let req = Request::parse(b"PROPFIND /dav HTTP/1.1\r\n\r\n").unwrap();

    assert_eq!(req.method, "PROPFIND");
}

#[test]
fn test_parse_partial_body() {
    let req = Request::parse(b"POST /api HTTP/1.1\r\nContent-Length: 10\r\n\r\nhell").unwrap();

    assert_eq!(req.body, b"hell".to_vec());
}

#[test]
fn test_parse_absolute_form_target() {
    let req = Request::parse(b"GET http://example.com/index.html HTTP/1.1\r\n\r\n").unwrap();

    assert_eq!(req.target, "http://example.com/index.html");
}

#[test]
fn test_host_and_port_from_header() {
    let req = Request::parse(b"GET / HTTP/1.1\r\nHost: client.example:8080\r\n\r\n").unwrap();
    assert_eq!(req.host, "client.example");
    assert_eq!(req.port, 8080);

    let req = Request::parse(b"GET / HTTP/1.1\r\nHost: client.example\r\n\r\n").unwrap();
    assert_eq!(req.host, "client.example");
    assert_eq!(req.port, 80);
}

#[test]
fn test_host_ipv6_without_port() {
    let req = Request::parse(b"GET / HTTP/1.1\r\nHost: [::1]\r\n\r\n").unwrap();

    assert_eq!(req.host, "[::1]");
    assert_eq!(req.port, 80);
}

#[test]
fn test_missing_host_header() {
    let req = Request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();

    assert_eq!(req.host, "");
    assert_eq!(req.port, 80);
}

#[test]
fn test_start_line_token_count() {
    assert!(matches!(
        Request::parse(b"GET /\r\n\r\n"),
        Err(ParseError::InvalidStartLine(_))
    ));
    assert!(matches!(
        Request::parse(b"GET / HTTP/1.1 extra\r\n\r\n"),
        Err(ParseError::InvalidStartLine(_))
    ));
}

#[test]
fn test_missing_header_terminator() {
    let result = Request::parse(b"GET / HTTP/1.1\r\nHost: example.com\r\n");

    assert_eq!(result.unwrap_err(), ParseError::MissingHeaderTerminator);
}

#[test]
fn test_malformed_header() {
    let result = Request::parse(b"GET / HTTP/1.1\r\nBrokenHeader\r\n\r\n");

    assert!(matches!(result, Err(ParseError::InvalidHeader(_))));
}

#[test]
fn test_serialize_round_trip() {
    let raw = b"POST /submit?x=1 HTTP/1.1\r\nHost: example.com\r\nUser-Agent: test\r\nContent-Length: 5\r\n\r\nhello";
    let mut req = Request::parse(raw).unwrap();
    let bytes = req.serialize().to_vec();
    let again = Request::parse(&bytes).unwrap();

    assert_eq!(again.start_line(), "POST /submit?x=1 HTTP/1.1");
    assert_eq!(again.headers, req.headers);
    assert_eq!(again.header("User-Agent"), Some("test"));
    assert_eq!(again.body, b"hello".to_vec());
}

#[test]
fn test_serialize_is_deterministic() {
    let raw = b"GET / HTTP/1.1\r\nZ-Last: 1\r\nA-First: 2\r\n\r\n";
    let mut req = Request::parse(raw).unwrap();

    assert_eq!(
        req.serialize(),
        b"GET / HTTP/1.1\r\nA-First: 2\r\nZ-Last: 1\r\n\r\n"
    );
}

#[test]
fn test_raw_is_stale_until_serialize() {
    let raw = b"GET / HTTP/1.1\r\nHost: a\r\n\r\n";
    let mut req = Request::parse(raw).unwrap();
    req.headers.set("Host", "b");

    assert_eq!(req.raw(), raw);
    req.serialize();
    assert_eq!(req.raw(), b"GET / HTTP/1.1\r\nHost: b\r\n\r\n");
}

#[test]
fn test_request_builder() {
    let req = RequestBuilder::new()
        .method("POST")
        .target("/api/data")
        .header("Host", "localhost:3000")
        .body(b"{}".to_vec())
        .build()
        .unwrap();

    assert_eq!(req.version, "HTTP/1.1");
    assert_eq!(req.host, "localhost");
    assert_eq!(req.port, 3000);
    assert_eq!(req.raw(), b"POST /api/data HTTP/1.1\r\nHost: localhost:3000\r\n\r\n{}");
}

#[test]
fn test_request_builder_requires_method() {
    let result = RequestBuilder::new().target("/").build();

    assert!(result.is_err());
}
