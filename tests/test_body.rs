//! Body completion against scripted byte sources.

use std::collections::VecDeque;
use std::io::{self, Read};

use forwarder::error::{ParseError, RelayError, Side};
use forwarder::http::{Request, Response, complete_body};

/// Hands out one scripted segment per read, then reports EOF.
struct Segments {
    parts: VecDeque<Vec<u8>>,
    reads: usize,
}

impl Segments {
    fn new(parts: &[&[u8]]) -> Self {
        Self {
            parts: parts.iter().map(|p| p.to_vec()).collect(),
            reads: 0,
        }
    }
}

impl Read for Segments {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads += 1;
        let Some(mut part) = self.parts.pop_front() else {
            return Ok(0);
        };
        let n = part.len().min(buf.len());
        buf[..n].copy_from_slice(&part[..n]);
        if n < part.len() {
            self.parts.push_front(part.split_off(n));
        }
        Ok(n)
    }
}

const CHUNKED_HEAD: &[u8] = b"POST /up HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n";
const CHUNKED_BODY: &[u8] = b"5\r\nhello\r\n0\r\n\r\n";

fn chunked_request_split_at(points: &[usize]) -> Vec<u8> {
    // The head plus whatever precedes the first split arrives in the first read.
    let mut first = CHUNKED_HEAD.to_vec();
    let mut cuts = vec![0];
    cuts.extend_from_slice(points);
    cuts.push(CHUNKED_BODY.len());

    first.extend_from_slice(&CHUNKED_BODY[cuts[0]..cuts[1]]);
    let mut request = Request::parse(&first).unwrap();

    let rest: Vec<&[u8]> = cuts[1..]
        .windows(2)
        .map(|w| &CHUNKED_BODY[w[0]..w[1]])
        .filter(|part| !part.is_empty())
        .collect();
    let mut source = Segments::new(&rest);
    let mut scratch = vec![0u8; 64];

    complete_body(&mut request, &mut source, &mut scratch, Side::Client).unwrap();
    request.body
}

#[test]
fn test_chunked_body_any_split() {
    for a in 0..=CHUNKED_BODY.len() {
        for b in a..=CHUNKED_BODY.len() {
            assert_eq!(
                chunked_request_split_at(&[a, b]),
                CHUNKED_BODY.to_vec(),
                "split at {a}, {b}"
            );
        }
    }
}

#[test]
fn test_chunked_body_byte_by_byte() {
    let mut request = Request::parse(CHUNKED_HEAD).unwrap();
    let parts: Vec<&[u8]> = CHUNKED_BODY.chunks(1).collect();
    let mut source = Segments::new(&parts);
    let mut scratch = vec![0u8; 64];

    complete_body(&mut request, &mut source, &mut scratch, Side::Client).unwrap();

    assert_eq!(request.body, CHUNKED_BODY.to_vec());
}

#[test]
fn test_chunked_multiple_chunks_keep_framing() {
    let body = b"4\r\nWiki\r\n5;ext=1\r\npedia\r\n0\r\n\r\n";
    let mut first = CHUNKED_HEAD.to_vec();
    first.extend_from_slice(&body[..7]);
    let mut request = Request::parse(&first).unwrap();
    let mut source = Segments::new(&[&body[7..]]);
    let mut scratch = vec![0u8; 4];

    complete_body(&mut request, &mut source, &mut scratch, Side::Client).unwrap();

    assert_eq!(request.body, body.to_vec());
}

#[test]
fn test_chunked_trailers_are_dropped() {
    let mut first = CHUNKED_HEAD.to_vec();
    first.extend_from_slice(b"3\r\nabc\r\n0\r\nX-Checksum: 1\r\n\r\n");
    let mut request = Request::parse(&first).unwrap();
    let mut source = Segments::new(&[]);
    let mut scratch = vec![0u8; 16];

    complete_body(&mut request, &mut source, &mut scratch, Side::Client).unwrap();

    assert_eq!(request.body, b"3\r\nabc\r\n0\r\n\r\n".to_vec());
    assert_eq!(source.reads, 0);
}

#[test]
fn test_chunked_bad_size_is_malformed() {
    let mut first = CHUNKED_HEAD.to_vec();
    first.extend_from_slice(b"xyz\r\n");
    let mut request = Request::parse(&first).unwrap();
    let mut scratch = vec![0u8; 16];

    let err = complete_body(&mut request, &mut Segments::new(&[]), &mut scratch, Side::Client)
        .unwrap_err();

    assert!(matches!(err, RelayError::Malformed(ParseError::InvalidChunkSize(_))));
}

#[test]
fn test_chunked_bad_terminator_is_malformed() {
    let mut first = CHUNKED_HEAD.to_vec();
    first.extend_from_slice(b"2\r\nabXX");
    let mut request = Request::parse(&first).unwrap();
    let mut scratch = vec![0u8; 16];

    let err = complete_body(&mut request, &mut Segments::new(&[]), &mut scratch, Side::Client)
        .unwrap_err();

    assert!(matches!(err, RelayError::Malformed(ParseError::InvalidChunkTerminator)));
}

#[test]
fn test_chunked_eof_is_connection_closed() {
    let mut first = CHUNKED_HEAD.to_vec();
    first.extend_from_slice(b"5\r\nhel");
    let mut request = Request::parse(&first).unwrap();
    let mut scratch = vec![0u8; 16];

    let err = complete_body(&mut request, &mut Segments::new(&[]), &mut scratch, Side::Client)
        .unwrap_err();

    assert!(matches!(err, RelayError::ConnectionClosed(Side::Client)));
}

#[test]
fn test_content_length_stops_exactly() {
    let mut request =
        Request::parse(b"POST /api HTTP/1.1\r\nContent-Length: 10\r\n\r\nabcd").unwrap();
    // The source holds more than the body; completion must not touch it.
    let mut source = Segments::new(&[b"ef", b"ghijNEXT REQUEST"]);
    let mut scratch = vec![0u8; 64];

    complete_body(&mut request, &mut source, &mut scratch, Side::Client).unwrap();

    assert_eq!(request.body, b"abcdefghij".to_vec());
    assert_eq!(source.parts.pop_front(), Some(b"NEXT REQUEST".to_vec()));
}

#[test]
fn test_content_length_reads_capped_by_buffer() {
    let mut response = Response::parse(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n").unwrap();
    let mut source = Segments::new(&[b"0123456789"]);
    let mut scratch = vec![0u8; 3];

    complete_body(&mut response, &mut source, &mut scratch, Side::Upstream).unwrap();

    assert_eq!(response.body, b"0123456789".to_vec());
    assert_eq!(source.reads, 4);
}

#[test]
fn test_content_length_already_complete() {
    let mut response = Response::parse(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok").unwrap();
    let mut source = Segments::new(&[]);
    let mut scratch = vec![0u8; 8];

    complete_body(&mut response, &mut source, &mut scratch, Side::Upstream).unwrap();

    assert_eq!(response.body, b"ok".to_vec());
    assert_eq!(source.reads, 0);
}

#[test]
fn test_content_length_eof_is_connection_closed() {
    let mut response =
        Response::parse(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc").unwrap();
    let mut scratch = vec![0u8; 8];
    let mut source = Segments::new(&[b"de"]);

    let err = complete_body(&mut response, &mut source, &mut scratch, Side::Upstream).unwrap_err();

    assert!(matches!(err, RelayError::ConnectionClosed(Side::Upstream)));
}

#[test]
fn test_unframed_body_is_first_read_only() {
    let mut response = Response::parse(b"HTTP/1.1 200 OK\r\n\r\npartial").unwrap();
    let mut source = Segments::new(&[b" more"]);
    let mut scratch = vec![0u8; 8];

    complete_body(&mut response, &mut source, &mut scratch, Side::Upstream).unwrap();

    assert_eq!(response.body, b"partial".to_vec());
    assert_eq!(source.reads, 0);
}
