//! Body completion.
//!
//! A message is parsed from a single read, so its body is usually partial.
//! [`complete_body`] keeps reading from the same peer until the framing
//! announced in the headers is satisfied:
//!
//! - `Transfer-Encoding: ...chunked...`: chunks are read one by one and the
//!   body is rebuilt with its chunk framing intact, ending in `0\r\n\r\n`.
//! - numeric `Content-Length`: exactly the missing bytes are read.
//! - neither: the body is whatever the first read captured.

use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};
use tracing::debug;

use crate::error::{ParseError, RelayError, Side};
use crate::http::headers::Headers;
use crate::http::parser::{CRLF, HEAD_TERMINATOR, find, is_numeric};

const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

/// What the relay needs from a request or response to complete its body.
pub trait HttpMessage {
    fn headers(&self) -> &Headers;
    fn body_mut(&mut self) -> &mut Vec<u8>;
}

/// How the end of a body is signalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Chunked,
    ContentLength(usize),
    /// No usable framing; the first read is taken as the whole body.
    Unframed,
}

impl Framing {
    pub fn of(headers: &Headers) -> Self {
        if headers
            .get("Transfer-Encoding")
            .is_some_and(|te| te.contains("chunked"))
        {
            return Framing::Chunked;
        }

        headers
            .get("Content-Length")
            .filter(|cl| is_numeric(cl))
            .and_then(|cl| cl.parse().ok())
            .map(Framing::ContentLength)
            .unwrap_or(Framing::Unframed)
    }
}

/// Reads from `source` until `message`'s body is complete.
///
/// `scratch` is the per-connection read buffer; its length caps every read.
/// `side` names the peer for [`RelayError::ConnectionClosed`].
pub fn complete_body<M, R>(
    message: &mut M,
    source: &mut R,
    scratch: &mut [u8],
    side: Side,
) -> Result<(), RelayError>
where
    M: HttpMessage,
    R: Read,
{
    let mut reader = BodyReader {
        source,
        scratch,
        side,
    };

    match Framing::of(message.headers()) {
        Framing::Chunked => {
            debug!(%side, "chunked body");
            reader.read_chunked(message.body_mut())
        }
        Framing::ContentLength(length) => {
            let body = message.body_mut();
            debug!(%side, content_length = length, received = body.len(), "sized body");
            reader.read_sized(body, length)
        }
        Framing::Unframed => Ok(()),
    }
}

struct BodyReader<'a, R> {
    source: &'a mut R,
    scratch: &'a mut [u8],
    side: Side,
}

impl<R: Read> BodyReader<'_, R> {
    fn read_sized(&mut self, body: &mut Vec<u8>, length: usize) -> Result<(), RelayError> {
        let mut remaining = length.saturating_sub(body.len());

        while remaining > 0 {
            let want = remaining.min(self.scratch.len());
            let n = self.read_some(want)?;
            body.extend_from_slice(&self.scratch[..n]);
            remaining -= n;
            debug!(side = %self.side, received = n, remaining, "body bytes");
        }

        Ok(())
    }

    fn read_chunked(&mut self, body: &mut Vec<u8>) -> Result<(), RelayError> {
        let mut pending = BytesMut::from(&body[..]);
        body.clear();

        loop {
            let line_end = self.fill_until(&mut pending, |buf| find(buf, CRLF))?;
            let size_line = pending.split_to(line_end);
            pending.advance(CRLF.len());

            let size = parse_chunk_size(&size_line)?;
            if size == 0 {
                body.extend_from_slice(LAST_CHUNK);
                self.skip_trailers(&mut pending)?;
                if !pending.is_empty() {
                    debug!(side = %self.side, dropped = pending.len(), "bytes after last chunk");
                }
                return Ok(());
            }

            let framed = size
                .checked_add(CRLF.len())
                .ok_or_else(|| chunk_size_error(&size_line))?;
            self.fill_until(&mut pending, |buf| (buf.len() >= framed).then_some(()))?;

            let payload = pending.split_to(size);
            if &pending[..CRLF.len()] != CRLF {
                return Err(ParseError::InvalidChunkTerminator.into());
            }
            pending.advance(CRLF.len());

            body.extend_from_slice(&size_line);
            body.extend_from_slice(CRLF);
            body.extend_from_slice(&payload);
            body.extend_from_slice(CRLF);
            debug!(side = %self.side, chunk = size, "chunk");
        }
    }

    // After the zero-size line: either an empty line or a trailer block.
    fn skip_trailers(&mut self, pending: &mut BytesMut) -> Result<(), RelayError> {
        let consumed = self.fill_until(pending, |buf| {
            if buf.starts_with(CRLF) {
                Some(CRLF.len())
            } else {
                find(buf, HEAD_TERMINATOR).map(|pos| pos + HEAD_TERMINATOR.len())
            }
        })?;
        if consumed > CRLF.len() {
            debug!(side = %self.side, "dropping chunked trailers");
        }
        pending.advance(consumed);
        Ok(())
    }

    /// Reads into `pending` until `ready` yields a value.
    fn fill_until<T>(
        &mut self,
        pending: &mut BytesMut,
        ready: impl Fn(&[u8]) -> Option<T>,
    ) -> Result<T, RelayError> {
        loop {
            if let Some(value) = ready(&pending[..]) {
                return Ok(value);
            }
            let n = self.read_some(self.scratch.len())?;
            pending.extend_from_slice(&self.scratch[..n]);
            debug!(side = %self.side, received = n, buffered = pending.len(), "need more data");
        }
    }

    fn read_some(&mut self, want: usize) -> Result<usize, RelayError> {
        loop {
            match self.source.read(&mut self.scratch[..want]) {
                Ok(0) => return Err(RelayError::ConnectionClosed(self.side)),
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(side = %self.side, error = %e, "read failed");
                    return Err(RelayError::ConnectionClosed(self.side));
                }
            }
        }
    }
}

/// Hex size before any `;extension`.
fn parse_chunk_size(line: &[u8]) -> Result<usize, ParseError> {
    let text = std::str::from_utf8(line).map_err(|_| chunk_size_error(line))?;
    let digits = text.split(';').next().unwrap_or_default().trim();
    usize::from_str_radix(digits, 16).map_err(|_| chunk_size_error(line))
}

fn chunk_size_error(line: &[u8]) -> ParseError {
    ParseError::InvalidChunkSize(String::from_utf8_lossy(line).into_owned())
}
