use crate::error::ParseError;
use crate::http::headers::Headers;

pub const CRLF: &[u8] = b"\r\n";
pub const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// The pieces every HTTP/1.x message shares, borrowed from the input buffer.
#[derive(Debug)]
pub struct Head<'a> {
    pub start_line: &'a str,
    pub headers: Headers,
    /// Whatever followed the blank line. May be a partial body.
    pub body: &'a [u8],
}

/// Splits `buf` into start line, headers and the initial body bytes.
pub fn parse_head(buf: &[u8]) -> Result<Head<'_>, ParseError> {
    let start_end = find(buf, CRLF).ok_or(ParseError::MissingStartLine)?;
    let headers_end = find(buf, HEAD_TERMINATOR).ok_or(ParseError::MissingHeaderTerminator)?;

    let head = std::str::from_utf8(&buf[..headers_end]).map_err(|_| ParseError::InvalidEncoding)?;
    let start_line = &head[..start_end];

    let mut headers = Headers::new();
    if headers_end > start_end {
        for line in head[start_end + 2..].split("\r\n") {
            let (key, value) = line
                .split_once(": ")
                .ok_or_else(|| ParseError::InvalidHeader(line.to_string()))?;
            headers.insert(key, value);
        }
    }

    Ok(Head {
        start_line,
        headers,
        body: &buf[headers_end + HEAD_TERMINATOR.len()..],
    })
}

/// Splits a start line on single spaces, requiring exactly `expected` tokens.
/// The last token absorbs any remaining spaces when `rest_is_free` is set
/// (reason phrases like "Not Found").
pub fn split_start_line(
    line: &str,
    expected: usize,
    rest_is_free: bool,
) -> Result<Vec<&str>, ParseError> {
    let tokens: Vec<&str> = if rest_is_free {
        line.splitn(expected, ' ').collect()
    } else {
        line.split(' ').collect()
    };

    if tokens.len() != expected || tokens[..expected - 1].iter().any(|t| t.is_empty()) {
        return Err(ParseError::InvalidStartLine(line.to_string()));
    }
    Ok(tokens)
}

pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
}

/// True when the value is a non-empty run of ASCII digits.
pub fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}
