//! Error types shared by the message model, the relay and the worker pool.

use std::fmt;
use std::io;

use thiserror::Error;

/// Failures while turning bytes into an HTTP message.
///
/// Every variant is a "malformed message": the relay closes the offending
/// connection and nothing else.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("start line is not terminated by CRLF")]
    MissingStartLine,
    #[error("invalid start line: {0:?}")]
    InvalidStartLine(String),
    #[error("invalid status code: {0:?}")]
    InvalidStatusCode(String),
    #[error("header block is not terminated by CRLFCRLF")]
    MissingHeaderTerminator,
    #[error("invalid header line: {0:?}")]
    InvalidHeader(String),
    #[error("message head is not valid UTF-8")]
    InvalidEncoding,
    #[error("invalid chunk size line: {0:?}")]
    InvalidChunkSize(String),
    #[error("chunk payload not followed by CRLF")]
    InvalidChunkTerminator,
}

/// Which end of a relay an event happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Upstream,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Client => f.write_str("client"),
            Side::Upstream => f.write_str("upstream"),
        }
    }
}

/// Per-connection failures. None of these are fatal to the process.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("malformed message: {0}")]
    Malformed(#[from] ParseError),

    #[error("connection closed by {0}")]
    ConnectionClosed(Side),

    #[error("upstream {target} unreachable: {reason}")]
    UpstreamUnreachable { target: String, reason: String },

    #[error("readiness wait failed: {0}")]
    Poll(#[source] io::Error),
}

impl RelayError {
    /// True for an orderly or abrupt close by either peer.
    pub fn is_closed(&self) -> bool {
        matches!(self, RelayError::ConnectionClosed(_))
    }
}

/// Worker pool failures.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to spawn worker thread: {0}")]
    ResourceExhaustion(#[source] io::Error),

    #[error("pool is shut down")]
    ShutDown,

    #[error("invalid pool bounds: min {min}, max {max}")]
    InvalidBounds { min: usize, max: usize },
}
