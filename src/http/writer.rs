use std::io::{ErrorKind, Write};

use crate::error::{RelayError, Side};

/// Pushes one serialized message into a socket, retrying partial writes.
pub struct MessageWriter<'a> {
    buffer: &'a [u8],
    written: usize,
}

impl<'a> MessageWriter<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, written: 0 }
    }

    /// Writes until every byte is accepted. A zero-length write or an I/O
    /// error means the peer is gone.
    pub fn write_to<W: Write>(&mut self, stream: &mut W, side: Side) -> Result<(), RelayError> {
        while self.written < self.buffer.len() {
            match stream.write(&self.buffer[self.written..]) {
                Ok(0) => return Err(RelayError::ConnectionClosed(side)),
                Ok(n) => self.written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!(%side, error = %e, "write failed");
                    return Err(RelayError::ConnectionClosed(side));
                }
            }
        }

        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }
}
