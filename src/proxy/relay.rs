//! Per-connection relay.
//!
//! ```text
//!   Connecting ──ok──► Relaying ──EOF / error──► Closed
//!        │                                          ▲
//!        └───────────── UpstreamUnreachable ────────┘
//! ```
//!
//! While relaying, the relay waits for either socket to become readable.
//! Each readable side yields exactly one message, which is read, completed,
//! rewritten, passed through the plugins and written out before the next
//! wait, so the two directions never interleave partial messages.

use std::io::{self, ErrorKind, Read};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{RelayError, Side};
use crate::http::writer::MessageWriter;
use crate::http::{Request, Response, complete_body};
use crate::proxy::plugin::PluginChain;
use crate::proxy::rewrite::{rewrite_host, unrewrite_location};
use crate::proxy::upstream::Upstream;

/// Everything a relay needs that is shared across connections.
pub struct ProxyContext {
    pub upstream: Upstream,
    pub buffer_size: usize,
    pub plugins: PluginChain,
}

impl ProxyContext {
    pub fn new(upstream: Upstream, buffer_size: usize, plugins: PluginChain) -> Self {
        Self {
            upstream,
            buffer_size,
            plugins,
        }
    }

    pub fn from_config(config: &Config, plugins: PluginChain) -> Self {
        Self::new(
            Upstream::from_config(&config.proxy),
            config.server.buffer_size,
            plugins,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Connecting,
    Relaying,
    Closed,
}

pub struct Relay {
    peer: SocketAddr,
    client: Option<TcpStream>,
    upstream: Option<TcpStream>,
    ctx: Arc<ProxyContext>,
    buffer: Vec<u8>,
    /// Host header the client last sent, used to map redirects back.
    original_host: String,
    /// Method of the last forwarded request; HEAD answers carry no body.
    last_method: String,
    state: RelayState,
}

impl Relay {
    pub fn new(client: TcpStream, peer: SocketAddr, ctx: Arc<ProxyContext>) -> Self {
        let buffer = vec![0; ctx.buffer_size.max(1)];
        Self {
            peer,
            client: Some(client),
            upstream: None,
            ctx,
            buffer,
            original_host: String::new(),
            last_method: String::new(),
            state: RelayState::Connecting,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Drives the relay to `Closed`. A peer closing the connection is the
    /// normal way out and is not reported as an error.
    pub fn run(&mut self) -> Result<(), RelayError> {
        let result = self.connect().and_then(|()| self.relay());
        self.close();

        match result {
            Err(e) if e.is_closed() => {
                debug!("{e}");
                Ok(())
            }
            other => other,
        }
    }

    fn connect(&mut self) -> Result<(), RelayError> {
        debug!(upstream = %self.ctx.upstream.host_header(), "connecting to upstream");
        // Reported once, by the caller of `run`.
        let stream = self.ctx.upstream.connect()?;
        info!(upstream = %self.ctx.upstream.host_header(), "connected to upstream");
        self.upstream = Some(stream);
        self.state = RelayState::Relaying;
        Ok(())
    }

    fn relay(&mut self) -> Result<(), RelayError> {
        while self.state == RelayState::Relaying {
            let (client_ready, upstream_ready) = self.wait_readable()?;

            if client_ready {
                self.forward_request()?;
            }
            if upstream_ready {
                self.forward_response()?;
            }
        }
        Ok(())
    }

    /// client -> upstream
    fn forward_request(&mut self) -> Result<(), RelayError> {
        let client = self
            .client
            .as_mut()
            .ok_or(RelayError::ConnectionClosed(Side::Client))?;

        let n = read_once(client, &mut self.buffer, Side::Client)?;
        debug!(bytes = n, "received from client");

        let mut request = Request::parse(&self.buffer[..n])?;
        info!("[S <- C] {}", request.start_line());

        complete_body(&mut request, client, &mut self.buffer, Side::Client)?;
        debug!(body = request.body.len(), "request complete");

        self.original_host = rewrite_host(&mut request, &self.ctx.upstream);

        if !self.ctx.plugins.on_client_request(&mut request) {
            debug!("request dropped by plugin");
            return Ok(());
        }

        self.last_method.clone_from(&request.method);

        let upstream = self
            .upstream
            .as_mut()
            .ok_or(RelayError::ConnectionClosed(Side::Upstream))?;
        MessageWriter::new(request.serialize())
            .write_to(upstream, Side::Upstream)
            .inspect_err(|_| error!("[S <- C] failed to send request to upstream"))
    }

    /// upstream -> client
    fn forward_response(&mut self) -> Result<(), RelayError> {
        let upstream = self
            .upstream
            .as_mut()
            .ok_or(RelayError::ConnectionClosed(Side::Upstream))?;

        let n = read_once(upstream, &mut self.buffer, Side::Upstream)?;
        debug!(bytes = n, "received from upstream");

        let mut response = Response::parse(&self.buffer[..n])?;
        info!("[S -> C] {}", response.start_line());

        if response_has_body(&self.last_method, response.status) {
            complete_body(&mut response, upstream, &mut self.buffer, Side::Upstream)?;
        }
        debug!(body = response.body.len(), "response complete");

        unrewrite_location(&mut response, &self.ctx.upstream, &self.original_host);

        if !self.ctx.plugins.on_server_response(&mut response) {
            debug!("response dropped by plugin");
            return Ok(());
        }

        let client = self
            .client
            .as_mut()
            .ok_or(RelayError::ConnectionClosed(Side::Client))?;
        MessageWriter::new(response.serialize())
            .write_to(client, Side::Client)
            .inspect_err(|_| error!("[S -> C] failed to send response to client"))
    }

    /// Blocks until at least one side is readable (or hung up).
    fn wait_readable(&self) -> Result<(bool, bool), RelayError> {
        let client = self
            .client
            .as_ref()
            .ok_or(RelayError::ConnectionClosed(Side::Client))?;
        let upstream = self
            .upstream
            .as_ref()
            .ok_or(RelayError::ConnectionClosed(Side::Upstream))?;

        let mut fds = [
            libc::pollfd {
                fd: client.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: upstream.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];

        loop {
            // SAFETY: `fds` is a live array and its exact length is passed
            // along. Both descriptors belong to streams owned by `self`, which
            // is borrowed for the whole call.
            let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == ErrorKind::Interrupted {
                    continue;
                }
                error!(error = %err, "poll failed");
                return Err(RelayError::Poll(err));
            }

            let readable = |fd: &libc::pollfd| {
                fd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0
            };
            return Ok((readable(&fds[0]), readable(&fds[1])));
        }
    }

    /// Closes both sockets. Safe to call more than once.
    fn close(&mut self) {
        let streams = [
            (Side::Client, self.client.take()),
            (Side::Upstream, self.upstream.take()),
        ];
        for (side, stream) in streams {
            if let Some(stream) = stream {
                let _ = stream.shutdown(Shutdown::Both);
                debug!(%side, peer = %self.peer, "socket closed");
            }
        }
        self.state = RelayState::Closed;
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.close();
    }
}

/// 1xx, 204, 304 and answers to HEAD never carry a body, whatever their
/// Content-Length says.
fn response_has_body(request_method: &str, status: u16) -> bool {
    !(request_method.eq_ignore_ascii_case("HEAD")
        || (100..200).contains(&status)
        || status == 204
        || status == 304)
}

/// One read of whatever the peer has sent, up to the buffer size.
fn read_once(stream: &mut TcpStream, buffer: &mut [u8], side: Side) -> Result<usize, RelayError> {
    loop {
        match stream.read(buffer) {
            Ok(0) => return Err(RelayError::ConnectionClosed(side)),
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(%side, error = %e, "read failed");
                return Err(RelayError::ConnectionClosed(side));
            }
        }
    }
}
