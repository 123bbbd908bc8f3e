//! The single upstream every relay forwards to.

use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};

use tracing::debug;

use crate::config::ProxyConfig;
use crate::error::RelayError;
use crate::http::request::DEFAULT_PORT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    host: String,
    port: u16,
}

impl Upstream {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(config.target_host.clone(), config.target_port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Value written into forwarded Host headers: the bare host on port 80,
    /// `host:port` otherwise.
    pub fn host_header(&self) -> String {
        if self.port == DEFAULT_PORT {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// A literal IP is used as is; anything else goes through DNS and the
    /// first address returned wins.
    pub fn resolve(&self) -> Result<SocketAddr, RelayError> {
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            debug!(upstream = %self.host, "IP address given");
            return Ok(SocketAddr::new(ip, self.port));
        }

        debug!(upstream = %self.host, "resolving upstream host");
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| self.unreachable(format!("failed to resolve: {e}")))?
            .next()
            .ok_or_else(|| self.unreachable("no addresses returned".to_string()))?;

        debug!(upstream = %self.host, resolved = %addr, "resolved");
        Ok(addr)
    }

    pub fn connect(&self) -> Result<TcpStream, RelayError> {
        let addr = self.resolve()?;
        debug!(upstream = %self.host_header(), %addr, "connecting to upstream");

        TcpStream::connect(addr)
            .map_err(|e| self.unreachable(format!("connect to {addr} failed: {e}")))
    }

    fn unreachable(&self, reason: String) -> RelayError {
        RelayError::UpstreamUnreachable {
            target: self.host_header(),
            reason,
        }
    }
}
