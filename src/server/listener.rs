use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, info_span};

use crate::proxy::relay::{ProxyContext, Relay};
use crate::server::pool::WorkerPool;

pub fn bind(addr: &str) -> anyhow::Result<TcpListener> {
    TcpListener::bind(addr).with_context(|| format!("Failed to bind to {addr}"))
}

/// Accepts forever, handing each connection to the pool as one task.
///
/// Only returns when the pool can no longer take work.
pub fn run(listener: TcpListener, pool: &WorkerPool, ctx: Arc<ProxyContext>) -> anyhow::Result<()> {
    info!("Listening on {}", listener.local_addr()?);

    loop {
        let (socket, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
                continue;
            }
        };
        info!("Accepted connection from {}", peer);

        let ctx = Arc::clone(&ctx);
        pool.submit(move || serve(socket, peer, ctx))
            .context("Failed to dispatch connection to worker pool")?;
    }
}

/// Task body: one relay from connect to close, logged under the peer's span.
pub fn serve(socket: TcpStream, peer: SocketAddr, ctx: Arc<ProxyContext>) {
    let span = info_span!("conn", %peer);
    let _enter = span.enter();

    info!("New connection received");
    let mut relay = Relay::new(socket, peer, ctx);
    if let Err(e) = relay.run() {
        error!("Connection error from {}: {}", peer, e);
    }
}
