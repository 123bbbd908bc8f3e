use std::sync::Arc;

use anyhow::Context;
use forwarder::config::Config;
use forwarder::proxy::ProxyContext;
use forwarder::proxy::builtin::build_chain;
use forwarder::server::{WorkerPool, listener};
use tokio::sync::oneshot;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(cfg.log.level.as_filter())
        .init();

    let plugins = build_chain(&cfg);
    let ctx = Arc::new(ProxyContext::from_config(&cfg, plugins));
    let pool = Arc::new(WorkerPool::from_config(&cfg.pool)?);
    let socket = listener::bind(&cfg.server.listen_addr)?;

    tracing::info!(
        "Reverse proxy for {}:{}",
        ctx.upstream.host(),
        ctx.upstream.port()
    );

    // The accept loop blocks, so it gets its own thread.
    let (done_tx, done_rx) = oneshot::channel();
    {
        let pool = Arc::clone(&pool);
        let ctx = Arc::clone(&ctx);
        std::thread::Builder::new()
            .name("listener".to_string())
            .spawn(move || {
                let _ = done_tx.send(listener::run(socket, &pool, ctx));
            })
            .context("Failed to start listener thread")?;
    }

    let outcome = tokio::select! {
        res = done_rx => {
            res.unwrap_or_else(|_| Err(anyhow::anyhow!("listener thread exited")))
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            Ok(())
        }
    };

    ctx.plugins.shutdown_all();
    pool.shutdown();

    outcome
}
