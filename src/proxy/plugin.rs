//! Plugin hooks.
//!
//! A plugin sees every fully read client request and upstream response and
//! may mutate it in place or veto its forwarding. Plugins run in
//! registration order; the first one that returns `false` stops the chain and
//! the message is dropped. The relay keeps running either way.
//!
//! Hooks are called from worker threads without any locking on the plugin's
//! behalf. A plugin with shared mutable state synchronizes it itself.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::http::{Request, Response};

pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Called once before the proxy starts accepting. An error unregisters
    /// the plugin.
    fn init(&self, _config: &Config) -> anyhow::Result<()> {
        Ok(())
    }

    fn shutdown(&self) {}

    /// Return `Ok(false)` to drop the request.
    fn on_client_request(&self, _request: &mut Request) -> anyhow::Result<bool> {
        Ok(true)
    }

    /// Return `Ok(false)` to drop the response.
    fn on_server_response(&self, _response: &mut Response) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Ordered set of plugins shared by every relay.
#[derive(Default)]
pub struct PluginChain {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        debug!(plugin = plugin.name(), "plugin registered");
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Initializes every plugin, dropping the ones that fail.
    pub fn init_all(&mut self, config: &Config) {
        self.plugins.retain(|plugin| match plugin.init(config) {
            Ok(()) => {
                info!(plugin = plugin.name(), "plugin loaded");
                true
            }
            Err(e) => {
                warn!(plugin = plugin.name(), error = %e, "plugin init failed, skipping");
                false
            }
        });
        info!(count = self.plugins.len(), "plugins loaded in all");
    }

    pub fn shutdown_all(&self) {
        for plugin in &self.plugins {
            debug!(plugin = plugin.name(), "unloading plugin");
            if catch_unwind(AssertUnwindSafe(|| plugin.shutdown())).is_err() {
                warn!(plugin = plugin.name(), "plugin panicked during shutdown");
            }
            info!(plugin = plugin.name(), "plugin unloaded");
        }
    }

    /// Runs the request hooks. `false` means do not forward.
    pub fn on_client_request(&self, request: &mut Request) -> bool {
        self.dispatch("client request", |plugin| plugin.on_client_request(request))
    }

    /// Runs the response hooks. `false` means do not forward.
    pub fn on_server_response(&self, response: &mut Response) -> bool {
        self.dispatch("server response", |plugin| plugin.on_server_response(response))
    }

    // Errors and panics inside a hook count as "continue".
    fn dispatch<F>(&self, event: &str, mut hook: F) -> bool
    where
        F: FnMut(&dyn Plugin) -> anyhow::Result<bool>,
    {
        for plugin in &self.plugins {
            debug!(plugin = plugin.name(), event, "calling plugin");

            let outcome = catch_unwind(AssertUnwindSafe(|| hook(plugin.as_ref())));
            match outcome {
                Ok(Ok(true)) => {}
                Ok(Ok(false)) => {
                    debug!(plugin = plugin.name(), event, "plugin stopped the chain");
                    return false;
                }
                Ok(Err(e)) => {
                    warn!(
                        plugin = plugin.name(),
                        event,
                        error = %e,
                        "plugin hook failed, continuing"
                    );
                }
                Err(_) => {
                    warn!(plugin = plugin.name(), event, "plugin hook panicked, continuing");
                }
            }
        }
        true
    }
}
