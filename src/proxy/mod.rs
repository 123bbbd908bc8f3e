//! Reverse proxy functionality
//!
//! This module implements the per-connection relay between one client and
//! the configured upstream, together with the rewrites and plugin hooks it
//! applies to every message.

pub mod builtin;
pub mod plugin;
pub mod relay;
pub mod rewrite;
pub mod upstream;

pub use plugin::{Plugin, PluginChain};
pub use relay::{ProxyContext, Relay, RelayState};
pub use upstream::Upstream;
