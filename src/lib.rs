//! Forwarder - HTTP reverse proxy
//!
//! Relays HTTP/1.x traffic between clients and a single upstream, with
//! plugin hooks on both directions.

pub mod config;
pub mod error;
pub mod http;
pub mod proxy;
pub mod server;
