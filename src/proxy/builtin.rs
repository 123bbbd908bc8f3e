//! Plugins compiled into the proxy and enabled from the `plugins` config list.

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::http::body::Framing;
use crate::http::{Request, Response};
use crate::proxy::plugin::{Plugin, PluginChain};

/// One entry of the `plugins` list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PluginConfig {
    RewriteBody {
        find: String,
        replace: String,
        #[serde(default = "default_content_type")]
        content_type: String,
    },
    DenyPath {
        prefix: String,
    },
}

fn default_content_type() -> String {
    "text/html".to_string()
}

impl PluginConfig {
    pub fn build(&self) -> Box<dyn Plugin> {
        match self {
            PluginConfig::RewriteBody {
                find,
                replace,
                content_type,
            } => Box::new(RewriteBody {
                find: find.clone(),
                replace: replace.clone(),
                content_type: content_type.clone(),
            }),
            PluginConfig::DenyPath { prefix } => Box::new(DenyPath {
                prefix: prefix.clone(),
            }),
        }
    }
}

/// Registers every configured plugin in config order and initializes them.
pub fn build_chain(config: &Config) -> PluginChain {
    let mut chain = PluginChain::new();
    for entry in &config.plugins {
        chain.register(entry.build());
    }
    chain.init_all(config);
    chain
}

/// Replaces text in 200 responses of a given content type. Chunked bodies
/// are left alone.
///
/// Requests have `Accept-Encoding` blanked so the upstream answers with a
/// body that can be searched as text.
pub struct RewriteBody {
    find: String,
    replace: String,
    content_type: String,
}

impl Plugin for RewriteBody {
    fn name(&self) -> &str {
        "rewrite_body"
    }

    fn init(&self, _config: &Config) -> anyhow::Result<()> {
        anyhow::ensure!(!self.find.is_empty(), "rewrite_body needs a non-empty `find`");
        info!(find = %self.find, replace = %self.replace, "rewrite_body enabled");
        Ok(())
    }

    fn on_client_request(&self, request: &mut Request) -> anyhow::Result<bool> {
        request.headers.set("Accept-Encoding", "");
        Ok(true)
    }

    fn on_server_response(&self, response: &mut Response) -> anyhow::Result<bool> {
        let matches_type = response
            .header("Content-Type")
            .is_some_and(|ct| ct.contains(&self.content_type));
        // Chunk sizes would no longer match the payload.
        let framing = Framing::of(&response.headers);
        if response.status != 200 || !matches_type || framing == Framing::Chunked {
            return Ok(true);
        }

        let replaced = replace_all(&response.body, self.find.as_bytes(), self.replace.as_bytes());
        if replaced != response.body {
            debug!(find = %self.find, replace = %self.replace, "body rewritten");
            if matches!(framing, Framing::ContentLength(_)) {
                response.headers.set("Content-Length", replaced.len().to_string());
            }
            response.body = replaced;
        }
        Ok(true)
    }
}

/// Drops requests whose target starts with a prefix.
pub struct DenyPath {
    prefix: String,
}

impl Plugin for DenyPath {
    fn name(&self) -> &str {
        "deny_path"
    }

    fn on_client_request(&self, request: &mut Request) -> anyhow::Result<bool> {
        if request.target.starts_with(&self.prefix) {
            info!(path = %request.target, "request denied");
            return Ok(false);
        }
        Ok(true)
    }
}

fn replace_all(haystack: &[u8], find: &[u8], replace: &[u8]) -> Vec<u8> {
    if find.is_empty() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(pos) = rest.windows(find.len()).position(|w| w == find) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(replace);
        rest = &rest[pos + find.len()..];
    }
    out.extend_from_slice(rest);
    out
}
