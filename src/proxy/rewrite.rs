use tracing::debug;

use crate::http::{Request, Response};
use crate::proxy::upstream::Upstream;

/// Points the request's Host header at the upstream and returns the value
/// the client sent (empty if it sent none).
pub fn rewrite_host(request: &mut Request, upstream: &Upstream) -> String {
    let original = request.header("Host").unwrap_or_default().to_string();
    let rewritten = upstream.host_header();

    debug!(from = %original, to = %rewritten, "rewrite Host");
    request.headers.set("Host", rewritten);
    original
}

/// On 301/302, maps the upstream host inside `Location` back to the host the
/// client used. Returns true when the header changed.
pub fn unrewrite_location(
    response: &mut Response,
    upstream: &Upstream,
    original_host: &str,
) -> bool {
    if !response.is_redirect() || original_host.is_empty() || upstream.host().is_empty() {
        return false;
    }
    let Some(location) = response.header("Location") else {
        return false;
    };

    // Match "host:port" before the bare host.
    let authority = upstream.host_header();
    let mapped = if location.contains(&authority) {
        location.replace(&authority, original_host)
    } else {
        location.replace(upstream.host(), original_host)
    };
    if mapped == location {
        return false;
    }

    debug!(status = response.status, from = %location, to = %mapped, "rewrite Location");
    response.headers.set("Location", mapped);
    true
}
