//! HTTP/1.x message model.
//!
//! The proxy never interprets a message beyond what forwarding needs. A
//! message is parsed from the bytes of one read, its body is completed from
//! the same peer, it is mutated in place, and it is serialized once right
//! before it is written out.
//!
//! # Submodules
//!
//! - **`parser`**: splits raw bytes into start line, headers and initial body
//! - **`headers`**: case-preserving header map with deterministic order
//! - **`request`** / **`response`**: the two message kinds
//! - **`body`**: chunked and Content-Length body completion
//! - **`writer`**: write-all loop used to forward a serialized message
//!
//! # Lifecycle
//!
//! ```text
//!   read ──► parse ──► complete body ──► mutate ──► serialize ──► write
//!             │             │                                      │
//!             └─ Malformed  └─ ConnectionClosed / Malformed         └─ ConnectionClosed
//! ```

pub mod body;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;

pub use body::{Framing, HttpMessage, complete_body};
pub use headers::Headers;
pub use request::{Request, RequestBuilder};
pub use response::Response;
