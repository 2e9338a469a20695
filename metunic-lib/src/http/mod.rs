//! HTTP plumbing for the registrar client.
//!
//! This module contains the transport abstraction and its reqwest
//! implementation, the cookie jar that carries a session between calls, and
//! the stores that persist jars across process invocations.

/// Cookie jar with RFC 6265 matching
pub mod cookies;

/// Session jar persistence backends
pub mod store;

/// Request encoding and execution
pub mod transport;

pub use cookies::{CookieJar, StoredCookie};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use transport::{build_http_request, ReqwestTransport, Transport};
