//! Transport layer.
//!
//! - Raw TCP with browser socket options
//! - BoringSSL handshake shaped by a fingerprint profile
//! - HTTP/2 sessions via hyper over any [`ConnectHook`] stream

pub mod connector;
pub mod hook;
pub mod session;
pub mod tcp;

pub use connector::{load_root_certificates, FingerprintDialer, FingerprintDialerBuilder};
pub use hook::{server_name_from_addr, BoxedStream, ConnectHook, DialContext, EncryptedStream};
pub use session::Session;
