//! # mimic
//!
//! HTTP/2 exchange client with BoringSSL-based TLS fingerprint emulation.
//!
//! Connections are dialed by a [`FingerprintDialer`] whose ClientHello
//! reproduces a browser profile (cipher order, extension order, GREASE,
//! ALPN), multiplexed as HTTP/2 sessions by a [`SessionPool`], and used by
//! an [`ExchangeClient`] to submit payloads to and retrieve payloads from a
//! relay's `/send` and `/recv` endpoints.

pub mod client;
pub mod error;
pub mod fingerprint;
pub mod pool;
pub mod response;
pub mod timeouts;
pub mod transport;

// Re-exports
pub use client::{ExchangeClient, ExchangeClientBuilder, CLIENT_ID_HEADER, DEFAULT_POLL_INTERVAL};
pub use error::{Error, ErrorKind, Operation, Result};
pub use fingerprint::profiles::DEFAULT_PROFILE;
pub use fingerprint::{ClientHello, FingerprintProfile, Http2Settings, TlsFingerprint};
pub use pool::{PoolStats, SessionPool};
pub use response::Exchange;
pub use timeouts::Timeouts;
pub use transport::{
    server_name_from_addr, BoxedStream, ConnectHook, DialContext, EncryptedStream,
    FingerprintDialer,
};
