//! TLS and HTTP/2 fingerprinting configuration.

pub mod hello;
pub mod http2;
pub mod profiles;
pub mod tls;

pub use hello::ClientHello;
pub use http2::Http2Settings;
pub use profiles::FingerprintProfile;
pub use tls::{CertCompression, Extension, TlsFingerprint};
