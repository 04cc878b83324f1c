//! Connection hook between the HTTP/2 session layer and whatever dials.
//!
//! The session layer never opens sockets itself. It asks a [`ConnectHook`]
//! for an encrypted stream, which in production is the
//! [`FingerprintDialer`](crate::transport::connector::FingerprintDialer) and
//! in tests is anything returning an in-memory stream.

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

use crate::error::Result;

/// Boxed future returned by hooks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An authenticated, encrypted duplex stream ready for HTTP/2.
pub trait EncryptedStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Protocol selected via ALPN, if any.
    fn negotiated_alpn(&self) -> Option<Vec<u8>>;
}

/// Type-erased encrypted stream.
pub type BoxedStream = Box<dyn EncryptedStream>;

/// Per-dial context: the deadline covering connect and handshake.
#[derive(Debug, Clone, Copy)]
pub struct DialContext {
    pub deadline: Instant,
}

impl DialContext {
    /// Context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
        }
    }

    /// Time left before the deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Produces encrypted streams for the session layer.
pub trait ConnectHook: Send + Sync + 'static {
    /// Open one encrypted stream to `addr` (`host:port`) over `network`.
    fn connect<'a>(
        &'a self,
        ctx: DialContext,
        network: &'a str,
        addr: &'a str,
    ) -> BoxFuture<'a, Result<BoxedStream>>;
}

impl<F, Fut> ConnectHook for F
where
    F: Fn(DialContext, String, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<BoxedStream>> + Send + 'static,
{
    fn connect<'a>(
        &'a self,
        ctx: DialContext,
        network: &'a str,
        addr: &'a str,
    ) -> BoxFuture<'a, Result<BoxedStream>> {
        Box::pin(self(ctx, network.to_string(), addr.to_string()))
    }
}

/// Name used for SNI and certificate verification when dialing `addr`.
///
/// Strips a `:port` suffix when the last `:` sits at a non-leading position,
/// then one pair of enclosing brackets. An input without a separator, or a
/// bare IP literal such as `::1`, is used whole.
pub fn server_name_from_addr(addr: &str) -> &str {
    if addr.parse::<IpAddr>().is_ok() {
        return addr;
    }
    let host = match addr.rfind(':') {
        _ if addr.starts_with('[') && addr.ends_with(']') => addr,
        Some(i) if i > 0 => &addr[..i],
        _ => addr,
    };
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}
