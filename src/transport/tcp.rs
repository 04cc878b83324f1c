//! Raw TCP connection establishment.
//!
//! Resolves `host:port`, then tries each resolved address in order until one
//! accepts. The caller bounds the whole attempt with a deadline; dropping the
//! future releases any half-open socket.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::{lookup_host, TcpStream};

use crate::error::{Error, Result};

/// Socket options applied to every raw connection.
#[derive(Debug, Clone)]
pub struct TcpOptions {
    /// Disable Nagle's algorithm (browsers do).
    pub nodelay: bool,
    /// TCP keepalive idle time; `None` leaves the OS default.
    pub keepalive: Option<Duration>,
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self {
            nodelay: true,
            keepalive: Some(Duration::from_secs(60)),
        }
    }
}

/// Configure an established TCP stream.
pub fn configure_tcp_stream(stream: &TcpStream, opts: &TcpOptions) -> io::Result<()> {
    stream.set_nodelay(opts.nodelay)?;
    if let Some(idle) = opts.keepalive {
        let sock = SockRef::from(stream);
        sock.set_tcp_keepalive(&TcpKeepalive::new().with_time(idle))?;
    }
    Ok(())
}

/// Resolve `addr` and connect to the first address that accepts.
pub async fn connect(addr: &str, opts: &TcpOptions) -> Result<TcpStream> {
    let candidates: Vec<SocketAddr> = lookup_host(addr)
        .await
        .map_err(|e| Error::connect(format!("DNS resolution failed for {}: {}", addr, e)))?
        .collect();
    if candidates.is_empty() {
        return Err(Error::connect(format!("No addresses found for {}", addr)));
    }

    let mut last_err = None;
    for candidate in candidates {
        match TcpStream::connect(candidate).await {
            Ok(stream) => {
                configure_tcp_stream(&stream, opts).map_err(|e| {
                    Error::connect(format!("Failed to configure TCP socket: {}", e))
                })?;
                tracing::trace!(%candidate, "tcp connected");
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!(%candidate, error = %e, "tcp connect attempt failed");
                last_err = Some((candidate, e));
            }
        }
    }

    Err(match last_err {
        Some((candidate, e)) => {
            Error::connect(format!("Failed to connect to {} ({}): {}", addr, candidate, e))
        }
        None => Error::connect(format!("Failed to connect to {}", addr)),
    })
}
