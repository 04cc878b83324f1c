//! Timeout configuration for exchanges.
//!
//! # Timeout Types
//!
//! - **connect**: TCP connect + TLS handshake, one deadline for both
//! - **request**: HTTP/2 request sent until the full response body is read
//! - **idle**: how long an unused session stays eligible for reuse
//!
//! # Usage
//!
//! ```rust,ignore
//! use mimic::{ExchangeClient, Timeouts};
//! use std::time::Duration;
//!
//! let client = ExchangeClient::builder()
//!     .timeouts(Timeouts::exchange_defaults().request(Duration::from_secs(5)))
//!     .build()?;
//! ```

use std::time::Duration;

/// Deadlines applied by [`ExchangeClient`](crate::ExchangeClient).
///
/// `connect` and `idle` are always enforced; `request` may be disabled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timeouts {
    /// Deadline for establishing a session (DNS + TCP + TLS handshake).
    pub connect: Duration,

    /// Deadline for one request, including session setup when none is
    /// cached. `None` waits indefinitely.
    pub request: Option<Duration>,

    /// Sessions unused for this long are re-dialed instead of reused.
    pub idle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::exchange_defaults()
    }
}

impl Timeouts {
    /// Defaults for submit/retrieve calls.
    ///
    /// - connect: 10s
    /// - request: 10s
    /// - idle: 90s
    pub fn exchange_defaults() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Some(Duration::from_secs(10)),
            idle: Duration::from_secs(90),
        }
    }

    /// Defaults for a relay that holds `recv` open until data arrives.
    ///
    /// The request deadline is disabled; the relay decides when to answer.
    pub fn long_poll_defaults() -> Self {
        Self {
            request: None,
            ..Self::exchange_defaults()
        }
    }

    /// Same deadline for connect and request.
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            connect: timeout,
            request: Some(timeout),
            ..Self::exchange_defaults()
        }
    }

    /// Set connect timeout.
    pub fn connect(mut self, timeout: Duration) -> Self {
        self.connect = timeout;
        self
    }

    /// Set request timeout.
    pub fn request(mut self, timeout: Duration) -> Self {
        self.request = Some(timeout);
        self
    }

    /// Disable request timeout.
    pub fn no_request_timeout(mut self) -> Self {
        self.request = None;
        self
    }

    /// Set session idle limit.
    pub fn idle(mut self, timeout: Duration) -> Self {
        self.idle = timeout;
        self
    }
}
