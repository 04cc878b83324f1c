//! Session pooling for HTTP/2 multiplexing.

pub mod multiplexer;

pub use multiplexer::{PoolStats, SessionPool};
