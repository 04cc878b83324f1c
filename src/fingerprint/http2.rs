//! HTTP/2 fingerprint configuration (SETTINGS frame and connection window).

use std::time::Duration;

/// HTTP/2 SETTINGS for fingerprinting.
///
/// hyper always sends `ENABLE_PUSH = 0` and orders SETTINGS by identifier,
/// which is what Chrome does too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Http2Settings {
    /// `None` omits SETTINGS_HEADER_TABLE_SIZE.
    pub header_table_size: Option<u32>,
    /// `None` omits SETTINGS_MAX_CONCURRENT_STREAMS.
    pub max_concurrent_streams: Option<u32>,
    pub initial_window_size: u32,
    /// Connection-level window; the first WINDOW_UPDATE is this minus 65535.
    pub initial_connection_window_size: u32,
    /// `None` leaves the frame size at the protocol default and omits it.
    pub max_frame_size: Option<u32>,
    pub max_header_list_size: u32,
    /// Handshake timeout for waiting for server SETTINGS frame.
    pub handshake_timeout: Option<Duration>,
}

impl Http2Settings {
    /// Chrome 106+ values (Akamai `1:65536;2:0;4:6291456;6:262144|15663105`).
    pub const fn chrome() -> Self {
        Self {
            header_table_size: Some(65536),
            max_concurrent_streams: None,
            initial_window_size: 6291456,
            initial_connection_window_size: 15728640,
            max_frame_size: None,
            max_header_list_size: 262144,
            handshake_timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl Default for Http2Settings {
    fn default() -> Self {
        Self::chrome()
    }
}
