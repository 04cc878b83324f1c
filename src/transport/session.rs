//! HTTP/2 session over one encrypted stream.
//!
//! A session owns the hyper connection task for its stream and hands out
//! clones of the request handle. Stream multiplexing, frame ordering and
//! flow control all live in the connection task; callers only see
//! request in, response out.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http2::{self, SendRequest};
use hyper_util::rt::{TokioExecutor, TokioIo};

use crate::error::{Error, Result};
use crate::fingerprint::http2::Http2Settings;
use crate::transport::hook::BoxedStream;

/// ALPN identifier sessions require.
pub const H2_ALPN: &[u8] = b"h2";

/// One multiplexed HTTP/2 connection.
#[derive(Clone)]
pub struct Session {
    id: u64,
    authority: Arc<str>,
    sender: SendRequest<Full<Bytes>>,
    closed: Arc<AtomicBool>,
    established_at: Instant,
    // Millis since `established_at` of the last request activity.
    last_used: Arc<AtomicU64>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("authority", &self.authority)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Session {
    /// Run the HTTP/2 handshake over `stream` with the profile's settings.
    ///
    /// The stream must have negotiated `h2` via ALPN.
    pub async fn open(
        id: u64,
        authority: &str,
        stream: BoxedStream,
        settings: &Http2Settings,
    ) -> Result<Self> {
        let alpn = stream.negotiated_alpn();
        if alpn.as_deref() != Some(H2_ALPN) {
            return Err(Error::handshake(format!(
                "{} did not negotiate h2 (ALPN: {})",
                authority,
                alpn.as_deref()
                    .map(String::from_utf8_lossy)
                    .unwrap_or_else(|| "none".into())
            )));
        }

        let mut builder = http2::Builder::new(TokioExecutor::new());
        builder
            .initial_stream_window_size(settings.initial_window_size)
            .initial_connection_window_size(settings.initial_connection_window_size)
            .max_header_list_size(settings.max_header_list_size)
            .max_frame_size(settings.max_frame_size)
            .header_table_size(settings.header_table_size)
            .max_concurrent_streams(settings.max_concurrent_streams);

        let handshake = builder.handshake::<_, Full<Bytes>>(TokioIo::new(stream));
        let handshake = match settings.handshake_timeout {
            Some(limit) => tokio::time::timeout(limit, handshake).await.map_err(|_| {
                Error::transport(format!("HTTP/2 handshake with {} timed out", authority))
            })?,
            None => handshake.await,
        };
        let (sender, conn) = handshake
            .map_err(|e| Error::transport(format!("HTTP/2 handshake failed: {}", e)))?;

        let closed = Arc::new(AtomicBool::new(false));
        let flag = closed.clone();
        let task_authority: Arc<str> = authority.into();
        let authority = task_authority.clone();
        tokio::spawn(async move {
            match conn.await {
                Ok(()) => {
                    tracing::debug!(
                        session = id,
                        authority = %task_authority,
                        "HTTP/2 connection closed"
                    )
                }
                Err(e) => {
                    tracing::error!(
                        session = id,
                        authority = %task_authority,
                        "HTTP/2 connection error: {}",
                        e
                    )
                }
            }
            flag.store(true, Ordering::Release);
        });

        tracing::debug!(session = id, authority = %authority, "HTTP/2 session established");

        Ok(Self {
            id,
            authority,
            sender,
            closed,
            established_at: Instant::now(),
            last_used: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Connection task has finished or the peer stopped accepting streams.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.sender.is_closed()
    }

    /// Time since the last request on this session.
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_used.load(Ordering::Relaxed));
        self.established_at.elapsed().saturating_sub(last)
    }

    /// Whether the session may carry another request.
    pub fn is_reusable(&self, max_idle: Duration) -> bool {
        !self.is_closed() && self.idle_for() < max_idle
    }

    fn touch(&self) {
        let now = self.established_at.elapsed().as_millis() as u64;
        self.last_used.fetch_max(now, Ordering::Relaxed);
    }

    /// Send one request and collect the full response body.
    pub async fn send(
        &self,
        request: http::Request<Full<Bytes>>,
    ) -> Result<http::Response<Bytes>> {
        self.touch();
        let mut sender = self.sender.clone();
        let response = sender
            .send_request(request)
            .await
            .map_err(|e| Error::transport(format!("HTTP/2 request failed: {}", e)))?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| Error::transport(format!("Failed to read response body: {}", e)))?
            .to_bytes();
        self.touch();

        Ok(http::Response::from_parts(parts, body))
    }
}
