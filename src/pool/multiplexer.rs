//! Session pool: one multiplexed HTTP/2 session per authority.
//!
//! Each authority owns a slot guarded by its own async mutex. Holding the
//! slot lock while dialing gives single-flight connection setup: concurrent
//! callers for the same authority wait for the one dial in progress and then
//! share its session. Different authorities never block each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::fingerprint::http2::Http2Settings;
use crate::transport::hook::{ConnectHook, DialContext};
use crate::transport::session::Session;

type Slot = Arc<Mutex<Option<Session>>>;

/// Pool of HTTP/2 sessions keyed by `host:port`.
pub struct SessionPool {
    hook: Arc<dyn ConnectHook>,
    http2: Http2Settings,
    slots: Mutex<HashMap<String, Slot>>,
    max_idle: Duration,
    connect_timeout: Duration,
    next_id: AtomicU64,
    dials: AtomicU64,
}

impl SessionPool {
    /// Default maximum idle duration (90 seconds)
    pub const DEFAULT_MAX_IDLE: Duration = Duration::from_secs(90);

    /// Default deadline handed to the hook for connect + handshake.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a pool dialing through `hook`.
    pub fn new(hook: Arc<dyn ConnectHook>, http2: Http2Settings) -> Self {
        Self {
            hook,
            http2,
            slots: Mutex::new(HashMap::new()),
            max_idle: Self::DEFAULT_MAX_IDLE,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            next_id: AtomicU64::new(1),
            dials: AtomicU64::new(0),
        }
    }

    /// Sessions idle this long are dropped instead of reused.
    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    async fn slot(&self, authority: &str) -> Slot {
        let mut slots = self.slots.lock().await;
        slots.entry(authority.to_string()).or_default().clone()
    }

    /// Return the live session for `authority`, dialing one if needed.
    pub async fn session(&self, authority: &str) -> Result<Session> {
        let slot = self.slot(authority).await;
        let mut current = slot.lock().await;

        if let Some(session) = current.as_ref() {
            if session.is_reusable(self.max_idle) {
                tracing::trace!(authority, session = session.id(), "reusing HTTP/2 session");
                return Ok(session.clone());
            }
            tracing::debug!(
                authority,
                session = session.id(),
                closed = session.is_closed(),
                idle = ?session.idle_for(),
                "discarding HTTP/2 session"
            );
            *current = None;
        }

        let ctx = DialContext::with_timeout(self.connect_timeout);
        self.dials.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(authority, "dialing new HTTP/2 session");
        // Holds hooks that ignore the context to the same deadline.
        let stream = tokio::time::timeout_at(ctx.deadline, self.hook.connect(ctx, "tcp", authority))
            .await
            .map_err(|_| Error::ConnectTimeout(self.connect_timeout))??;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = Session::open(id, authority, stream, &self.http2).await?;
        *current = Some(session.clone());
        Ok(session)
    }

    /// Send one request to `authority` on its shared session.
    pub async fn issue(
        &self,
        authority: &str,
        request: http::Request<Full<Bytes>>,
    ) -> Result<http::Response<Bytes>> {
        let session = self.session(authority).await?;
        self.send_on(&session, request).await
    }

    /// Send one request on `session`.
    ///
    /// A failed request evicts the session it ran on, so the next call dials
    /// afresh. Other requests already in flight on that session fail with it.
    pub async fn send_on(
        &self,
        session: &Session,
        request: http::Request<Full<Bytes>>,
    ) -> Result<http::Response<Bytes>> {
        match session.send(request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::debug!(
                    authority = session.authority(),
                    session = session.id(),
                    error = %e,
                    "request failed, evicting session"
                );
                self.evict(session.authority(), session.id()).await;
                Err(e)
            }
        }
    }

    /// Drop the cached session for `authority` if it is still `id`.
    pub async fn evict(&self, authority: &str, id: u64) {
        let slot = {
            let slots = self.slots.lock().await;
            match slots.get(authority) {
                Some(slot) => slot.clone(),
                None => return,
            }
        };
        let mut current = slot.lock().await;
        if current.as_ref().map(Session::id) == Some(id) {
            *current = None;
        }
    }

    /// Remove closed and idle-expired sessions.
    ///
    /// Slots with a dial in progress are left alone.
    pub async fn cleanup(&self) {
        let mut slots = self.slots.lock().await;
        slots.retain(|authority, slot| {
            let Ok(mut current) = slot.try_lock() else {
                return true;
            };
            if let Some(session) = current.as_ref() {
                if !session.is_reusable(self.max_idle) {
                    tracing::debug!(
                        authority = %authority,
                        session = session.id(),
                        "cleanup: dropping session"
                    );
                    *current = None;
                }
            }
            // Keep the slot while someone else holds a handle to it.
            current.is_some() || Arc::strong_count(slot) > 1
        });
    }

    /// Spawn a background cleanup task that runs periodically
    ///
    /// Returns a handle to the spawned task
    pub fn spawn_cleanup_task(
        self: Arc<Self>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            loop {
                interval_timer.tick().await;
                self.cleanup().await;
            }
        })
    }

    /// Get current pool statistics (for debugging/monitoring)
    pub async fn stats(&self) -> PoolStats {
        let slots = self.slots.lock().await;
        let mut stats = PoolStats {
            authorities: slots.len(),
            total_dials: self.dials.load(Ordering::Relaxed),
            ..PoolStats::default()
        };
        for slot in slots.values() {
            match slot.try_lock() {
                Ok(current) => {
                    if current.as_ref().is_some_and(|s| !s.is_closed()) {
                        stats.open_sessions += 1;
                    }
                }
                Err(_) => stats.busy_slots += 1,
            }
        }
        stats
    }
}

/// Pool statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Authorities with a slot.
    pub authorities: usize,
    /// Sessions cached and not yet closed.
    pub open_sessions: usize,
    /// Slots locked at the time of the snapshot (dial in progress).
    pub busy_slots: usize,
    /// Hook invocations since the pool was created.
    pub total_dials: u64,
}
