//! In-memory connect hook: every dial gets a fresh duplex pipe with a stub
//! relay on the far end.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use mimic::{BoxedStream, ConnectHook, DialContext, EncryptedStream};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::task::JoinHandle;

use super::relay::{serve_h2, RelayState};

/// Client half of a duplex pipe that claims to have negotiated `h2`.
pub struct MemoryStream(DuplexStream);

impl AsyncRead for MemoryStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl AsyncWrite for MemoryStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.0).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_shutdown(cx)
    }
}

impl EncryptedStream for MemoryStream {
    fn negotiated_alpn(&self) -> Option<Vec<u8>> {
        Some(b"h2".to_vec())
    }
}

/// Shared relay state plus bookkeeping of every dial the hook served.
#[derive(Clone, Default)]
pub struct MemoryRelay {
    pub state: Arc<RelayState>,
    dials: Arc<AtomicUsize>,
    dialed: Arc<Mutex<Vec<(String, String)>>>,
    servers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hook(&self) -> Arc<dyn ConnectHook> {
        let relay = self.clone();
        Arc::new(move |_ctx: DialContext, network: String, addr: String| {
            let relay = relay.clone();
            async move {
                relay.dials.fetch_add(1, Ordering::SeqCst);
                relay.dialed.lock().unwrap().push((network, addr));
                let (client, server) = tokio::io::duplex(64 * 1024);
                let handle = tokio::spawn(serve_h2(server, relay.state.clone()));
                relay.servers.lock().unwrap().push(handle);
                Ok::<_, mimic::Error>(Box::new(MemoryStream(client)) as BoxedStream)
            }
        })
    }

    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    /// `(network, addr)` of every dial, in order.
    pub fn dialed(&self) -> Vec<(String, String)> {
        self.dialed.lock().unwrap().clone()
    }

    /// Pipes whose relay end is still serving.
    pub fn open_connections(&self) -> usize {
        self.servers
            .lock()
            .unwrap()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Tear down the far end of every open pipe.
    pub fn kill_connections(&self) {
        for handle in self.servers.lock().unwrap().drain(..) {
            handle.abort();
        }
    }
}
