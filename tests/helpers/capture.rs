//! Raw TCP servers that look at the client's first TLS record.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Fatal handshake_failure alert, TLS 1.2 record version.
pub const HANDSHAKE_FAILURE_ALERT: &[u8] = &[0x15, 0x03, 0x03, 0x00, 0x02, 0x02, 0x28];

/// Read one complete TLS record (header included).
pub async fn read_record(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut header = [0u8; 5];
    stream.read_exact(&mut header).await?;
    let len = u16::from_be_bytes([header[3], header[4]]) as usize;
    let mut record = header.to_vec();
    record.resize(5 + len, 0);
    stream.read_exact(&mut record[5..]).await?;
    Ok(record)
}

/// Records the ClientHello of every connection, then hangs up.
pub struct CaptureServer {
    pub addr: SocketAddr,
    hellos: mpsc::UnboundedReceiver<Vec<u8>>,
    handle: JoinHandle<()>,
}

impl CaptureServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, hellos) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                if let Ok(record) = read_record(&mut stream).await {
                    let _ = tx.send(record);
                }
            }
        });
        Self { addr, hellos, handle }
    }

    /// Next captured ClientHello record.
    pub async fn next_hello(&mut self) -> Vec<u8> {
        tokio::time::timeout(Duration::from_secs(5), self.hellos.recv())
            .await
            .expect("no ClientHello within 5s")
            .expect("capture server stopped")
    }
}

impl Drop for CaptureServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Answers the ClientHello with a fatal alert, then reports whether the
/// client closed its end (EOF) within the grace period.
pub struct AlertServer {
    pub addr: SocketAddr,
    closed: mpsc::UnboundedReceiver<bool>,
    handle: JoinHandle<()>,
}

impl AlertServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, closed) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    if read_record(&mut stream).await.is_err() {
                        return;
                    }
                    let _ = stream.write_all(HANDSHAKE_FAILURE_ALERT).await;
                    let mut buf = [0u8; 1024];
                    let saw_eof = tokio::time::timeout(Duration::from_secs(5), async {
                        loop {
                            match stream.read(&mut buf).await {
                                Ok(0) | Err(_) => return true,
                                Ok(_) => continue,
                            }
                        }
                    })
                    .await
                    .unwrap_or(false);
                    let _ = tx.send(saw_eof);
                });
            }
        });
        Self { addr, closed, handle }
    }

    /// Whether the client hung up after the alert.
    pub async fn client_closed(&mut self) -> bool {
        tokio::time::timeout(Duration::from_secs(10), self.closed.recv())
            .await
            .ok()
            .flatten()
            .unwrap_or(false)
    }
}

impl Drop for AlertServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Takes the ClientHello and never answers. Reports the hello, then whether
/// the client hung up within the grace period.
pub struct SilentServer {
    pub addr: SocketAddr,
    hellos: mpsc::UnboundedReceiver<()>,
    closed: mpsc::UnboundedReceiver<bool>,
    handle: JoinHandle<()>,
}

impl SilentServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (hello_tx, hellos) = mpsc::unbounded_channel();
        let (closed_tx, closed) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let hello_tx = hello_tx.clone();
                let closed_tx = closed_tx.clone();
                tokio::spawn(async move {
                    if read_record(&mut stream).await.is_err() {
                        return;
                    }
                    let _ = hello_tx.send(());
                    let mut buf = [0u8; 1024];
                    let saw_eof = tokio::time::timeout(Duration::from_secs(10), async {
                        loop {
                            match stream.read(&mut buf).await {
                                Ok(0) | Err(_) => return true,
                                Ok(_) => continue,
                            }
                        }
                    })
                    .await
                    .unwrap_or(false);
                    let _ = closed_tx.send(saw_eof);
                });
            }
        });
        Self {
            addr,
            hellos,
            closed,
            handle,
        }
    }

    /// Wait until a client has sent its ClientHello.
    pub async fn hello_seen(&mut self) {
        tokio::time::timeout(Duration::from_secs(5), self.hellos.recv())
            .await
            .expect("no ClientHello within 5s")
            .expect("silent server stopped");
    }

    /// Whether the client hung up within `grace`.
    pub async fn client_closed(&mut self, grace: Duration) -> bool {
        tokio::time::timeout(grace, self.closed.recv())
            .await
            .ok()
            .flatten()
            .unwrap_or(false)
    }
}

impl Drop for SilentServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
