//! Stub relay: the `/send` + `/recv` queue service over real TLS or any
//! in-memory stream.

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use boring::ssl::SslAcceptor;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::tls::{acceptor_with_alpn, H2_ONLY};

/// One request as the relay saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seen {
    pub method: Method,
    pub path: String,
    pub client_id: String,
    pub user_agent: Option<String>,
    pub http2: bool,
}

/// Per-identity FIFO queues, like the production relay. The identity
/// `blocked` is answered with 403.
#[derive(Default)]
pub struct RelayState {
    queues: Mutex<HashMap<String, VecDeque<Bytes>>>,
    seen: Mutex<Vec<Seen>>,
    /// Park every `/recv` forever once set.
    pub hold_recv: AtomicBool,
    /// Number of `/recv` requests currently parked.
    pub held: AtomicUsize,
}

impl RelayState {
    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn queued(&self, client_id: &str) -> usize {
        self.queues
            .lock()
            .unwrap()
            .get(client_id)
            .map(VecDeque::len)
            .unwrap_or(0)
    }
}

async fn handle(
    state: Arc<RelayState>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let client_id = req
        .headers()
        .get("x-client-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("default")
        .to_string();
    let user_agent = req
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    state.seen.lock().unwrap().push(Seen {
        method: method.clone(),
        path: path.clone(),
        client_id: client_id.clone(),
        user_agent,
        http2: req.version() == hyper::Version::HTTP_2,
    });

    let response = if client_id == "blocked" {
        Response::builder()
            .status(StatusCode::FORBIDDEN)
            .body(Full::new(Bytes::from_static(b"forbidden")))
    } else if method == Method::POST && path.ends_with("/send") {
        let payload = req
            .into_body()
            .collect()
            .await
            .map(|b| b.to_bytes())
            .unwrap_or_default();
        let queued = payload.len();
        if !payload.is_empty() {
            state
                .queues
                .lock()
                .unwrap()
                .entry(client_id)
                .or_default()
                .push_back(payload);
        }
        Response::builder()
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(format!("{{\"queued\": {}}}", queued))))
    } else if method == Method::GET && path.ends_with("/recv") {
        if state.hold_recv.load(Ordering::SeqCst) {
            state.held.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<()>().await;
        }
        let payload = state
            .queues
            .lock()
            .unwrap()
            .get_mut(&client_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default();
        Response::builder()
            .header("content-type", "application/octet-stream")
            .body(Full::new(payload))
    } else {
        Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from_static(b"not found")))
    };

    Ok(response.expect("valid response"))
}

/// Serve the relay as HTTP/2 over `io` until the peer goes away.
pub async fn serve_h2<I>(io: I, state: Arc<RelayState>)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |req| handle(state.clone(), req));
    if let Err(e) = hyper::server::conn::http2::Builder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(io), service)
        .await
    {
        tracing::debug!("stub relay connection ended: {}", e);
    }
}

/// Relay stub behind a self-signed TLS listener on 127.0.0.1.
pub struct StubRelay {
    pub addr: SocketAddr,
    pub ca_pem: Vec<u8>,
    pub state: Arc<RelayState>,
    connections: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl StubRelay {
    pub async fn start() -> Self {
        Self::start_with_alpn(H2_ONLY).await
    }

    /// Relay whose TLS layer only accepts the given ALPN list.
    pub async fn start_with_alpn(alpn: &'static [u8]) -> Self {
        let (acceptor, ca_pem) = acceptor_with_alpn(alpn);
        let acceptor = Arc::new(acceptor);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(RelayState::default());
        let connections = Arc::new(AtomicUsize::new(0));

        let handle = tokio::spawn(accept_loop(
            listener,
            acceptor,
            state.clone(),
            connections.clone(),
        ));

        Self {
            addr,
            ca_pem,
            state,
            connections,
            handle,
        }
    }

    /// Base URL with the given path prefix.
    pub fn base(&self, prefix: &str) -> String {
        format!("https://127.0.0.1:{}{}", self.addr.port(), prefix)
    }

    /// TCP connections accepted so far.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for StubRelay {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    acceptor: Arc<SslAcceptor>,
    state: Arc<RelayState>,
    connections: Arc<AtomicUsize>,
) {
    loop {
        let tcp = match listener.accept().await {
            Ok((tcp, _)) => tcp,
            Err(e) => {
                tracing::error!("Accept error: {}", e);
                break;
            }
        };
        connections.fetch_add(1, Ordering::SeqCst);
        let acceptor = acceptor.clone();
        let state = state.clone();
        tokio::spawn(async move {
            match tokio_boring::accept(&acceptor, tcp).await {
                Ok(tls) => serve_h2(tls, state).await,
                Err(e) => tracing::debug!("stub relay handshake failed: {}", e),
            }
        });
    }
}
