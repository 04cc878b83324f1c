//! Exchange client: submit and retrieve payloads through an HTTP/2 relay.
//!
//! Both calls address `{base}/send` and `{base}/recv` on the relay and tag
//! the request with the caller's identity in `x-client-id`. Every call goes
//! through the shared [`SessionPool`], so concurrent calls to one relay ride
//! one fingerprinted connection.

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use boring::x509::X509;
use bytes::Bytes;
use http::header::{HeaderValue, USER_AGENT};
use http::{Method, Uri};
use http_body_util::Full;
use tokio::task::JoinHandle;
use url::{Position, Url};

use crate::error::{Error, ErrorKind, Operation, Result};
use crate::fingerprint::profiles::FingerprintProfile;
use crate::pool::SessionPool;
use crate::response::Exchange;
use crate::timeouts::Timeouts;
use crate::transport::connector::{load_root_certificates, FingerprintDialer};
use crate::transport::hook::ConnectHook;
use crate::transport::tcp::TcpOptions;

/// Header carrying the caller identity.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

const SUBMIT_PATH: &str = "/send";
const RETRIEVE_PATH: &str = "/recv";

/// Interval between retrieves in [`ExchangeClient::poll`] by default.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(800);

/// Client for the relay's send/recv endpoints.
#[derive(Clone)]
pub struct ExchangeClient {
    pool: Arc<SessionPool>,
    profile: &'static FingerprintProfile,
    timeouts: Timeouts,
    _cleanup: Option<Arc<CleanupTask>>,
}

/// Background idle-session sweep, stopped when the last client clone drops.
struct CleanupTask(JoinHandle<()>);

impl Drop for CleanupTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Sweep often enough that an idle session outlives its limit by at most
/// half of it.
fn cleanup_interval(idle: Duration) -> Duration {
    (idle / 2).max(Duration::from_millis(10))
}

/// Builder for creating exchange clients.
pub struct ExchangeClientBuilder {
    profile: &'static FingerprintProfile,
    root_certs: Vec<X509>,
    ca_file: Option<PathBuf>,
    server_name: Option<String>,
    tcp: TcpOptions,
    timeouts: Timeouts,
    hook: Option<Arc<dyn ConnectHook>>,
}

/// Where one exchange goes.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    /// `host:port` handed to the hook; the port defaults to 443.
    authority: String,
    uri: Uri,
}

fn endpoint(base: &str, sub_path: &str) -> Result<Endpoint> {
    let url = Url::parse(base)?;
    if url.scheme() != "https" {
        return Err(Error::config(format!("Base URL must use https: {}", base)));
    }
    let host = url
        .host_str()
        .ok_or_else(|| Error::config(format!("Base URL has no host: {}", base)))?;
    let port = url.port_or_known_default().unwrap_or(443);

    let path = url.path();
    let path = path.strip_suffix('/').unwrap_or(path);
    let query = url.query().map(|q| format!("?{}", q)).unwrap_or_default();
    let uri = format!(
        "https://{}{}{}{}",
        &url[Position::BeforeHost..Position::AfterPort],
        path,
        sub_path,
        query
    );
    let uri = uri
        .parse::<Uri>()
        .map_err(|e| Error::config(format!("Invalid request URI {}: {}", uri, e)))?;

    Ok(Endpoint {
        authority: format!("{}:{}", host, port),
        uri,
    })
}

impl ExchangeClient {
    /// Create a new client builder.
    pub fn builder() -> ExchangeClientBuilder {
        ExchangeClientBuilder::new()
    }

    /// Client dialing with `profile`, system trust and default timeouts.
    pub fn new(profile: &'static FingerprintProfile) -> Result<Self> {
        Self::builder().profile(profile).build()
    }

    pub fn profile(&self) -> &'static FingerprintProfile {
        self.profile
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Shared session pool (for stats or an explicit cleanup).
    pub fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }

    /// `POST {base}/send` with `payload` as the body.
    pub async fn submit(
        &self,
        base: &str,
        identity: &str,
        payload: impl Into<Bytes>,
    ) -> Result<Exchange> {
        self.exchange(Operation::Submit, Method::POST, base, identity, payload.into())
            .await
    }

    /// `GET {base}/recv` with an empty body.
    pub async fn retrieve(&self, base: &str, identity: &str) -> Result<Exchange> {
        self.exchange(Operation::Retrieve, Method::GET, base, identity, Bytes::new())
            .await
    }

    /// Retrieve repeatedly, handing every payload to `on_payload`.
    ///
    /// Failed retrieves are logged and retried after `interval`; only
    /// configuration errors end the loop early. Returns once `on_payload`
    /// breaks.
    pub async fn poll<F>(
        &self,
        base: &str,
        identity: &str,
        interval: Duration,
        mut on_payload: F,
    ) -> Result<()>
    where
        F: FnMut(Bytes) -> ControlFlow<()>,
    {
        loop {
            match self.retrieve(base, identity).await {
                Ok(exchange) if exchange.has_payload() => {
                    if on_payload(exchange.into_body()).is_break() {
                        return Ok(());
                    }
                }
                Ok(exchange) => {
                    tracing::trace!(status = exchange.status(), "poll: nothing to retrieve");
                }
                Err(e) if e.kind() == ErrorKind::Config => return Err(e),
                Err(e) => tracing::warn!(error = %e, "poll: retrieve failed"),
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn exchange(
        &self,
        op: Operation,
        method: Method,
        base: &str,
        identity: &str,
        body: Bytes,
    ) -> Result<Exchange> {
        let sub_path = match op {
            Operation::Submit => SUBMIT_PATH,
            Operation::Retrieve => RETRIEVE_PATH,
        };
        let run = async {
            let target = endpoint(base, sub_path)?;
            let request = self.build_request(method, target.uri, identity, body)?;
            tracing::debug!(op = %op, authority = %target.authority, "issuing exchange");

            // Session setup runs under the connect deadline; the request
            // timeout starts once a session is in hand.
            let session = self.pool.session(&target.authority).await?;
            let send = self.pool.send_on(&session, request);
            let response = match self.timeouts.request {
                Some(limit) => match tokio::time::timeout(limit, send).await {
                    Ok(response) => response,
                    Err(_) => {
                        self.pool.evict(session.authority(), session.id()).await;
                        Err(Error::RequestTimeout(limit))
                    }
                },
                None => send.await,
            }?;
            Ok::<_, Error>(Exchange::from(response))
        };
        run.await.map_err(|e| e.during(op))
    }

    fn build_request(
        &self,
        method: Method,
        uri: Uri,
        identity: &str,
        body: Bytes,
    ) -> Result<http::Request<Full<Bytes>>> {
        let identity = HeaderValue::from_str(identity).map_err(|e| Error::InvalidHeader {
            name: CLIENT_ID_HEADER,
            message: e.to_string(),
        })?;
        http::Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_AGENT, self.profile.user_agent)
            .header(CLIENT_ID_HEADER, identity)
            .body(Full::new(body))
            .map_err(|e| Error::config(format!("Failed to build request: {}", e)))
    }
}

impl ExchangeClientBuilder {
    /// Create a new client builder with default settings.
    pub fn new() -> Self {
        Self {
            profile: FingerprintProfile::default_profile(),
            root_certs: Vec::new(),
            ca_file: None,
            server_name: None,
            tcp: TcpOptions::default(),
            timeouts: Timeouts::default(),
            hook: None,
        }
    }

    /// Set the fingerprint profile.
    pub fn profile(mut self, profile: &'static FingerprintProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Trust roots from a PEM bundle or DER file, loaded at build time.
    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    /// Trust these roots in addition to the system store.
    pub fn root_certificates(mut self, certs: Vec<X509>) -> Self {
        self.root_certs.extend(certs);
        self
    }

    /// Verify relays against this name instead of the URL host.
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    pub fn tcp_options(mut self, tcp: TcpOptions) -> Self {
        self.tcp = tcp;
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Dial through `hook` instead of a [`FingerprintDialer`].
    ///
    /// Trust, server name and TCP options are then the hook's business.
    pub fn connect_hook(mut self, hook: Arc<dyn ConnectHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ExchangeClient> {
        let hook = match self.hook {
            Some(hook) => hook,
            None => {
                let mut roots = self.root_certs;
                if let Some(path) = &self.ca_file {
                    roots.extend(load_root_certificates(path)?);
                }
                let mut dialer = FingerprintDialer::builder(self.profile)
                    .root_certificates(roots)
                    .tcp_options(self.tcp)
                    .connect_timeout(self.timeouts.connect);
                if let Some(name) = self.server_name {
                    dialer = dialer.server_name(name);
                }
                Arc::new(dialer.build()?) as Arc<dyn ConnectHook>
            }
        };

        let pool = SessionPool::new(hook, self.profile.http2)
            .with_max_idle(self.timeouts.idle)
            .with_connect_timeout(self.timeouts.connect);
        let pool = Arc::new(pool);

        // Outside a runtime there is nothing to spawn on; expired sessions
        // are then only replaced on the next call.
        let cleanup = tokio::runtime::Handle::try_current().ok().map(|_| {
            let interval = cleanup_interval(self.timeouts.idle);
            Arc::new(CleanupTask(pool.clone().spawn_cleanup_task(interval)))
        });

        tracing::debug!(profile = self.profile.name, "exchange client ready");

        Ok(ExchangeClient {
            pool,
            profile: self.profile,
            timeouts: self.timeouts,
            _cleanup: cleanup,
        })
    }
}

impl Default for ExchangeClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
