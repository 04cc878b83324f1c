//! BoringSSL fingerprint-emulating dialer.
//!
//! Chrome is built on BoringSSL, so once every knob is set the way the
//! profile says, BoringSSL emits the reference client's ClientHello: cipher
//! order, groups, signature schemes, GREASE slots and extension order. The
//! dialer only turns on the extensions the profile lists and pins
//! extension permutation to the profile's setting.

use std::io::{Read, Write};
use std::path::Path;
use std::ptr;
use std::time::Duration;

use boring::ssl::{
    CertificateCompressionAlgorithm, CertificateCompressor, ConnectConfiguration, SslConnector,
    SslMethod, SslOptions, SslVersion,
};
use boring::x509::X509;
use foreign_types::ForeignTypeRef;
use tokio::net::TcpStream;
use tokio_boring::SslStream;

use crate::error::{Error, Result};
use crate::fingerprint::profiles::FingerprintProfile;
use crate::fingerprint::tls::{CertCompression, Extension};
use crate::transport::hook::{
    server_name_from_addr, BoxFuture, BoxedStream, ConnectHook, DialContext, EncryptedStream,
};
use crate::transport::tcp::{self, TcpOptions};

/// Default deadline for raw connect + handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Brotli certificate decompression.
///
/// Advertising compress_certificate obliges us to accept compressed chains.
struct BrotliDecompressor;

impl CertificateCompressor for BrotliDecompressor {
    const ALGORITHM: CertificateCompressionAlgorithm = CertificateCompressionAlgorithm::BROTLI;
    const CAN_COMPRESS: bool = false;
    const CAN_DECOMPRESS: bool = true;

    fn decompress<W>(&self, input: &[u8], output: &mut W) -> std::io::Result<()>
    where
        W: Write,
    {
        let mut decoder = brotli::Decompressor::new(input, 4096);
        let mut buf = Vec::new();
        decoder.read_to_end(&mut buf)?;
        output.write_all(&buf)
    }
}

/// Load trust roots from a PEM bundle or a single DER certificate.
pub fn load_root_certificates(path: impl AsRef<Path>) -> Result<Vec<X509>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| Error::config(format!("Failed to read CA file {}: {}", path.display(), e)))?;
    parse_root_certificates(&bytes)
        .map_err(|e| Error::config(format!("Failed to parse CA file {}: {}", path.display(), e)))
}

fn parse_root_certificates(bytes: &[u8]) -> std::result::Result<Vec<X509>, String> {
    if let Ok(certs) = X509::stack_from_pem(bytes) {
        if !certs.is_empty() {
            return Ok(certs);
        }
    }
    X509::from_der(bytes)
        .map(|cert| vec![cert])
        .map_err(|e| format!("neither PEM nor DER: {}", e))
}

fn proto_version(code: u16) -> Result<SslVersion> {
    match code {
        0x0303 => Ok(SslVersion::TLS1_2),
        0x0304 => Ok(SslVersion::TLS1_3),
        other => Err(Error::tls(format!("Unsupported TLS version {:#06x}", other))),
    }
}

/// Dials TCP and performs a TLS handshake shaped by a fingerprint profile.
#[derive(Clone)]
pub struct FingerprintDialer {
    profile: &'static FingerprintProfile,
    connector: SslConnector,
    server_name: Option<String>,
    tcp: TcpOptions,
    connect_timeout: Duration,
}

/// Builder for [`FingerprintDialer`].
pub struct FingerprintDialerBuilder {
    profile: &'static FingerprintProfile,
    root_certs: Vec<X509>,
    server_name: Option<String>,
    tcp: TcpOptions,
    connect_timeout: Duration,
}

impl FingerprintDialerBuilder {
    /// Trust these roots in addition to the system store.
    pub fn root_certificates(mut self, certs: Vec<X509>) -> Self {
        self.root_certs.extend(certs);
        self
    }

    /// Verify the peer against this name instead of the one derived from the address.
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Socket options for the raw connection.
    pub fn tcp_options(mut self, tcp: TcpOptions) -> Self {
        self.tcp = tcp;
        self
    }

    /// Deadline for connect + handshake when the caller supplies none.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build the TLS context from the profile.
    pub fn build(self) -> Result<FingerprintDialer> {
        let connector = build_connector(self.profile, &self.root_certs)?;
        Ok(FingerprintDialer {
            profile: self.profile,
            connector,
            server_name: self.server_name,
            tcp: self.tcp,
            connect_timeout: self.connect_timeout,
        })
    }
}

fn build_connector(profile: &FingerprintProfile, root_certs: &[X509]) -> Result<SslConnector> {
    let fp = &profile.tls;
    let mut builder = SslConnector::builder(SslMethod::tls_client())
        .map_err(|e| Error::tls(format!("Failed to create SSL connector: {}", e)))?;

    for cert in root_certs {
        if let Err(e) = builder.cert_store_mut().add_cert(cert.clone()) {
            tracing::warn!(error = %e, "skipping root certificate");
        }
    }

    builder
        .set_cipher_list(&fp.cipher_list())
        .map_err(|e| Error::tls(format!("Failed to set cipher list: {}", e)))?;
    builder
        .set_curves_list(&fp.curves_list())
        .map_err(|e| Error::tls(format!("Failed to set curves: {}", e)))?;
    builder
        .set_sigalgs_list(&fp.sigalgs_list())
        .map_err(|e| Error::tls(format!("Failed to set signature algorithms: {}", e)))?;

    let (min, max) = fp
        .version_range()
        .ok_or_else(|| Error::tls(format!("Profile {} offers no TLS version", profile.name)))?;
    builder
        .set_min_proto_version(Some(proto_version(min)?))
        .map_err(|e| Error::tls(format!("Failed to set min TLS version: {}", e)))?;
    builder
        .set_max_proto_version(Some(proto_version(max)?))
        .map_err(|e| Error::tls(format!("Failed to set max TLS version: {}", e)))?;

    if fp.has_extension(Extension::Alpn) && !fp.alpn.is_empty() {
        builder
            .set_alpn_protos(&fp.alpn_wire())
            .map_err(|e| Error::tls(format!("Failed to set ALPN: {}", e)))?;
    }

    if !fp.has_extension(Extension::SessionTicket) {
        builder.set_options(SslOptions::NO_TICKET);
    }

    builder.set_grease_enabled(fp.grease);
    builder.set_permute_extensions(fp.permute_extensions);
    if fp.has_extension(Extension::StatusRequest) {
        builder.enable_ocsp_stapling();
    }
    if fp.has_extension(Extension::SignedCertificateTimestamp) {
        builder.enable_signed_cert_timestamps();
    }
    if fp.has_extension(Extension::CompressCertificate) {
        for alg in fp.cert_compression {
            let registered = match alg {
                CertCompression::Brotli => {
                    builder.add_certificate_compression_algorithm(BrotliDecompressor)
                }
            };
            registered.map_err(|e| {
                Error::tls(format!("Failed to register certificate compression {:?}: {}", alg, e))
            })?;
        }
    }

    Ok(builder.build())
}

impl FingerprintDialer {
    /// Create a builder for the given profile.
    pub fn builder(profile: &'static FingerprintProfile) -> FingerprintDialerBuilder {
        FingerprintDialerBuilder {
            profile,
            root_certs: Vec::new(),
            server_name: None,
            tcp: TcpOptions::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Dialer with system trust and default options.
    pub fn new(profile: &'static FingerprintProfile) -> Result<Self> {
        Self::builder(profile).build()
    }

    /// Profile used for every handshake.
    pub fn profile(&self) -> &'static FingerprintProfile {
        self.profile
    }

    /// Dial using the configured connect timeout.
    pub async fn dial(&self, addr: &str) -> Result<SslStream<TcpStream>> {
        self.dial_with(DialContext::with_timeout(self.connect_timeout), addr)
            .await
    }

    /// Open a raw connection to `addr` and run the shaped handshake on it,
    /// all before `ctx.deadline`.
    pub async fn dial_with(&self, ctx: DialContext, addr: &str) -> Result<SslStream<TcpStream>> {
        let budget = ctx.remaining();
        let name = self
            .server_name
            .clone()
            .unwrap_or_else(|| server_name_from_addr(addr).to_string());
        if name.is_empty() {
            return Err(Error::InvalidAddress(addr.to_string()));
        }

        // Shape is fixed before the first byte goes out.
        let config = self.configure(&name)?;

        let raw = tokio::time::timeout_at(ctx.deadline, tcp::connect(addr, &self.tcp))
            .await
            .map_err(|_| Error::ConnectTimeout(budget))??;

        tracing::debug!(
            addr,
            server_name = %name,
            profile = self.profile.name,
            "starting TLS handshake"
        );

        // On failure the handshake error owns the raw stream; dropping it
        // closes the socket.
        let handshake = tokio_boring::connect(config, &name, raw);
        match tokio::time::timeout_at(ctx.deadline, handshake).await {
            Err(_) => Err(Error::ConnectTimeout(budget)),
            Ok(Err(e)) => Err(Error::handshake(format!("{} ({}): {}", addr, name, e))),
            Ok(Ok(stream)) => {
                tracing::debug!(
                    addr,
                    alpn = ?stream.ssl().selected_alpn_protocol().map(String::from_utf8_lossy),
                    "TLS handshake complete"
                );
                Ok(stream)
            }
        }
    }

    /// Per-connection settings that BoringSSL only exposes on the `SSL`.
    fn configure(&self, name: &str) -> Result<ConnectConfiguration> {
        let fp = &self.profile.tls;
        let config = self
            .connector
            .configure()
            .map_err(|e| Error::tls(format!("Failed to configure SSL for {}: {}", name, e)))?;

        if fp.ech_grease && fp.has_extension(Extension::EncryptedClientHello) {
            config.set_enable_ech_grease(true);
        }
        if fp.has_extension(Extension::ApplicationSettings) {
            for proto in fp.alps {
                // SAFETY: `config` owns a live SSL; BoringSSL copies `proto`.
                let ok = unsafe {
                    boring_sys::SSL_add_application_settings(
                        config.as_ptr(),
                        proto.as_ptr(),
                        proto.len(),
                        ptr::null(),
                        0,
                    )
                };
                if ok != 1 {
                    return Err(Error::tls(format!(
                        "Failed to add application settings for {}",
                        proto
                    )));
                }
            }
        }

        Ok(config)
    }
}

impl EncryptedStream for SslStream<TcpStream> {
    fn negotiated_alpn(&self) -> Option<Vec<u8>> {
        self.ssl().selected_alpn_protocol().map(<[u8]>::to_vec)
    }
}

impl ConnectHook for FingerprintDialer {
    fn connect<'a>(
        &'a self,
        ctx: DialContext,
        network: &'a str,
        addr: &'a str,
    ) -> BoxFuture<'a, Result<BoxedStream>> {
        Box::pin(async move {
            if network != "tcp" {
                return Err(Error::connect(format!("Unsupported network {}", network)));
            }
            let stream = self.dial_with(ctx, addr).await?;
            Ok(Box::new(stream) as BoxedStream)
        })
    }
}
