//! TLS ClientHello fingerprint configuration (JA3/JA4 inputs).
//!
//! Every list is ordered exactly as the reference client puts it on the wire.
//! Each entry carries its IANA code point (what an observer sees) and, where
//! BoringSSL needs one, the name its configuration strings accept.

/// Placeholder used for GREASE slots in ordered lists (RFC 8701).
///
/// The concrete value is chosen by BoringSSL per connection; any of the
/// sixteen reserved values matches this slot.
pub const GREASE_PLACEHOLDER: u16 = 0x0a0a;

/// Check whether a code point is one of the RFC 8701 GREASE values.
pub fn is_grease(value: u16) -> bool {
    (value & 0x0f0f) == 0x0a0a && (value >> 8) == (value & 0xff)
}

/// A cipher suite: IANA id plus the name BoringSSL's cipher strings accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuite {
    pub id: u16,
    pub name: &'static str,
}

impl CipherSuite {
    /// TLS 1.3 suites live in the 0x13xx block.
    pub fn is_tls13(&self) -> bool {
        self.id >> 8 == 0x13
    }
}

/// A supported group (elliptic curve).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedGroup {
    pub id: u16,
    pub name: &'static str,
}

/// A signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureScheme {
    pub id: u16,
    pub name: &'static str,
}

/// Entry of the supported_versions offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
    Grease,
    Tls13,
    Tls12,
}

impl TlsVersion {
    /// Wire value (GREASE slots report the placeholder).
    pub fn code(&self) -> u16 {
        match self {
            Self::Grease => GREASE_PLACEHOLDER,
            Self::Tls13 => 0x0304,
            Self::Tls12 => 0x0303,
        }
    }
}

/// Certificate compression algorithm (RFC 8879).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertCompression {
    Brotli,
}

impl CertCompression {
    pub fn code(&self) -> u16 {
        match self {
            Self::Brotli => 2,
        }
    }
}

/// ClientHello extensions a profile can list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    Grease,
    ServerName,
    StatusRequest,
    SupportedGroups,
    EcPointFormats,
    SignatureAlgorithms,
    Alpn,
    SignedCertificateTimestamp,
    Padding,
    ExtendedMasterSecret,
    CompressCertificate,
    SessionTicket,
    SupportedVersions,
    PskKeyExchangeModes,
    KeyShare,
    ApplicationSettings,
    EncryptedClientHello,
    RenegotiationInfo,
}

impl Extension {
    /// IANA code point (GREASE slots report the placeholder).
    pub fn code(&self) -> u16 {
        match self {
            Self::Grease => GREASE_PLACEHOLDER,
            Self::ServerName => 0x0000,
            Self::StatusRequest => 0x0005,
            Self::SupportedGroups => 0x000a,
            Self::EcPointFormats => 0x000b,
            Self::SignatureAlgorithms => 0x000d,
            Self::Alpn => 0x0010,
            Self::SignedCertificateTimestamp => 0x0012,
            Self::Padding => 0x0015,
            Self::ExtendedMasterSecret => 0x0017,
            Self::CompressCertificate => 0x001b,
            Self::SessionTicket => 0x0023,
            Self::SupportedVersions => 0x002b,
            Self::PskKeyExchangeModes => 0x002d,
            Self::KeyShare => 0x0033,
            Self::ApplicationSettings => 0x4469,
            Self::EncryptedClientHello => 0xfe0d,
            Self::RenegotiationInfo => 0xff01,
        }
    }

    /// Extensions whose presence depends on the connection, not the profile.
    ///
    /// SNI is omitted for IP-literal server names and padding only appears
    /// when the unpadded ClientHello falls into the 256..=511 byte window.
    pub fn is_conditional(&self) -> bool {
        matches!(self, Self::ServerName | Self::Padding)
    }
}

/// Cipher suites offered by Chrome since 83, in order.
pub const CHROME_CIPHER_SUITES: &[CipherSuite] = &[
    CipherSuite { id: 0x1301, name: "TLS_AES_128_GCM_SHA256" },
    CipherSuite { id: 0x1302, name: "TLS_AES_256_GCM_SHA384" },
    CipherSuite { id: 0x1303, name: "TLS_CHACHA20_POLY1305_SHA256" },
    CipherSuite { id: 0xc02b, name: "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256" },
    CipherSuite { id: 0xc02f, name: "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256" },
    CipherSuite { id: 0xc02c, name: "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384" },
    CipherSuite { id: 0xc030, name: "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384" },
    CipherSuite { id: 0xcca9, name: "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256" },
    CipherSuite { id: 0xcca8, name: "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256" },
    CipherSuite { id: 0xc013, name: "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA" },
    CipherSuite { id: 0xc014, name: "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA" },
    CipherSuite { id: 0x009c, name: "TLS_RSA_WITH_AES_128_GCM_SHA256" },
    CipherSuite { id: 0x009d, name: "TLS_RSA_WITH_AES_256_GCM_SHA384" },
    CipherSuite { id: 0x002f, name: "TLS_RSA_WITH_AES_128_CBC_SHA" },
    CipherSuite { id: 0x0035, name: "TLS_RSA_WITH_AES_256_CBC_SHA" },
];

/// Chrome signature algorithms.
pub const CHROME_SIGNATURE_ALGORITHMS: &[SignatureScheme] = &[
    SignatureScheme { id: 0x0403, name: "ecdsa_secp256r1_sha256" },
    SignatureScheme { id: 0x0804, name: "rsa_pss_rsae_sha256" },
    SignatureScheme { id: 0x0401, name: "rsa_pkcs1_sha256" },
    SignatureScheme { id: 0x0503, name: "ecdsa_secp384r1_sha384" },
    SignatureScheme { id: 0x0805, name: "rsa_pss_rsae_sha384" },
    SignatureScheme { id: 0x0501, name: "rsa_pkcs1_sha384" },
    SignatureScheme { id: 0x0806, name: "rsa_pss_rsae_sha512" },
    SignatureScheme { id: 0x0601, name: "rsa_pkcs1_sha512" },
];

/// Chrome supported groups (pre post-quantum).
pub const CHROME_CURVES: &[NamedGroup] = &[
    NamedGroup { id: 0x001d, name: "X25519" },
    NamedGroup { id: 0x0017, name: "P-256" },
    NamedGroup { id: 0x0018, name: "P-384" },
];

/// Chrome supported_versions offer.
pub const CHROME_VERSIONS: &[TlsVersion] =
    &[TlsVersion::Grease, TlsVersion::Tls13, TlsVersion::Tls12];

/// Chrome 106 extension order (last release before extension permutation).
pub const CHROME_106_EXTENSIONS: &[Extension] = &[
    Extension::Grease,
    Extension::ServerName,
    Extension::ExtendedMasterSecret,
    Extension::RenegotiationInfo,
    Extension::SupportedGroups,
    Extension::EcPointFormats,
    Extension::SessionTicket,
    Extension::Alpn,
    Extension::StatusRequest,
    Extension::SignatureAlgorithms,
    Extension::SignedCertificateTimestamp,
    Extension::KeyShare,
    Extension::PskKeyExchangeModes,
    Extension::SupportedVersions,
    Extension::CompressCertificate,
    Extension::ApplicationSettings,
    Extension::Grease,
    Extension::Padding,
];

/// Chrome 120 extension set. Chrome permutes the non-GREASE extensions on
/// every connection, so this order is only the pre-permutation reference.
pub const CHROME_120_EXTENSIONS: &[Extension] = &[
    Extension::Grease,
    Extension::ServerName,
    Extension::ExtendedMasterSecret,
    Extension::RenegotiationInfo,
    Extension::SupportedGroups,
    Extension::EcPointFormats,
    Extension::SessionTicket,
    Extension::Alpn,
    Extension::StatusRequest,
    Extension::SignatureAlgorithms,
    Extension::SignedCertificateTimestamp,
    Extension::KeyShare,
    Extension::PskKeyExchangeModes,
    Extension::SupportedVersions,
    Extension::CompressCertificate,
    Extension::ApplicationSettings,
    Extension::EncryptedClientHello,
    Extension::Grease,
    Extension::Padding,
];

/// TLS fingerprint configuration.
#[derive(Debug, Clone, Copy)]
pub struct TlsFingerprint {
    /// supported_versions offer, in order.
    pub versions: &'static [TlsVersion],
    /// Cipher suites in order.
    pub cipher_suites: &'static [CipherSuite],
    /// Extensions in wire order.
    pub extensions: &'static [Extension],
    /// Supported curves/groups.
    pub curves: &'static [NamedGroup],
    /// Signature algorithms.
    pub sigalgs: &'static [SignatureScheme],
    /// ALPN offer list.
    pub alpn: &'static [&'static str],
    /// ALPS (application_settings) protocols.
    pub alps: &'static [&'static str],
    /// Certificate compression algorithms.
    pub cert_compression: &'static [CertCompression],
    /// Enable GREASE values.
    pub grease: bool,
    /// Let BoringSSL shuffle the extension order per connection.
    pub permute_extensions: bool,
    /// Send a GREASE encrypted_client_hello extension.
    pub ech_grease: bool,
}

impl TlsFingerprint {
    /// Whether an extension is listed in this profile.
    pub fn has_extension(&self, ext: Extension) -> bool {
        self.extensions.contains(&ext)
    }

    /// Colon-separated cipher string for `set_cipher_list`.
    ///
    /// TLS 1.3 suites are left out: BoringSSL always offers them first, in
    /// the order Chrome uses, and rejects them in cipher strings.
    pub fn cipher_list(&self) -> String {
        join_names(
            self.cipher_suites
                .iter()
                .filter(|c| !c.is_tls13())
                .map(|c| c.name),
        )
    }

    /// Colon-separated group string for `set_curves_list`.
    pub fn curves_list(&self) -> String {
        join_names(self.curves.iter().map(|c| c.name))
    }

    /// Colon-separated signature scheme string for `set_sigalgs_list`.
    pub fn sigalgs_list(&self) -> String {
        join_names(self.sigalgs.iter().map(|s| s.name))
    }

    /// ALPN list in wire format (length-prefixed protocol names).
    pub fn alpn_wire(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for proto in self.alpn {
            out.push(proto.len() as u8);
            out.extend_from_slice(proto.as_bytes());
        }
        out
    }

    /// Lowest and highest non-GREASE version offered.
    pub fn version_range(&self) -> Option<(u16, u16)> {
        let mut offered = self
            .versions
            .iter()
            .filter(|v| **v != TlsVersion::Grease)
            .map(|v| v.code());
        let first = offered.next()?;
        Some(offered.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Extension code points in profile order.
    pub fn extension_codes(&self) -> Vec<u16> {
        self.extensions.iter().map(|e| e.code()).collect()
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grease_detection() {
        for v in [0x0a0a, 0x1a1a, 0x7a7a, 0xfafa] {
            assert!(is_grease(v), "{v:#06x}");
        }
        for v in [0x0000, 0x0a1a, 0x1301, 0x4469, 0xfe0d] {
            assert!(!is_grease(v), "{v:#06x}");
        }
    }

    #[test]
    fn test_alpn_wire_format() {
        let fp = TlsFingerprint {
            versions: CHROME_VERSIONS,
            cipher_suites: CHROME_CIPHER_SUITES,
            extensions: CHROME_106_EXTENSIONS,
            curves: CHROME_CURVES,
            sigalgs: CHROME_SIGNATURE_ALGORITHMS,
            alpn: &["h2", "http/1.1"],
            alps: &["h2"],
            cert_compression: &[CertCompression::Brotli],
            grease: true,
            permute_extensions: false,
            ech_grease: false,
        };
        assert_eq!(fp.alpn_wire(), b"\x02h2\x08http/1.1");
        assert_eq!(fp.version_range(), Some((0x0303, 0x0304)));
        assert!(fp.cipher_list().starts_with(
            "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256:TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256:"
        ));
        assert!(!fp.cipher_list().contains("TLS_AES_128_GCM_SHA256"));
        assert_eq!(fp.curves_list(), "X25519:P-256:P-384");
    }

    #[test]
    fn test_chrome_106_extension_order() {
        let codes: Vec<u16> = CHROME_106_EXTENSIONS.iter().map(|e| e.code()).collect();
        assert_eq!(
            codes,
            vec![
                0x0a0a, 0, 23, 65281, 10, 11, 35, 16, 5, 13, 18, 51, 45, 43, 27, 17513, 0x0a0a,
                21
            ]
        );
    }
}
