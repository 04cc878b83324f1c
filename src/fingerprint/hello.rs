//! ClientHello inspection.
//!
//! Parses a captured ClientHello so it can be checked against the profile
//! that produced it, reduced to a JA3 string, or masked into a "shape"
//! where only the fields that must vary per connection (random, session id,
//! key shares, GREASE values) are neutralized.

use super::tls::{is_grease, Extension, TlsFingerprint, GREASE_PLACEHOLDER};
use crate::error::{Error, Result};

const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;

const EXT_SERVER_NAME: u16 = 0x0000;
const EXT_SUPPORTED_GROUPS: u16 = 0x000a;
const EXT_EC_POINT_FORMATS: u16 = 0x000b;
const EXT_SIGNATURE_ALGORITHMS: u16 = 0x000d;
const EXT_ALPN: u16 = 0x0010;
const EXT_COMPRESS_CERTIFICATE: u16 = 0x001b;
const EXT_PRE_SHARED_KEY: u16 = 0x0029;
const EXT_SUPPORTED_VERSIONS: u16 = 0x002b;
const EXT_KEY_SHARE: u16 = 0x0033;
const EXT_ENCRYPTED_CLIENT_HELLO: u16 = 0xfe0d;

/// One extension as it appeared on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExtension {
    pub code: u16,
    pub data: Vec<u8>,
}

/// A parsed ClientHello handshake message.
#[derive(Debug, Clone)]
pub struct ClientHello {
    pub legacy_version: u16,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suites: Vec<u16>,
    pub compression_methods: Vec<u8>,
    pub extensions: Vec<RawExtension>,
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::MalformedHello(format!("truncated at {what}")));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u24(&mut self, what: &str) -> Result<usize> {
        let b = self.take(3, what)?;
        Ok(((b[0] as usize) << 16) | ((b[1] as usize) << 8) | b[2] as usize)
    }

    fn u16_list(&mut self, len: usize, what: &str) -> Result<Vec<u16>> {
        if len % 2 != 0 {
            return Err(Error::MalformedHello(format!("odd length in {what}")));
        }
        let bytes = self.take(len, what)?;
        Ok(bytes
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect())
    }
}

impl ClientHello {
    /// Parse a ClientHello from a TLS record (starting with `0x16`) or from a
    /// bare handshake message (starting with `0x01`).
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let message = match data.first() {
            Some(&CONTENT_TYPE_HANDSHAKE) => {
                r.take(3, "record header")?;
                let len = r.u16("record length")? as usize;
                r.take(len, "record body")?
            }
            Some(&HANDSHAKE_CLIENT_HELLO) => data,
            Some(other) => {
                return Err(Error::MalformedHello(format!(
                    "not a handshake record (first byte {other:#04x})"
                )))
            }
            None => return Err(Error::MalformedHello("empty input".into())),
        };

        let mut r = Reader::new(message);
        let msg_type = r.u8("handshake type")?;
        if msg_type != HANDSHAKE_CLIENT_HELLO {
            return Err(Error::MalformedHello(format!(
                "handshake type {msg_type:#04x} is not ClientHello"
            )));
        }
        let body_len = r.u24("handshake length")?;
        let mut r = Reader::new(r.take(body_len, "handshake body")?);

        let legacy_version = r.u16("client version")?;
        let mut random = [0u8; 32];
        random.copy_from_slice(r.take(32, "random")?);
        let sid_len = r.u8("session id length")? as usize;
        let session_id = r.take(sid_len, "session id")?.to_vec();
        let cs_len = r.u16("cipher suites length")? as usize;
        let cipher_suites = r.u16_list(cs_len, "cipher suites")?;
        let comp_len = r.u8("compression methods length")? as usize;
        let compression_methods = r.take(comp_len, "compression methods")?.to_vec();

        let mut extensions = Vec::new();
        if r.remaining() > 0 {
            let ext_len = r.u16("extensions length")? as usize;
            let mut er = Reader::new(r.take(ext_len, "extensions")?);
            while er.remaining() > 0 {
                let code = er.u16("extension type")?;
                let len = er.u16("extension length")? as usize;
                let data = er.take(len, "extension body")?.to_vec();
                extensions.push(RawExtension { code, data });
            }
        }

        Ok(Self {
            legacy_version,
            random,
            session_id,
            cipher_suites,
            compression_methods,
            extensions,
        })
    }

    /// Extension code points in wire order.
    pub fn extension_codes(&self) -> Vec<u16> {
        self.extensions.iter().map(|e| e.code).collect()
    }

    /// Body of the first extension with this code point.
    pub fn extension(&self, code: u16) -> Option<&[u8]> {
        self.extensions
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.data.as_slice())
    }

    /// SNI host name, if sent.
    pub fn server_name(&self) -> Option<String> {
        let data = self.extension(EXT_SERVER_NAME)?;
        let mut r = Reader::new(data);
        r.u16("server name list").ok()?;
        let name_type = r.u8("name type").ok()?;
        if name_type != 0 {
            return None;
        }
        let len = r.u16("host name length").ok()? as usize;
        let name = r.take(len, "host name").ok()?;
        String::from_utf8(name.to_vec()).ok()
    }

    /// supported_groups list, GREASE included.
    pub fn supported_groups(&self) -> Vec<u16> {
        self.u16_vector(EXT_SUPPORTED_GROUPS)
    }

    /// signature_algorithms list.
    pub fn signature_algorithms(&self) -> Vec<u16> {
        self.u16_vector(EXT_SIGNATURE_ALGORITHMS)
    }

    /// supported_versions list, GREASE included.
    pub fn supported_versions(&self) -> Vec<u16> {
        let Some(data) = self.extension(EXT_SUPPORTED_VERSIONS) else {
            return Vec::new();
        };
        let mut r = Reader::new(data);
        let Ok(len) = r.u8("versions length") else {
            return Vec::new();
        };
        r.u16_list(len as usize, "versions").unwrap_or_default()
    }

    /// compress_certificate algorithms.
    pub fn cert_compression_algorithms(&self) -> Vec<u16> {
        let Some(data) = self.extension(EXT_COMPRESS_CERTIFICATE) else {
            return Vec::new();
        };
        let mut r = Reader::new(data);
        let Ok(len) = r.u8("algorithms length") else {
            return Vec::new();
        };
        r.u16_list(len as usize, "algorithms").unwrap_or_default()
    }

    /// ec_point_formats list.
    pub fn ec_point_formats(&self) -> Vec<u8> {
        let Some(data) = self.extension(EXT_EC_POINT_FORMATS) else {
            return Vec::new();
        };
        let mut r = Reader::new(data);
        let Ok(len) = r.u8("point formats length") else {
            return Vec::new();
        };
        r.take(len as usize, "point formats")
            .map(<[u8]>::to_vec)
            .unwrap_or_default()
    }

    /// ALPN protocol names in offer order.
    pub fn alpn_protocols(&self) -> Vec<String> {
        let Some(data) = self.extension(EXT_ALPN) else {
            return Vec::new();
        };
        let mut r = Reader::new(data);
        if r.u16("alpn list length").is_err() {
            return Vec::new();
        }
        let mut out = Vec::new();
        while r.remaining() > 0 {
            let Ok(len) = r.u8("protocol length") else { break };
            let Ok(name) = r.take(len as usize, "protocol") else { break };
            out.push(String::from_utf8_lossy(name).into_owned());
        }
        out
    }

    fn u16_vector(&self, code: u16) -> Vec<u16> {
        let Some(data) = self.extension(code) else {
            return Vec::new();
        };
        let mut r = Reader::new(data);
        let Ok(len) = r.u16("list length") else {
            return Vec::new();
        };
        r.u16_list(len as usize, "list").unwrap_or_default()
    }

    /// Canonical JA3 string: `version,ciphers,extensions,curves,point_formats`
    /// with GREASE filtered out.
    pub fn ja3_string(&self) -> String {
        fn dashed<T: ToString>(items: impl Iterator<Item = T>) -> String {
            items.map(|i| i.to_string()).collect::<Vec<_>>().join("-")
        }
        format!(
            "{},{},{},{},{}",
            self.legacy_version,
            dashed(self.cipher_suites.iter().filter(|c| !is_grease(**c))),
            dashed(self.extension_codes().into_iter().filter(|e| !is_grease(*e))),
            dashed(self.supported_groups().into_iter().filter(|g| !is_grease(*g))),
            dashed(self.ec_point_formats().into_iter()),
        )
    }

    /// Serialize the hello with per-connection fields masked.
    ///
    /// Two ClientHellos from the same profile and server name produce equal
    /// shapes. With `canonical_order` the extensions are sorted first, for
    /// profiles that permute them.
    pub fn shape(&self, canonical_order: bool) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.legacy_version.to_be_bytes());
        out.push(self.session_id.len() as u8);
        for cs in &self.cipher_suites {
            out.extend_from_slice(&normalize(*cs).to_be_bytes());
        }
        out.extend_from_slice(&self.compression_methods);

        let mut extensions: Vec<RawExtension> = self
            .extensions
            .iter()
            .map(|e| RawExtension {
                code: normalize(e.code),
                data: mask_extension(e),
            })
            .collect();
        if canonical_order {
            extensions.sort_by(|a, b| a.code.cmp(&b.code).then_with(|| a.data.cmp(&b.data)));
        }
        for ext in extensions {
            out.extend_from_slice(&ext.code.to_be_bytes());
            out.extend_from_slice(&(ext.data.len() as u16).to_be_bytes());
            out.extend_from_slice(&ext.data);
        }
        out
    }
}

fn normalize(value: u16) -> u16 {
    if is_grease(value) {
        GREASE_PLACEHOLDER
    } else {
        value
    }
}

fn normalize_u16s(data: &[u8], skip: usize) -> Vec<u8> {
    let mut out = data[..skip.min(data.len())].to_vec();
    for pair in data[skip.min(data.len())..].chunks(2) {
        match pair {
            [a, b] => out.extend_from_slice(&normalize(u16::from_be_bytes([*a, *b])).to_be_bytes()),
            rest => out.extend_from_slice(rest),
        }
    }
    out
}

fn mask_extension(ext: &RawExtension) -> Vec<u8> {
    match ext.code {
        EXT_SUPPORTED_GROUPS => normalize_u16s(&ext.data, 2),
        EXT_SUPPORTED_VERSIONS => normalize_u16s(&ext.data, 1),
        EXT_KEY_SHARE => mask_key_share(&ext.data),
        EXT_PRE_SHARED_KEY | EXT_ENCRYPTED_CLIENT_HELLO => vec![0; ext.data.len()],
        code if is_grease(code) => vec![0; ext.data.len()],
        _ => ext.data.clone(),
    }
}

/// Keep group ids and key lengths, zero the key material.
fn mask_key_share(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut r = Reader::new(data);
    let Ok(list_len) = r.u16("key share list") else {
        return vec![0; data.len()];
    };
    out.extend_from_slice(&list_len.to_be_bytes());
    while r.remaining() > 0 {
        let (Ok(group), Ok(len)) = (r.u16("group"), r.u16("key length")) else {
            break;
        };
        if r.take(len as usize, "key").is_err() {
            break;
        }
        out.extend_from_slice(&normalize(group).to_be_bytes());
        out.extend_from_slice(&len.to_be_bytes());
        out.extend(std::iter::repeat(0u8).take(len as usize));
    }
    out
}

impl TlsFingerprint {
    /// Differences between a captured ClientHello and this fingerprint.
    ///
    /// An empty result means the hello carries the profile's version list,
    /// cipher order, groups, signature schemes, ALPN offer, certificate
    /// compression and extension order. Extensions that depend on the
    /// connection (SNI, padding) are ignored when the profile lists them.
    pub fn mismatches(&self, hello: &ClientHello) -> Vec<String> {
        let mut found = Vec::new();
        let grease_prefix: Vec<u16> = if self.grease {
            vec![GREASE_PLACEHOLDER]
        } else {
            Vec::new()
        };

        let mut expected_ciphers = grease_prefix.clone();
        expected_ciphers.extend(self.cipher_suites.iter().map(|c| c.id));
        let ciphers: Vec<u16> = hello.cipher_suites.iter().map(|c| normalize(*c)).collect();
        if ciphers != expected_ciphers {
            found.push(format!("cipher suites {ciphers:04x?}, expected {expected_ciphers:04x?}"));
        }

        let expected_versions: Vec<u16> = self.versions.iter().map(|v| v.code()).collect();
        let versions: Vec<u16> = hello
            .supported_versions()
            .into_iter()
            .map(normalize)
            .collect();
        if versions != expected_versions {
            found.push(format!(
                "supported versions {versions:04x?}, expected {expected_versions:04x?}"
            ));
        }

        let mut expected_groups = grease_prefix;
        expected_groups.extend(self.curves.iter().map(|c| c.id));
        let groups: Vec<u16> = hello.supported_groups().into_iter().map(normalize).collect();
        if groups != expected_groups {
            found.push(format!("supported groups {groups:04x?}, expected {expected_groups:04x?}"));
        }

        let expected_sigalgs: Vec<u16> = self.sigalgs.iter().map(|s| s.id).collect();
        let sigalgs: Vec<u16> = hello
            .signature_algorithms()
            .into_iter()
            .filter(|s| !is_grease(*s))
            .collect();
        if sigalgs != expected_sigalgs {
            found.push(format!(
                "signature algorithms {sigalgs:04x?}, expected {expected_sigalgs:04x?}"
            ));
        }

        let alpn = hello.alpn_protocols();
        if alpn.iter().map(String::as_str).ne(self.alpn.iter().copied()) {
            found.push(format!("alpn {alpn:?}, expected {:?}", self.alpn));
        }

        let expected_compression: Vec<u16> =
            self.cert_compression.iter().map(|c| c.code()).collect();
        let compression = hello.cert_compression_algorithms();
        if compression != expected_compression {
            found.push(format!(
                "certificate compression {compression:?}, expected {expected_compression:?}"
            ));
        }

        let conditional: Vec<u16> = self
            .extensions
            .iter()
            .filter(|e| e.is_conditional())
            .map(Extension::code)
            .collect();
        let mut expected_ext: Vec<u16> = self
            .extensions
            .iter()
            .filter(|e| !e.is_conditional())
            .map(Extension::code)
            .collect();
        let mut ext: Vec<u16> = hello
            .extension_codes()
            .into_iter()
            .map(normalize)
            .filter(|c| !conditional.contains(c))
            .collect();
        if self.permute_extensions {
            expected_ext.sort_unstable();
            ext.sort_unstable();
        }
        if ext != expected_ext {
            found.push(format!("extensions {ext:?}, expected {expected_ext:?}"));
        }

        found
    }
}
