//! Browser fingerprint profiles.
//!
//! The registry is a read-only `static` table: profiles are plain values,
//! looked up by name once per dialer and shared freely afterwards.

use super::http2::Http2Settings;
use super::tls::{
    CertCompression, TlsFingerprint, CHROME_106_EXTENSIONS, CHROME_120_EXTENSIONS,
    CHROME_CIPHER_SUITES, CHROME_CURVES, CHROME_SIGNATURE_ALGORITHMS, CHROME_VERSIONS,
};
use crate::error::{Error, Result};

/// Name resolved when no profile is requested.
pub const DEFAULT_PROFILE: &str = "chrome_auto";

/// Browser fingerprint profile for impersonation.
#[derive(Debug)]
pub struct FingerprintProfile {
    /// Registry name.
    pub name: &'static str,
    /// Alternative names resolving to this profile.
    pub aliases: &'static [&'static str],
    /// TLS ClientHello shape.
    pub tls: TlsFingerprint,
    /// HTTP/2 connection settings.
    pub http2: Http2Settings,
    /// User-Agent sent with every request.
    pub user_agent: &'static str,
}

/// Chrome 106 on Linux. Fixed extension order, so every dial produces the
/// same ClientHello up to per-connection randomness.
pub static CHROME_106: FingerprintProfile = FingerprintProfile {
    name: "chrome_106",
    aliases: &["chrome106"],
    tls: TlsFingerprint {
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
    },
    http2: Http2Settings::chrome(),
    user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/106.0.0.0 Safari/537.36",
};

/// Chrome 120 on Linux. Adds ECH GREASE and permutes extensions per
/// connection like the real browser does since 110.
pub static CHROME_120: FingerprintProfile = FingerprintProfile {
    name: "chrome_120",
    aliases: &["chrome120", "chrome_auto", "chrome"],
    tls: TlsFingerprint {
        versions: CHROME_VERSIONS,
        cipher_suites: CHROME_CIPHER_SUITES,
        extensions: CHROME_120_EXTENSIONS,
        curves: CHROME_CURVES,
        sigalgs: CHROME_SIGNATURE_ALGORITHMS,
        alpn: &["h2", "http/1.1"],
        alps: &["h2"],
        cert_compression: &[CertCompression::Brotli],
        grease: true,
        permute_extensions: true,
        ech_grease: true,
    },
    http2: Http2Settings::chrome(),
    user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
};

/// All registered profiles.
pub static PROFILES: &[&FingerprintProfile] = &[&CHROME_106, &CHROME_120];

impl FingerprintProfile {
    /// Look up a profile by name or alias (case-insensitive, `-` and `_`
    /// are interchangeable).
    pub fn lookup(name: &str) -> Result<&'static FingerprintProfile> {
        let wanted = name.trim().to_ascii_lowercase().replace('-', "_");
        PROFILES
            .iter()
            .copied()
            .find(|p| p.name == wanted || p.aliases.contains(&wanted.as_str()))
            .ok_or_else(|| Error::UnknownProfile(name.to_string()))
    }

    /// Profile used when none is requested.
    pub fn default_profile() -> &'static FingerprintProfile {
        &CHROME_120
    }

    /// Names of every registered profile.
    pub fn names() -> impl Iterator<Item = &'static str> {
        PROFILES.iter().map(|p| p.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_alias() {
        assert_eq!(FingerprintProfile::lookup("chrome_106").unwrap().name, "chrome_106");
        assert_eq!(FingerprintProfile::lookup("Chrome-Auto").unwrap().name, "chrome_120");
        assert_eq!(
            FingerprintProfile::lookup(DEFAULT_PROFILE).unwrap().name,
            FingerprintProfile::default_profile().name
        );
    }

    #[test]
    fn test_unknown_profile() {
        let err = FingerprintProfile::lookup("netscape_4").unwrap_err();
        assert!(matches!(err, Error::UnknownProfile(ref n) if n == "netscape_4"));
    }

    #[test]
    fn test_profiles_offer_h2_first() {
        for profile in PROFILES {
            assert_eq!(profile.tls.alpn.first(), Some(&"h2"), "{}", profile.name);
            assert!(profile.user_agent.contains("Chrome/"));
        }
    }

    #[test]
    fn test_names_unique() {
        let mut names: Vec<&str> = FingerprintProfile::names().collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
