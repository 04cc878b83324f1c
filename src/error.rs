//! Error types for mimic crate.

use std::fmt;
use std::io;
use std::time::Duration;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error taxonomy.
///
/// Lets a caller tell "peer unreachable" apart from "fingerprint or identity
/// rejected" apart from "session died mid-flight" without matching on every
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Address unreachable, refused, or resolution failure.
    Connect,
    /// TLS handshake rejected: alert, protocol mismatch, certificate or name.
    Handshake,
    /// I/O failure on an established session.
    Transport,
    /// Local misconfiguration (bad URL, unknown profile, unreadable CA file).
    Config,
}

/// Which exchange triggered an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `POST {base}/send`
    Submit,
    /// `GET {base}/recv`
    Retrieve,
}

impl Operation {
    /// Short verb used in CLI output ("send", "recv").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => "send",
            Self::Retrieve => "recv",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while dialing or exchanging.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Raw connection could not be established.
    #[error("Connection error: {0}")]
    Connect(String),

    /// Raw connect + handshake exceeded its deadline.
    #[error("Connect timeout after {0:?}")]
    ConnectTimeout(Duration),

    /// Address is not of the form host:port.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// TLS handshake failed.
    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    /// Captured bytes are not a well-formed ClientHello.
    #[error("Malformed ClientHello: {0}")]
    MalformedHello(String),

    /// TLS context could not be built from the profile.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Established session failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request did not complete within its deadline.
    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),

    /// Unknown fingerprint profile name.
    #[error("Unknown fingerprint profile: {0}")]
    UnknownProfile(String),

    /// URL parsing error.
    #[error("URL parse error: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Header value could not be encoded.
    #[error("Invalid header value for {name}: {message}")]
    InvalidHeader { name: &'static str, message: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A lower-layer error tagged with the exchange that triggered it.
    #[error("{op} failed: {source}")]
    Exchange {
        op: Operation,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a connection error.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect(message.into())
    }

    /// Create a handshake error.
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake(message.into())
    }

    /// Create a TLS setup error.
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Tag this error with the exchange that produced it.
    pub fn during(self, op: Operation) -> Self {
        Self::Exchange {
            op,
            source: Box::new(self),
        }
    }

    /// Taxonomy of this error, looking through exchange tags.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect(_) | Self::ConnectTimeout(_) | Self::InvalidAddress(_) => {
                ErrorKind::Connect
            }
            Self::Handshake(_) | Self::Tls(_) => ErrorKind::Handshake,
            Self::Transport(_) | Self::RequestTimeout(_) => ErrorKind::Transport,
            Self::UnknownProfile(_)
            | Self::MalformedHello(_)
            | Self::InvalidUrl(_)
            | Self::InvalidHeader { .. }
            | Self::Config(_)
            | Self::Io(_) => ErrorKind::Config,
            Self::Exchange { source, .. } => source.kind(),
        }
    }

    /// The exchange this error was raised from, if tagged.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Exchange { op, .. } => Some(*op),
            _ => None,
        }
    }
}
