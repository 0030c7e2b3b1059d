/// Hostname extraction entry point: classify the first bytes of a connection
/// as TLS or not, then hand them to the matching decoder.
use crate::http::scan_http_host;
use crate::tls::{decode_client_hello, DecodeError};
use std::fmt;

/// Record content type of a TLS handshake. Any other traffic starting with
/// this byte is misread as TLS.
pub const TLS_HANDSHAKE: u8 = 0x16;

/// A hostname and the protocol it was found in. Displays as a URL prefix,
/// e.g. `https://example.com`. The host text is not normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hostname {
    /// From the server_name extension of a TLS ClientHello.
    Tls(String),
    /// From an HTTP `Host` header.
    Http(String),
}

impl Hostname {
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Tls(_) => "https",
            Self::Http(_) => "http",
        }
    }

    pub fn host(&self) -> &str {
        match self {
            Self::Tls(h) | Self::Http(h) => h,
        }
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme(), self.host())
    }
}

/// Find the hostname a client is asking for in the first chunk it sent.
///
/// Buffers starting with [`TLS_HANDSHAKE`] go to the ClientHello decoder
/// only, and fail if malformed. Everything else is scanned for a `Host`
/// header and never fails.
pub fn extract(buf: &[u8]) -> Result<Option<Hostname>, DecodeError> {
    match buf.first() {
        Some(&TLS_HANDSHAKE) => Ok(decode_client_hello(buf)?.map(Hostname::Tls)),
        _ => Ok(scan_http_host(buf).map(Hostname::Http)),
    }
}
