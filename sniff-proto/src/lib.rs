//! Passive hostname discovery for the first bytes of a TCP connection: the
//! SNI of a TLS ClientHello, or the `Host` header of a plaintext HTTP request.

pub mod config;
pub mod extract;
pub mod http;
pub mod tls;

pub use extract::{extract, Hostname};
pub use tls::DecodeError;
