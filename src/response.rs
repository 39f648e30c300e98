//! Fixed responses.
//!
//! The server never looks at what the client sent. Every connection that
//! delivers at least one byte gets the same payload back:
//!
//! ```text
//! http:      HTTP/1.1 200 OK\r\nContent-Length: 12\r\n\r\nHello, World!\n
//! greeting:  Hello from server!\n
//! ```
//!
//! The `http` payload is reproduced byte for byte, including its
//! Content-Length header that undercounts the body.

use bytes::Bytes;
use clap::ValueEnum;
use serde::Deserialize;

/// HTTP-looking reply.
pub const HTTP_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 12\r\n\r\nHello, World!\n";

/// Plain text reply.
pub const GREETING_RESPONSE: &[u8] = b"Hello from server!\n";

/// Which fixed response the server sends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// HTTP status line, header and body.
    #[default]
    Http,
    /// Short plain text greeting.
    Greeting,
}

impl ResponseKind {
    /// The payload for this variant.
    pub fn payload(self) -> Bytes {
        match self {
            ResponseKind::Http => Bytes::from_static(HTTP_RESPONSE),
            ResponseKind::Greeting => Bytes::from_static(GREETING_RESPONSE),
        }
    }
}
