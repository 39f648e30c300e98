//! Per-connection handler.
//!
//! One exchange per connection: a single read of at most `BUFFER_SIZE`
//! bytes, a single write of the fixed response, then close. A read that
//! returns zero bytes means the peer closed without sending anything; the
//! handler closes too and sends nothing.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

/// Read buffer size
pub const BUFFER_SIZE: usize = 1024;

/// How a handled connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The peer sent `received` bytes and `written` bytes of the response went out.
    Replied { received: usize, written: usize },
    /// The peer closed before sending anything.
    NoData,
}

/// Per-connection I/O failure.
#[derive(Debug)]
pub enum HandlerError {
    Read(std::io::Error),
    Write(std::io::Error),
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerError::Read(e) => write!(f, "Error receiving data: {}", e),
            HandlerError::Write(e) => write!(f, "Error sending response: {}", e),
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HandlerError::Read(e) | HandlerError::Write(e) => Some(e),
        }
    }
}

/// Handle a single client connection.
///
/// Closes the write side once the response is out; the stream itself is
/// dropped (and the socket closed) when this returns.
pub async fn handle_connection<S>(
    mut stream: S,
    response: Bytes,
) -> Result<HandlerOutcome, HandlerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = [0u8; BUFFER_SIZE];

    let received = stream.read(&mut buffer).await.map_err(HandlerError::Read)?;
    if received == 0 {
        debug!("Connection closed by client before sending data");
        return Ok(HandlerOutcome::NoData);
    }

    trace!(
        bytes = received,
        request = %String::from_utf8_lossy(&buffer[..received]),
        "Received request"
    );

    // One write, no retry on a short count.
    let written = stream.write(&response).await.map_err(HandlerError::Write)?;
    if written < response.len() {
        warn!(written, expected = response.len(), "Short write, response truncated");
    }

    if let Err(e) = stream.shutdown().await {
        trace!(error = %e, "Shutdown after reply failed");
    }

    Ok(HandlerOutcome::Replied { received, written })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{ResponseKind, GREETING_RESPONSE, HTTP_RESPONSE};
    use std::io;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_replies_with_fixed_response() {
        let mock = Builder::new()
            .read(b"Hello, Server!")
            .write(HTTP_RESPONSE)
            .build();

        let outcome = handle_connection(mock, ResponseKind::Http.payload())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            HandlerOutcome::Replied {
                received: 14,
                written: HTTP_RESPONSE.len()
            }
        );
    }

    #[tokio::test]
    async fn test_reply_ignores_request_content() {
        let mock = Builder::new()
            .read(b"\x00\xffGET / HTTP/1.0\r\n\r\n")
            .write(GREETING_RESPONSE)
            .build();

        let outcome = handle_connection(mock, ResponseKind::Greeting.payload())
            .await
            .unwrap();
        assert!(matches!(outcome, HandlerOutcome::Replied { .. }));
    }

    #[tokio::test]
    async fn test_no_data_closes_without_reply() {
        // No scripted write: any write would fail the mock.
        let mock = Builder::new().build();

        let outcome = handle_connection(mock, ResponseKind::Http.payload())
            .await
            .unwrap();
        assert_eq!(outcome, HandlerOutcome::NoData);
    }

    #[tokio::test]
    async fn test_read_error() {
        let mock = Builder::new()
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let err = handle_connection(mock, ResponseKind::Http.payload())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Read(_)));
    }

    #[tokio::test]
    async fn test_write_error() {
        let mock = Builder::new()
            .read(b"Hello, Server!")
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"))
            .build();

        let err = handle_connection(mock, ResponseKind::Http.payload())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Write(_)));
        assert!(err.to_string().starts_with("Error sending response"));
    }

    #[tokio::test]
    async fn test_short_write_is_not_retried() {
        // The peer takes only four bytes; a retry would show up as an
        // unexpected second write.
        let mock = Builder::new().read(b"hi").write(b"HTTP").build();

        let outcome = handle_connection(mock, ResponseKind::Http.payload())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            HandlerOutcome::Replied {
                received: 2,
                written: 4
            }
        );
    }

    #[tokio::test]
    async fn test_full_buffer_request() {
        let request = vec![b'x'; BUFFER_SIZE];
        let mock = Builder::new()
            .read(&request)
            .write(HTTP_RESPONSE)
            .build();

        let outcome = handle_connection(mock, ResponseKind::Http.payload())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            HandlerOutcome::Replied {
                received: BUFFER_SIZE,
                written: HTTP_RESPONSE.len()
            }
        );
    }
}
