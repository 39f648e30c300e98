//! One-shot TCP client.
//!
//! Connects, sends one message, reads the reply once, and hands it back.
//! There are no retries: any failure ends the exchange.

use crate::handler::BUFFER_SIZE;
use bytes::{Bytes, BytesMut};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Client failures. Every one of them is fatal for the exchange.
#[derive(Debug)]
pub enum ClientError {
    Connect(SocketAddr, io::Error),
    Send(io::Error),
    Receive(io::Error),
    /// The server closed the connection without replying.
    NoResponse,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Connect(addr, e) => {
                write!(f, "Error connecting to server {}: {}", addr, e)
            }
            ClientError::Send(e) => write!(f, "Error sending data to server: {}", e),
            ClientError::Receive(e) => write!(f, "Error receiving data from server: {}", e),
            ClientError::NoResponse => {
                write!(f, "Error receiving data from server: connection closed")
            }
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Connect(_, e) | ClientError::Send(e) | ClientError::Receive(e) => Some(e),
            ClientError::NoResponse => None,
        }
    }
}

/// Send `message` to `addr` and return whatever one read brings back.
pub async fn exchange(addr: SocketAddr, message: &[u8]) -> Result<Bytes, ClientError> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|e| ClientError::Connect(addr, e))?;
    info!(server = %addr, "Connected to server");

    stream.write_all(message).await.map_err(ClientError::Send)?;
    debug!(bytes = message.len(), "Sent data to server");

    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);
    let n = stream
        .read_buf(&mut buffer)
        .await
        .map_err(ClientError::Receive)?;
    if n == 0 {
        return Err(ClientError::NoResponse);
    }
    debug!(bytes = n, "Received data from server");

    Ok(buffer.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DEFAULT_MESSAGE};
    use crate::response::{ResponseKind, GREETING_RESPONSE, HTTP_RESPONSE};
    use crate::server::Server;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    async fn with_server<F, Fut>(response: ResponseKind, f: F)
    where
        F: FnOnce(SocketAddr) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let config = Config {
            listen: "127.0.0.1:0".parse().unwrap(),
            response,
            ..Config::default()
        };
        let server = Server::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run(async move {
            let _ = rx.await;
        }));

        f(addr).await;

        tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange_http() {
        with_server(ResponseKind::Http, |addr| async move {
            let reply = exchange(addr, DEFAULT_MESSAGE.as_bytes()).await.unwrap();
            assert_eq!(&reply[..], HTTP_RESPONSE);
        })
        .await;
    }

    #[tokio::test]
    async fn test_exchange_greeting() {
        with_server(ResponseKind::Greeting, |addr| async move {
            let reply = exchange(addr, DEFAULT_MESSAGE.as_bytes()).await.unwrap();
            assert_eq!(&reply[..], GREETING_RESPONSE);
        })
        .await;
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = exchange(addr, b"Hello, Server!").await.unwrap_err();
        assert!(matches!(err, ClientError::Connect(a, _) if a == addr));
    }

    #[tokio::test]
    async fn test_server_closes_without_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 14];
            stream.read_exact(&mut buf).await.unwrap();
            buf.to_vec()
        });

        let err = exchange(addr, b"Hello, Server!").await.unwrap_err();
        assert!(matches!(err, ClientError::NoResponse));
        assert_eq!(peer.await.unwrap(), b"Hello, Server!");
    }
}
