//! TCP server answering every connection with a fixed response.
//!
//! Binds the listening socket, accepts connections, and hands each one to
//! its own task running the connection handler. The accept loop races
//! `accept()` against a shutdown future, so a pending accept is abandoned
//! as soon as shutdown is requested. Handlers already running are left to
//! finish before `run` returns.

use crate::config::Config;
use crate::handler::{handle_connection, HandlerError, HandlerOutcome};
use bytes::Bytes;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Server setup errors. All of these are fatal.
#[derive(Debug)]
pub enum ServerError {
    Socket(io::Error),
    Bind(SocketAddr, io::Error),
    Listen(io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Socket(e) => write!(f, "Error creating socket: {}", e),
            ServerError::Bind(addr, e) => write!(f, "Error binding socket to {}: {}", addr, e),
            ServerError::Listen(e) => write!(f, "Error listening: {}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Socket(e) | ServerError::Bind(_, e) | ServerError::Listen(e) => Some(e),
        }
    }
}

/// Counters reported when the server stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub accepted: u64,
    pub replied: u64,
    pub no_data: u64,
    pub handler_failures: u64,
    pub accept_errors: u64,
}

impl ServerStats {
    fn record(&mut self, joined: Result<Result<HandlerOutcome, HandlerError>, JoinError>) {
        match joined {
            Ok(Ok(HandlerOutcome::Replied { .. })) => self.replied += 1,
            Ok(Ok(HandlerOutcome::NoData)) => self.no_data += 1,
            // Already logged by the task itself
            Ok(Err(_)) => self.handler_failures += 1,
            Err(e) => {
                error!(error = %e, "Connection handler panicked");
                self.handler_failures += 1;
            }
        }
    }
}

/// Server instance
pub struct Server {
    listener: TcpListener,
    response: Bytes,
}

impl Server {
    /// Create the listening socket and start listening.
    pub async fn bind(config: &Config) -> Result<Self, ServerError> {
        let listener = bind_listener(config.listen, config.backlog)?;
        let listener = TcpListener::from_std(listener).map_err(ServerError::Socket)?;

        info!(
            address = %config.listen,
            backlog = config.backlog,
            response = ?config.response,
            "Server listening"
        );

        Ok(Server {
            listener,
            response: config.response.payload(),
        })
    }

    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves, then close the listener
    /// and wait for in-flight handlers.
    pub async fn run<F>(self, shutdown: F) -> ServerStats
    where
        F: Future<Output = ()>,
    {
        let Server { listener, response } = self;
        let mut handlers = JoinSet::new();
        let mut stats = ServerStats::default();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }

                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    stats.record(joined);
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!(peer = %peer, "Connection accepted");
                        stats.accepted += 1;

                        let response = response.clone();
                        handlers.spawn(async move {
                            let result = handle_connection(stream, response).await;
                            if let Err(ref e) = result {
                                warn!(peer = %peer, error = %e, "Connection abandoned");
                            }
                            result
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        stats.accept_errors += 1;
                    }
                },
            }
        }

        drop(listener);

        if !handlers.is_empty() {
            info!(in_flight = handlers.len(), "Waiting for in-flight handlers");
        }
        while let Some(joined) = handlers.join_next().await {
            stats.record(joined);
        }

        info!(
            accepted = stats.accepted,
            replied = stats.replied,
            no_data = stats.no_data,
            handler_failures = stats.handler_failures,
            accept_errors = stats.accept_errors,
            "Server shutting down gracefully"
        );

        stats
    }
}

/// Create a listening socket with `SO_REUSEADDR` and an explicit backlog.
pub fn bind_listener(addr: SocketAddr, backlog: i32) -> Result<std::net::TcpListener, ServerError> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )
    .map_err(ServerError::Socket)?;

    socket.set_reuse_address(true).map_err(ServerError::Socket)?;
    socket.set_nonblocking(true).map_err(ServerError::Socket)?;
    socket
        .bind(&addr.into())
        .map_err(|e| ServerError::Bind(addr, e))?;
    socket.listen(backlog).map_err(ServerError::Listen)?;

    Ok(socket.into())
}

/// Resolve once `SIGINT` (Ctrl+C) or `SIGTERM` arrives.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
}

/// The machine's hostname and the first IPv4 address it resolves to.
pub async fn host_address() -> io::Result<(String, Option<IpAddr>)> {
    let hostname = hostname()?;
    let address = tokio::net::lookup_host((hostname.as_str(), 0))
        .await?
        .map(|addr| addr.ip())
        .find(IpAddr::is_ipv4);
    Ok((hostname, address))
}

/// Log the host address. Lookup failures are not fatal.
pub async fn log_host_address() {
    match host_address().await {
        Ok((hostname, Some(ip))) => info!(hostname = %hostname, ip = %ip, "Server IP address"),
        Ok((hostname, None)) => debug!(hostname = %hostname, "Hostname has no IPv4 address"),
        Err(e) => debug!(error = %e, "Could not determine server IP address"),
    }
}

fn hostname() -> io::Result<String> {
    let mut buf = [0u8; 256];
    // SAFETY: the pointer and length describe `buf`, which outlives the call.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
}
