//! Server binary.
//!
//! Listens on `0.0.0.0:8080` unless configured otherwise and answers every
//! connection with the configured fixed response until SIGINT or SIGTERM.

use canned_reply::config::Config;
use canned_reply::logging;
use canned_reply::server::{self, Server};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    logging::init(&config.log_level);

    info!(
        listen = %config.listen,
        backlog = config.backlog,
        response = ?config.response,
        "Starting canned-reply server"
    );

    let server = Server::bind(&config).await?;
    server::log_host_address().await;

    server.run(server::shutdown_signal()).await;
    Ok(())
}
