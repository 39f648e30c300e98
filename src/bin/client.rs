//! Client binary: send one message, print the reply.

use canned_reply::client;
use canned_reply::config::ClientConfig;
use canned_reply::logging;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::load()?;
    logging::init(&config.log_level);

    info!(server = %config.connect, message = %config.message, "Starting client");

    let reply = client::exchange(config.connect, config.message.as_bytes()).await?;
    println!(
        "Received data from server: {}",
        String::from_utf8_lossy(&reply)
    );

    Ok(())
}
