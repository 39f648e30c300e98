//! canned-reply: a one-shot TCP client/server pair
//!
//! The server accepts connections and answers each one, in its own task,
//! with a fixed response after a single read. The client connects, sends one
//! message, prints the single reply it reads, and exits.
//!
//! Features:
//! - Two response variants (HTTP-looking or plain greeting)
//! - Graceful shutdown on SIGINT/SIGTERM that drains in-flight handlers
//! - Configuration via CLI arguments or TOML file

pub mod client;
pub mod config;
pub mod handler;
pub mod logging;
pub mod response;
pub mod server;
