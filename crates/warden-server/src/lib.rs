//! # warden-server
//!
//! TCP ingest server for warden camera fleets.
//!
//! This crate provides the server that camera hosts connect to for run
//! setup, image upload, and liveness reporting. Everything a host sends
//! is persisted under a per-host run directory, announced to the
//! presentation layer through an event channel, and offered to a
//! cooldown-gated alert dispatcher.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   TCP frames   ┌───────────────────────┐
//! │ camera host  │───────────────►│      IngestServer     │
//! └──────────────┘                │                       │
//!                                 │    ┌─────────────┐    │   events
//! ┌──────────────┐                │    │ HostSession │    │──────────►
//! │ camera host  │───────────────►│    └─────────────┘    │  dashboard
//! └──────────────┘                │       │         │     │
//!                                 │       ▼         ▼     │
//!                                 │  RunStore   Dispatcher│
//!                                 └───────────────────────┘
//! ```
//!
//! Each connection is handled by its own task. A session owns its run
//! store and alert gate outright, so nothing here is shared or locked
//! across hosts.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//! use warden_server::{IngestServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let addr: SocketAddr = "0.0.0.0:8888".parse().unwrap();
//!     let config = ServerConfig::new(addr, "saved_images")
//!         .with_alert_classes(vec!["lion".to_string()]);
//!
//!     let (mut server, mut events) = IngestServer::new(config).unwrap();
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             println!("{event:?}");
//!         }
//!     });
//!     server.serve().await.unwrap();
//! }
//! ```
//!
//! ## Message Protocol
//!
//! Hosts speak length-prefixed frames (see `warden-proto`). A session
//! starts with a handshake:
//!
//! - **CONFIG**: opens the handshake
//! - **HOSTNAME** / **CONTINUE_RUN** / **CLASSES**: fields, any order
//! - **DONE**: closes the handshake and activates the session
//!
//! then alternates between:
//!
//! - **IMAGE**: detection boxes plus raw image bytes
//! - **CONNECTION**: a liveness timestamp from the host's clock
//!
//! Anything else is a protocol error that closes the connection.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod server;
pub mod session;

// Re-export main types
pub use config::{
    NotificationConfig, ServerConfig, DEFAULT_BIND_PORT, DEFAULT_COOLDOWN_SECS,
    DEFAULT_RECORD_ROOT,
};
pub use error::{ServerError, ServerResult};
pub use server::{IngestServer, ShutdownHandle};
pub use session::{Handshake, HostSession, RunMode, SessionSettings};
