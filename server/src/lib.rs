//! # Master Server Library
//!
//! This library implements a master server for the game's server browser.
//! Game servers register with it, clients ask it for the list of servers
//! to show, and administrators can ban abusive addresses remotely.
//!
//! ## Core Responsibilities
//!
//! ### Server Registration
//! A game server first asks for a challenge, then sends a heartbeat that
//! echoes it together with an infostring describing the server. Only
//! servers that answer their challenge are listed, which keeps spoofed
//! source addresses out of the registry. Heartbeats must be repeated
//! before the server timeout or the entry is swept.
//!
//! ### Server Listing
//! Clients send a query carrying their gamedir, NAT mode and optionally a
//! protocol version. The reply lists every matching server in compact
//! binary form. NAT-bypass servers in the list are told the client's
//! address so they can punch through to it. Clients older than the
//! configured minimum get a set of fake servers spelling out an upgrade
//! notice instead.
//!
//! ### Abuse Prevention
//! - A per-IP quota caps how many servers one address may register
//! - Sources sending more packets than the rate limit are banned for a while
//! - Admins can ban and unban addresses with authenticated commands
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! One task owns every table. Each datagram is parsed, applied and answered
//! before the next one is read, so no locking is needed anywhere.
//!
//! ### Socket-Free Core
//! The [`dispatcher`] turns a datagram into a list of datagrams to send and
//! never performs I/O itself. The [`network`] module is the only code that
//! touches sockets, which keeps the protocol logic testable without them.
//!
//! ## Module Organization
//!
//! - `timer`: monotonic timers and the `Expirable` wrapper behind every expiry
//! - `config`: JSON configuration with defaults and validation
//! - `server_entry`: per-server state updated from heartbeats
//! - `registry`: registered servers, per-IP counts and challenges
//! - `query`: filtering the registry into a server list
//! - `admin`: keyed-hash authentication and ban commands
//! - `dispatcher`: header matching, rate limiting and request handlers
//! - `network`: UDP sockets and the event loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use master_server::config::Config;
//! use master_server::network::MasterServer;
//! use std::net::Ipv4Addr;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = Config::default();
//!     let mut server = MasterServer::bind(27010, Some(Ipv4Addr::UNSPECIFIED), None, config).await?;
//!
//!     // Runs until SIGINT or SIGTERM
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod config;
pub mod dispatcher;
pub mod network;
pub mod query;
pub mod registry;
pub mod server_entry;
pub mod timer;
