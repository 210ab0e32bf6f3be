//! Local IPC for launch handoff.
//!
//! A secondary instance passes its normalized arguments to the primary over a
//! loopback TCP connection whose port the primary publishes in a per-user
//! endpoint file. Only a process that can read that file learns the
//! per-run token the server requires before it accepts a launch.
//!
//! # Architecture
//!
//! - **Server**: Runs on the primary instance, accepts one launch per connection
//! - **Client**: Runs on a secondary instance, delivers its launch and exits
//! - **Protocol**: Token line, then newline-separated UTF-8 payload, terminated by close
//! - **Endpoint**: Publication and discovery of the server's port and token

pub mod client;
pub mod endpoint;
pub mod protocol;
pub mod server;

pub use client::LaunchClient;
pub use endpoint::{endpoint_path, Endpoint};
pub use server::{LaunchHandler, LaunchServer, LaunchServerHandle};
