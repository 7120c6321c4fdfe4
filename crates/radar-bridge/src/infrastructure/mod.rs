//! Infrastructure layer for radar-bridge.
//!
//! The infrastructure layer handles all I/O: serial enumeration and links,
//! timers, the TOML file, and the HTTP listener for sessions and status requests.
//!
//! # Responsibilities
//!
//! - Enumerating serial endpoints and choosing the radar ([`discovery`])
//! - Owning the open serial link and its reader task ([`link`])
//! - Polling for endpoint changes ([`monitor`])
//! - Running the connection state machine against real I/O ([`supervisor`])
//! - Loading the optional configuration file ([`config_file`])
//! - Serving WebSocket sessions, `/health` and `/reconnect` ([`ws_server`])
//!
//! # What does NOT belong here?
//!
//! - Lifecycle decisions (that is the application layer's state machine)
//! - Message type definitions (that is the domain layer)

pub mod config_file;
pub mod discovery;
pub mod link;
pub mod monitor;
pub mod supervisor;
pub mod ws_server;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use config_file::{ConfigError, FileConfig};
pub use discovery::{PortDiscovery, PortEnumerator, SystemPortEnumerator};
pub use link::{EndpointClaims, LinkOpener, SerialLinkOpener};
pub use supervisor::{Supervisor, SupervisorHandle};
pub use ws_server::{router, run_server, serve};
