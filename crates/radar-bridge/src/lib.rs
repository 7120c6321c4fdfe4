//! radar-bridge library crate.
//!
//! This crate bridges one serial-attached radar to any number of WebSocket
//! client sessions.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Clients (JSON over WebSocket)
//!         ↕
//! [radar-bridge]
//!   ├── domain/           Pure types: JSON events, BridgeConfig, DeviceStatus
//!   ├── application/      Connection state machine, session gateway
//!   └── infrastructure/
//!         ├── discovery/  Serial endpoint enumeration + selection
//!         ├── link/       The single open serial link and its reader task
//!         ├── monitor/    Endpoint-set polling
//!         ├── supervisor/ Task that owns the state machine and the link
//!         ├── config_file/ TOML configuration
//!         └── ws_server/  axum router: WebSocket sessions, /health, /reconnect
//!         ↕
//! Radar firmware (text lines over serial)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `radar-core`; it reaches the
//!   device only through the [`application::DeviceControl`] trait.
//! - `infrastructure` depends on all other layers plus `tokio`,
//!   `tokio-serial` and `axum`.

/// Domain layer: pure types (no I/O).
pub mod domain;

/// Application layer: connection lifecycle and session fan-out.
pub mod application;

/// Infrastructure layer: serial port, supervisor task, WebSocket server.
pub mod infrastructure;
