//! `turtlelink-adapter` – the robot link orchestrator.
//!
//! [`RobotLinkAdapter`] owns one bridge connection, one telemetry channel,
//! and one command channel; it applies the frame transform to every inbound
//! pose record and exposes current status, current pose (native and
//! normalized), a command-send operation, and a broadcast notification
//! surface for any renderer. The adapter does not know how its data is
//! displayed.
//!
//! # Modules
//!
//! - [`adapter`] – the orchestrator itself.
//! - [`config`] – TOML-backed [`LinkConfig`] with panel defaults.
//! - [`logging`] – `tracing` subscriber initialisation for host processes.
//!
//! # Example
//!
//! ```rust,no_run
//! use turtlelink_adapter::{LinkConfig, RobotLinkAdapter};
//!
//! #[tokio::main]
//! async fn main() {
//!     turtlelink_adapter::logging::init_tracing();
//!     let adapter = RobotLinkAdapter::new();
//!     adapter
//!         .start_with_config(&LinkConfig::default())
//!         .expect("invalid link configuration");
//!     // ... hand `adapter` to the renderer, then on shutdown:
//!     adapter.stop();
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod logging;

pub use adapter::RobotLinkAdapter;
pub use config::LinkConfig;
