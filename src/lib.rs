//! wflang language client
//!
//! Connects an editor host to the out-of-process wflang language server.
//! The server is an opaque executable that takes a log file path as its
//! only argument and speaks the Language Server Protocol over stdio.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  activate/deactivate  ┌──────────────────────┐
//! │   Editor host   │──────────────────────►│ LifecycleController  │
//! └─────────────────┘                       └──────────┬───────────┘
//!                                                      │ owns
//!                                            ┌─────────▼─────────┐
//!                                            │   ClientSession   │
//!                                            └─────────┬─────────┘
//!                                                      │ JSON-RPC over stdio
//!                                            ┌─────────▼─────────┐
//!                                            │  wflang server    │
//!                                            │ (writes log file) │
//!                                            └───────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`error`] - Error types for the entire client
//! - [`config`] - Client configuration and controller options
//! - [`lsp`] - Provisioning, selectors, transport, sessions and the controller
//!
//! # Example
//!
//! ```ignore
//! use wflang_client::config::{ClientConfig, ControllerOptions};
//! use wflang_client::lsp::LifecycleController;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::builder()
//!         .server_path("bin/wflang")
//!         .log_path("./logs/server.log")
//!         .build();
//!     let mut controller = LifecycleController::new(config, ControllerOptions::wflang()?);
//!
//!     controller.activate().await?;
//!     tokio::signal::ctrl_c().await?;
//!     controller.deactivate().await?;
//!
//!     Ok(())
//! }
//! ```

// Enforce documentation and other quality attributes
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are too strict
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod error;
pub mod lsp;

// Re-export commonly used types at the crate root
pub use config::{ClientConfig, ControllerOptions};
pub use error::{Error, Result};
pub use lsp::{Activation, LifecycleController, SessionState};
