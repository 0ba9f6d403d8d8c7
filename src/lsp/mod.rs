//! Language client module.
//!
//! Everything needed to bring the wflang language server up and down:
//!
//! - `provision`: makes sure the server's log directory exists
//! - `selector`: which documents the server sees
//! - `transport`: how the server process is launched
//! - `trace`: the post-start `$/setTrace` override
//! - `session`: the session traits and lifecycle states
//! - `client`: the process-backed session built on async-lsp
//! - `controller`: activate/deactivate entry points
//!
//! # Usage
//!
//! ```ignore
//! use wflang_client::config::{ClientConfig, ControllerOptions};
//! use wflang_client::lsp::LifecycleController;
//!
//! let mut controller = LifecycleController::new(ClientConfig::default(), ControllerOptions::wflang()?);
//! controller.activate().await?;
//! controller.deactivate().await?;
//! ```

pub mod client;
pub mod controller;
pub mod provision;
pub mod selector;
pub mod session;
pub mod trace;
pub mod transport;
pub mod types;

use crate::error::LspError;

/// Result type for LSP operations.
pub type LspResult<T> = std::result::Result<T, LspError>;

pub use client::{ClientSession, ProcessLauncher};
pub use controller::{Activation, LifecycleController};
pub use provision::ensure_log_directory;
pub use selector::DocumentSelector;
pub use session::{Session, SessionConfig, SessionLauncher, SessionState};
pub use trace::{TraceNegotiator, force_verbose_trace};
pub use transport::{Executable, LaunchMode, TransportKind, TransportProfile};

pub use lsp_types::{TraceValue, Url};
