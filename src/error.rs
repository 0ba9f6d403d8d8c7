//! Error types for the wflang language client.
//!
//! This module defines all error types used throughout the client,
//! organized by subsystem: session (LSP), log path provisioning, document
//! selectors and the lifecycle controller.

use std::path::PathBuf;

use thiserror::Error;

use crate::lsp::session::SessionState;

/// Errors related to the language server session.
#[derive(Debug, Error)]
pub enum LspError {
    /// The language server process failed to start.
    #[error("failed to start language server: {0}")]
    ServerStartFailed(String),

    /// The language server process exited unexpectedly.
    #[error("language server exited unexpectedly: {0}")]
    ServerExited(String),

    /// Failed to initialize the language server.
    #[error("language server initialization failed: {0}")]
    InitializationFailed(String),

    /// A request to the language server timed out.
    #[error("language server request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The operation needs a running session.
    #[error("session is not running (state: {0})")]
    NotRunning(SessionState),

    /// Failed to send a request or notification to the language server.
    #[error("failed to send request to language server: {0}")]
    RequestFailed(String),

    /// Document not found or not open.
    #[error("document not found: {0}")]
    DocumentNotFound(String),
}

/// Errors raised while provisioning the server's log directory.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The directory (or one of its ancestors) could not be created.
    #[error("failed to create log directory '{}': {source}", .path.display())]
    CreateDirectory {
        /// The directory that was being created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The directory exists but the current user cannot write to it.
    #[error("log directory '{}' is not writable: {source}", .path.display())]
    NotWritable {
        /// The directory that was checked.
        path: PathBuf,
        /// Why access was refused.
        #[source]
        source: std::io::Error,
    },

    /// Something other than a directory occupies the log directory path.
    #[error("log directory path '{}' exists but is not a directory", .0.display())]
    NotADirectory(PathBuf),
}

/// Errors raised while building a document selector.
#[derive(Debug, Error)]
pub enum SelectorError {
    /// The glob pattern failed to compile.
    #[error("invalid selector pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// The underlying glob error.
        #[source]
        source: globset::Error,
    },

    /// The pattern would match every file regardless of language.
    #[error("selector pattern '{0}' matches arbitrary files")]
    CatchAllPattern(String),

    /// A required selector field was empty.
    #[error("selector field '{0}' must not be empty")]
    EmptyField(&'static str),
}

/// Errors surfaced by the lifecycle controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// `activate` was called while a session is still live.
    #[error("a session is already active (state: {0})")]
    AlreadyActive(SessionState),

    /// The session failed to start or stop.
    #[error("session error: {0}")]
    Session(#[from] LspError),
}

/// A unified error type for the entire client.
#[derive(Debug, Error)]
pub enum Error {
    /// Session-related error.
    #[error("LSP error: {0}")]
    Lsp(#[from] LspError),

    /// Log path provisioning error.
    #[error("provisioning error: {0}")]
    Provision(#[from] ProvisionError),

    /// Document selector error.
    #[error("selector error: {0}")]
    Selector(#[from] SelectorError),

    /// Lifecycle controller error.
    #[error("controller error: {0}")]
    Controller(#[from] ControllerError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for wflang-client operations.
pub type Result<T> = std::result::Result<T, Error>;
