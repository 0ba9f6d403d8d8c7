//! Client configuration.
//!
//! [`ClientConfig`] says where the server lives, where it logs and how the
//! session is initialized. [`ControllerOptions`] selects which optional
//! lifecycle steps the controller runs.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use lsp_types::TraceValue;
use serde_json::{Value, json};

use crate::error::{Error, Result, SelectorError};
use crate::lsp::selector::DocumentSelector;
use crate::lsp::session::SessionConfig;
use crate::lsp::transport::{LaunchMode, TransportProfile};

/// Identifier the client announces to the server.
pub const DEFAULT_CLIENT_ID: &str = "wflsrv";

/// Location of the bundled server binary, relative to the workspace.
pub const DEFAULT_SERVER_PATH: &str = "editors/vscode/extension/server/bin/wflang";

/// Location of the server log file, relative to the workspace.
pub const DEFAULT_LOG_PATH: &str = "editors/vscode/extension/server/logs/server.log";

/// Key of the log level entry in `initializationOptions`.
pub const LOG_LEVEL_OPTION: &str = "LogLevel";

/// Options that switch optional lifecycle steps on or off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Send `$/setTrace` verbose once the session is running.
    pub enable_trace_workaround: bool,
    /// Provision the log directory before launching, aborting on failure.
    pub validate_log_path: bool,
    /// Documents the server is associated with.
    pub selector: DocumentSelector,
}

impl ControllerOptions {
    /// Options with every step enabled for `selector`.
    pub fn new(selector: DocumentSelector) -> Self {
        Self {
            enable_trace_workaround: true,
            validate_log_path: true,
            selector,
        }
    }

    /// Options for wflang sources.
    /// ## Errors
    /// `SelectorError` if the wflang selector cannot be built.
    pub fn wflang() -> std::result::Result<Self, SelectorError> {
        DocumentSelector::wflang().map(Self::new)
    }

    /// Enables or disables the trace override.
    #[must_use]
    pub fn trace_workaround(mut self, enabled: bool) -> Self {
        self.enable_trace_workaround = enabled;
        self
    }

    /// Enables or disables log directory provisioning.
    #[must_use]
    pub fn validate_log_path(mut self, enabled: bool) -> Self {
        self.validate_log_path = enabled;
        self
    }
}

/// Configuration of the server process and its session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Identifier announced in `clientInfo`.
    pub client_id: String,
    /// Path of the server binary.
    pub server_path: PathBuf,
    /// Path of the server's log file.
    pub log_path: PathBuf,
    /// Root directory of the workspace.
    pub workspace_root: PathBuf,
    /// Which launch profile to use.
    pub launch_mode: LaunchMode,
    /// Sent as `initializationOptions`.
    pub initialization_options: Value,
    /// Trace preference sent in `initialize`.
    pub trace: TraceValue,
    /// Timeout for initialization.
    pub init_timeout: Duration,
    /// Grace period for shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            server_path: PathBuf::from(DEFAULT_SERVER_PATH),
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            workspace_root: PathBuf::from("."),
            launch_mode: LaunchMode::Run,
            initialization_options: json!({ LOG_LEVEL_OPTION: "verbose" }),
            trace: TraceValue::Verbose,
            init_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

impl ClientConfig {
    /// Creates a new builder with default configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Checks the values the server cannot run without.
    /// ## Errors
    /// `Error::Config` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config("client id must not be empty".to_string()));
        }
        if self.server_path.as_os_str().is_empty() {
            return Err(Error::Config("server path must not be empty".to_string()));
        }
        if self.log_path.file_name().is_none() {
            return Err(Error::Config(format!(
                "log path '{}' does not name a file",
                self.log_path.display()
            )));
        }
        if self.init_timeout.is_zero() {
            return Err(Error::Config("init timeout must be positive".to_string()));
        }
        Ok(())
    }

    /// The log file the server will write, as seen from this process.
    ///
    /// The server runs inside the workspace, so a relative log path is taken
    /// relative to `workspace_root`.
    pub fn resolved_log_path(&self) -> PathBuf {
        self.in_workspace(&self.log_path)
    }

    /// The server binary to spawn.
    ///
    /// Relative paths with a directory part are taken relative to
    /// `workspace_root`; a bare program name is left for `PATH` lookup.
    pub fn resolved_server_path(&self) -> PathBuf {
        if self.server_path.components().count() > 1 {
            self.in_workspace(&self.server_path)
        } else {
            self.server_path.clone()
        }
    }

    fn in_workspace(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        path.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .fold(self.workspace_root.clone(), |acc, c| acc.join(c))
    }

    /// The run/debug launch profiles for this configuration.
    pub fn transport_profile(&self) -> TransportProfile {
        TransportProfile::new(self.resolved_server_path(), &self.resolved_log_path())
    }

    /// Everything a launcher needs to build a session for `selector`.
    pub fn session_config(&self, selector: &DocumentSelector) -> SessionConfig {
        SessionConfig {
            client_id: self.client_id.clone(),
            transport: self.transport_profile(),
            launch_mode: self.launch_mode,
            selector: selector.clone(),
            log_path: self.resolved_log_path(),
            workspace_root: self.workspace_root.clone(),
            initialization_options: self.initialization_options.clone(),
            trace: self.trace,
            init_timeout: self.init_timeout,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Creates a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the client identifier.
    #[must_use]
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.config.client_id = id.into();
        self
    }

    /// Sets the server binary.
    #[must_use]
    pub fn server_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.server_path = path.into();
        self
    }

    /// Sets the server log file.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log_path = path.into();
        self
    }

    /// Sets the workspace root.
    #[must_use]
    pub fn workspace_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = path.into();
        self
    }

    /// Sets the launch mode.
    #[must_use]
    pub fn launch_mode(mut self, mode: LaunchMode) -> Self {
        self.config.launch_mode = mode;
        self
    }

    /// Replaces the initialization options.
    #[must_use]
    pub fn initialization_options(mut self, options: Value) -> Self {
        self.config.initialization_options = options;
        self
    }

    /// Sets the trace preference sent in `initialize`.
    #[must_use]
    pub fn trace(mut self, trace: TraceValue) -> Self {
        self.config.trace = trace;
        self
    }

    /// Sets the initialization timeout.
    #[must_use]
    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.config.init_timeout = timeout;
        self
    }

    /// Sets the shutdown grace period.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Returns the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
