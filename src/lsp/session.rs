//! Session abstraction shared by the controller and its launchers.
//!
//! A [`Session`] is the single live connection to a language server. The
//! controller never spawns processes itself: it asks a [`SessionLauncher`]
//! for a fresh session and drives it through [`SessionState`].

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use lsp_types::TraceValue;
use serde_json::Value;

use super::LspResult;
use super::selector::DocumentSelector;
use super::transport::{LaunchMode, TransportProfile};

/// Lifecycle state of a client session.
///
/// `Inactive` doubles as the controller's state when no session exists.
/// `Stopped` is terminal for a session instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Constructed but not started, or no session at all.
    Inactive,
    /// The server process is being spawned and initialized.
    Starting,
    /// The handshake completed; the server accepts traffic.
    Running,
    /// Shutdown has been requested.
    Stopping,
    /// The process and protocol resources have been released.
    Stopped,
}

impl SessionState {
    /// Whether a session in this state still owns (or is acquiring) a process.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Stopping)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inactive => "inactive",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Everything a launcher needs to construct a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Identifier the client announces in `initialize`.
    pub client_id: String,
    /// How to start the server process.
    pub transport: TransportProfile,
    /// Which of the two launch profiles to use.
    pub launch_mode: LaunchMode,
    /// Documents the server is associated with.
    pub selector: DocumentSelector,
    /// Resolved log file the server writes to.
    pub log_path: PathBuf,
    /// Working directory of the server and root of the workspace folder.
    pub workspace_root: PathBuf,
    /// Options object sent as `initializationOptions`.
    pub initialization_options: Value,
    /// Trace preference sent in `initialize`. Advisory only.
    pub trace: TraceValue,
    /// Upper bound on the `initialize` round trip.
    pub init_timeout: Duration,
    /// Grace period for `shutdown` and for the child to exit.
    pub shutdown_timeout: Duration,
}

/// A live connection to a language server.
///
/// Implementations serialize their own start/stop; the controller never
/// calls `start` twice on one instance.
#[allow(async_fn_in_trait)]
pub trait Session {
    /// Current lifecycle state.
    fn state(&self) -> SessionState;

    /// Spawns the server and performs the protocol handshake.
    ///
    /// Moves `Inactive -> Starting -> Running`; on failure the session ends
    /// up `Stopped` with no child process left behind.
    /// ## Errors
    async fn start(&mut self) -> LspResult<()>;

    /// Stops the server and releases the process and its streams.
    ///
    /// Moves `Running -> Stopping -> Stopped`. A session that is not live is
    /// left untouched.
    /// ## Errors
    async fn stop(&mut self) -> LspResult<()>;

    /// Sends a `$/setTrace` notification. Fire-and-forget.
    /// ## Errors
    /// `LspError::NotRunning` if the session is not running, or
    /// `LspError::RequestFailed` if the notification could not be queued.
    fn set_trace(&self, value: TraceValue) -> LspResult<()>;
}

/// Constructs sessions for the controller.
pub trait SessionLauncher {
    /// The concrete session type produced.
    type Session: Session;

    /// Builds a new, not yet started, session.
    fn create(&self, config: SessionConfig) -> Self::Session;
}
