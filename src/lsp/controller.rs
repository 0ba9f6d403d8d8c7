//! Lifecycle controller.
//!
//! Owns at most one [`Session`] and exposes the two entry points the host
//! calls: [`LifecycleController::activate`] and
//! [`LifecycleController::deactivate`].
//!
//! Activation runs, in order:
//!
//! 1. log directory provisioning (when `validate_log_path` is set); failure
//!    aborts with the controller left `Inactive` and nothing spawned
//! 2. session construction from the selector and transport profile
//! 3. session start, which spawns the server and completes the handshake
//! 4. the post-start trace override (when `enable_trace_workaround` is set)
//!
//! Activating while a session is live is rejected with
//! [`ControllerError::AlreadyActive`]; the running session is never replaced
//! behind the caller's back.

use tracing::{debug, info, warn};

use crate::config::{ClientConfig, ControllerOptions};
use crate::error::ControllerError;

use super::client::ProcessLauncher;
use super::provision::ensure_log_directory;
use super::session::{Session, SessionLauncher, SessionState};
use super::trace::TraceNegotiator;

/// Outcome of a completed `activate` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The session is running.
    Started {
        /// Whether the trace override reached the server.
        trace_override_sent: bool,
    },
    /// The log directory could not be provisioned; nothing was launched.
    Aborted,
}

/// Drives a single client session through its lifecycle.
#[derive(Debug)]
pub struct LifecycleController<L: SessionLauncher = ProcessLauncher> {
    launcher: L,
    config: ClientConfig,
    options: ControllerOptions,
    trace: TraceNegotiator,
    session: Option<L::Session>,
}

impl LifecycleController<ProcessLauncher> {
    /// Controller launching real server processes.
    pub fn new(config: ClientConfig, options: ControllerOptions) -> Self {
        Self::with_launcher(ProcessLauncher, config, options)
    }
}

impl<L: SessionLauncher> LifecycleController<L> {
    /// Controller using a custom launcher.
    pub fn with_launcher(launcher: L, config: ClientConfig, options: ControllerOptions) -> Self {
        Self {
            launcher,
            config,
            options,
            trace: TraceNegotiator::verbose(),
            session: None,
        }
    }

    /// State of the current session, `Inactive` when there is none.
    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Inactive, Session::state)
    }

    /// The current session, if one was activated.
    pub fn session(&self) -> Option<&L::Session> {
        self.session.as_ref()
    }

    /// Mutable access to the current session.
    pub fn session_mut(&mut self) -> Option<&mut L::Session> {
        self.session.as_mut()
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The controller options.
    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// Provisions, launches and starts a new session.
    ///
    /// Provisioning failures are logged and reported as
    /// [`Activation::Aborted`]; they never surface as errors.
    /// ## Errors
    /// [`ControllerError::AlreadyActive`] if a session is still live, or
    /// [`ControllerError::Session`] if the server fails to start. A single
    /// launch attempt is made.
    pub async fn activate(&mut self) -> Result<Activation, ControllerError> {
        let state = self.state();
        if state.is_live() {
            warn!(state = %state, "activate called while a session is live");
            return Err(ControllerError::AlreadyActive(state));
        }
        // a stopped session is spent
        self.session = None;

        let log_path = self.config.resolved_log_path();
        if self.options.validate_log_path && !ensure_log_directory(&log_path) {
            warn!(
                log_path = %log_path.display(),
                "activation aborted, log directory unavailable"
            );
            return Ok(Activation::Aborted);
        }

        let session_config = self.config.session_config(&self.options.selector);
        let session = self.session.insert(self.launcher.create(session_config));
        let started = session.start().await;
        if let Err(e) = started {
            self.session = None;
            return Err(e.into());
        }
        info!(client = %self.config.client_id, "client session active");

        let trace_override_sent = self.after_running();
        Ok(Activation::Started {
            trace_override_sent,
        })
    }

    /// Stops the current session.
    ///
    /// Without a live session this returns immediately and touches nothing.
    /// ## Errors
    /// [`ControllerError::Session`] if the session reports a stop failure.
    pub async fn deactivate(&mut self) -> Result<(), ControllerError> {
        let Some(session) = self.session.as_mut() else {
            debug!("deactivate called without a session");
            return Ok(());
        };
        if !session.state().is_live() {
            debug!(state = %session.state(), "deactivate called on a spent session");
            return Ok(());
        }

        session.stop().await?;
        info!(client = %self.config.client_id, "client session stopped");
        Ok(())
    }

    /// Hooks that run once the session reports `Running`.
    fn after_running(&self) -> bool {
        match &self.session {
            Some(session) if self.options.enable_trace_workaround => self.trace.negotiate(session),
            _ => false,
        }
    }
}
