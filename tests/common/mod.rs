//! Common test helpers and utilities.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wflang_client::config::{ClientConfig, ControllerOptions};
use wflang_client::error::LspError;
use wflang_client::lsp::{
    LifecycleController, LspResult, Session, SessionConfig, SessionLauncher, SessionState,
    TraceValue,
};

/// Something a recording session was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A session was constructed.
    Create {
        /// Server command of the selected launch profile.
        command: PathBuf,
        /// Arguments of the selected launch profile.
        args: Vec<String>,
    },
    /// `start` was called.
    Start,
    /// `set_trace` was called while the session was in `state`.
    SetTrace {
        /// Value sent.
        value: TraceValue,
        /// Session state at the time of sending.
        state: SessionState,
    },
    /// `stop` was called.
    Stop,
}

/// Shared, ordered log of session events.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Event>>>);

impl Recorder {
    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    /// Number of recorded events equal to `event`.
    pub fn count(&self, event: &Event) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    /// Number of sessions constructed.
    pub fn created(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Create { .. }))
            .count()
    }
}

/// Launcher producing [`RecordingSession`]s instead of processes.
#[derive(Debug, Clone, Default)]
pub struct RecordingLauncher {
    /// Events of every session this launcher creates.
    pub recorder: Recorder,
    /// Make `start` fail.
    pub fail_start: bool,
    /// Make `set_trace` fail.
    pub fail_trace: bool,
}

impl SessionLauncher for RecordingLauncher {
    type Session = RecordingSession;

    fn create(&self, config: SessionConfig) -> RecordingSession {
        let executable = config.transport.select(config.launch_mode);
        self.recorder.push(Event::Create {
            command: executable.command.clone(),
            args: executable.args.clone(),
        });
        RecordingSession {
            config,
            state: SessionState::Inactive,
            recorder: self.recorder.clone(),
            fail_start: self.fail_start,
            fail_trace: self.fail_trace,
        }
    }
}

/// Session that records calls and simulates state transitions.
#[derive(Debug)]
pub struct RecordingSession {
    /// Configuration the session was built from.
    pub config: SessionConfig,
    state: SessionState,
    recorder: Recorder,
    fail_start: bool,
    fail_trace: bool,
}

impl Session for RecordingSession {
    fn state(&self) -> SessionState {
        self.state
    }

    async fn start(&mut self) -> LspResult<()> {
        self.recorder.push(Event::Start);
        assert_eq!(self.state, SessionState::Inactive, "session started twice");
        self.state = SessionState::Starting;
        tokio::task::yield_now().await;

        if self.fail_start {
            self.state = SessionState::Stopped;
            return Err(LspError::ServerStartFailed("spawn rejected".to_string()));
        }
        self.state = SessionState::Running;
        Ok(())
    }

    async fn stop(&mut self) -> LspResult<()> {
        self.recorder.push(Event::Stop);
        if self.state.is_live() {
            self.state = SessionState::Stopping;
            tokio::task::yield_now().await;
            self.state = SessionState::Stopped;
        }
        Ok(())
    }

    fn set_trace(&self, value: TraceValue) -> LspResult<()> {
        self.recorder.push(Event::SetTrace {
            value,
            state: self.state,
        });
        if self.fail_trace {
            return Err(LspError::RequestFailed("channel closed".to_string()));
        }
        Ok(())
    }
}

/// Client configuration rooted in `dir`, logging to `dir/logs/server.log`.
pub fn config_in(dir: &Path) -> ClientConfig {
    ClientConfig::builder()
        .server_path(dir.join("bin/wflang"))
        .log_path(dir.join("logs/server.log"))
        .workspace_root(dir)
        .init_timeout(Duration::from_secs(5))
        .shutdown_timeout(Duration::from_millis(500))
        .build()
}

/// Controller over a recording launcher with default wflang options.
pub fn recording_controller(
    config: ClientConfig,
    launcher: RecordingLauncher,
) -> LifecycleController<RecordingLauncher> {
    let options = ControllerOptions::wflang().expect("wflang selector");
    LifecycleController::with_launcher(launcher, config, options)
}
