//! Server launch profiles.
//!
//! The server is a child process speaking the protocol over its standard
//! input and output. It takes exactly one positional argument: the path of
//! the log file it writes. The run and debug profiles are identical.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Serialize;

/// How protocol messages travel between client and server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Framed messages over the child's stdin/stdout.
    Stdio,
}

/// Which launch profile to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchMode {
    /// Normal execution.
    #[default]
    Run,
    /// Debug execution.
    Debug,
}

/// One way of starting the server: `{command, args, transport}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Executable {
    /// Path of the server binary.
    pub command: PathBuf,
    /// Positional arguments.
    pub args: Vec<String>,
    /// Transport the process speaks.
    pub transport: TransportKind,
}

impl Executable {
    /// Builds the process command with piped stdio.
    ///
    /// The child is killed if the handle is dropped without being reaped.
    pub fn command(&self, working_dir: &Path) -> async_process::Command {
        let mut cmd = async_process::Command::new(&self.command);
        cmd.args(&self.args)
            .current_dir(working_dir)
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        match self.transport {
            TransportKind::Stdio => {
                cmd.stdin(Stdio::piped()).stdout(Stdio::piped());
            }
        }
        cmd
    }
}

/// The `{run, debug}` pair of launch descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportProfile {
    /// Profile for normal execution.
    pub run: Executable,
    /// Profile for debug execution.
    pub debug: Executable,
}

impl TransportProfile {
    /// Profile launching `server` with `log_path` as its only argument.
    pub fn new(server: impl Into<PathBuf>, log_path: &Path) -> Self {
        let executable = Executable {
            command: server.into(),
            args: vec![log_path.to_string_lossy().into_owned()],
            transport: TransportKind::Stdio,
        };
        Self {
            run: executable.clone(),
            debug: executable,
        }
    }

    /// The executable for a launch mode.
    pub fn select(&self, mode: LaunchMode) -> &Executable {
        match mode {
            LaunchMode::Run => &self.run,
            LaunchMode::Debug => &self.debug,
        }
    }
}
