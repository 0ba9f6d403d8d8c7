//! Lifecycle controller tests.
//!
//! These drive the controller through a recording launcher, so no server
//! binary is needed.

mod common;

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use common::{Event, RecordingLauncher, config_in, recording_controller};
use wflang_client::config::{ClientConfig, ControllerOptions};
use wflang_client::error::ControllerError;
use wflang_client::lsp::{
    Activation, DocumentSelector, LaunchMode, LifecycleController, SessionState, TraceValue,
};

#[tokio::test]
async fn test_deactivate_before_activate_is_noop() {
    let temp = TempDir::new().unwrap();
    let launcher = RecordingLauncher::default();
    let recorder = launcher.recorder.clone();
    let mut controller = recording_controller(config_in(temp.path()), launcher);

    assert_ok!(controller.deactivate().await);
    assert_eq!(controller.state(), SessionState::Inactive);
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn test_activate_provisions_and_starts() {
    let temp = TempDir::new().unwrap();
    let launcher = RecordingLauncher::default();
    let recorder = launcher.recorder.clone();
    let mut controller = recording_controller(config_in(temp.path()), launcher);

    let activation = assert_ok!(controller.activate().await);

    assert_eq!(
        activation,
        Activation::Started {
            trace_override_sent: true
        }
    );
    assert_eq!(controller.state(), SessionState::Running);
    assert!(temp.path().join("logs").is_dir());

    let log_path = temp.path().join("logs/server.log");
    assert_eq!(
        recorder.events()[0],
        Event::Create {
            command: temp.path().join("bin/wflang"),
            args: vec![log_path.to_string_lossy().into_owned()],
        }
    );
}

#[tokio::test]
async fn test_relative_log_path_scenario() {
    let workspace = TempDir::new().unwrap();
    let config = ClientConfig::builder()
        .server_path("bin/wflang")
        .log_path("./logs/server.log")
        .workspace_root(workspace.path())
        .build();
    let launcher = RecordingLauncher::default();
    let recorder = launcher.recorder.clone();
    let mut controller = recording_controller(config, launcher);

    assert_ok!(controller.activate().await);

    assert!(workspace.path().join("logs").is_dir());
    assert_eq!(controller.state(), SessionState::Running);
    assert_eq!(
        recorder.events()[0],
        Event::Create {
            command: workspace.path().join("bin/wflang"),
            args: vec![
                workspace
                    .path()
                    .join("logs/server.log")
                    .to_string_lossy()
                    .into_owned()
            ],
        }
    );
}

#[tokio::test]
async fn test_relative_log_path_follows_workspace_not_cwd() {
    let workspace = TempDir::new().unwrap();
    let log_dir = format!("wflang-logs-{}", std::process::id());
    let config = ClientConfig::builder()
        .server_path("bin/wflang")
        .log_path(format!("{log_dir}/server.log"))
        .workspace_root(workspace.path())
        .build();
    let launcher = RecordingLauncher::default();
    let recorder = launcher.recorder.clone();
    let mut controller = recording_controller(config, launcher);

    assert_ok!(controller.activate().await);

    let expected = workspace.path().join(&log_dir);
    assert!(expected.is_dir());
    assert!(!PathBuf::from(&log_dir).exists());
    let events = recorder.events();
    let Event::Create { args, .. } = &events[0] else {
        panic!("first event should be session creation");
    };
    assert_eq!(
        args,
        &vec![expected.join("server.log").to_string_lossy().into_owned()]
    );
}

#[tokio::test]
async fn test_provisioning_failure_aborts_without_spawn() {
    let temp = TempDir::new().unwrap();
    // a regular file where the log directory should go
    fs::write(temp.path().join("logs"), "in the way").unwrap();

    let launcher = RecordingLauncher::default();
    let recorder = launcher.recorder.clone();
    let mut controller = recording_controller(config_in(temp.path()), launcher);

    let activation = assert_ok!(controller.activate().await);

    assert_eq!(activation, Activation::Aborted);
    assert_eq!(controller.state(), SessionState::Inactive);
    assert!(controller.session().is_none());
    assert_eq!(recorder.created(), 0);
    assert!(recorder.events().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_unwritable_log_directory_aborts() {
    use std::os::unix::fs::PermissionsExt;

    // root passes every access check
    if nix::unistd::geteuid().is_root() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let logs = temp.path().join("logs");
    fs::create_dir(&logs).unwrap();
    fs::set_permissions(&logs, fs::Permissions::from_mode(0o555)).unwrap();

    let launcher = RecordingLauncher::default();
    let recorder = launcher.recorder.clone();
    let mut controller = recording_controller(config_in(temp.path()), launcher);
    let result = controller.activate().await;

    fs::set_permissions(&logs, fs::Permissions::from_mode(0o755)).unwrap();
    assert_eq!(assert_ok!(result), Activation::Aborted);
    assert_eq!(recorder.created(), 0);
}

#[tokio::test]
async fn test_skipping_log_path_check() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("logs"), "in the way").unwrap();

    let launcher = RecordingLauncher::default();
    let recorder = launcher.recorder.clone();
    let options = ControllerOptions::wflang().unwrap().validate_log_path(false);
    let mut controller =
        LifecycleController::with_launcher(launcher, config_in(temp.path()), options);

    assert_ok!(controller.activate().await);
    assert_eq!(controller.state(), SessionState::Running);
    assert_eq!(recorder.created(), 1);
}

#[tokio::test]
async fn test_trace_override_sent_once_after_running() {
    let temp = TempDir::new().unwrap();
    let launcher = RecordingLauncher::default();
    let recorder = launcher.recorder.clone();
    let mut controller = recording_controller(config_in(temp.path()), launcher);

    assert_ok!(controller.activate().await);

    let events = recorder.events();
    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], Event::Create { .. }));
    assert_eq!(events[1], Event::Start);
    assert_eq!(
        events[2],
        Event::SetTrace {
            value: TraceValue::Verbose,
            state: SessionState::Running,
        }
    );
}

#[tokio::test]
async fn test_trace_override_disabled() {
    let temp = TempDir::new().unwrap();
    let launcher = RecordingLauncher::default();
    let recorder = launcher.recorder.clone();
    let options = ControllerOptions::wflang().unwrap().trace_workaround(false);
    let mut controller =
        LifecycleController::with_launcher(launcher, config_in(temp.path()), options);

    let activation = assert_ok!(controller.activate().await);

    assert_eq!(
        activation,
        Activation::Started {
            trace_override_sent: false
        }
    );
    assert!(
        !recorder
            .events()
            .iter()
            .any(|e| matches!(e, Event::SetTrace { .. }))
    );
}

#[tokio::test]
async fn test_trace_override_failure_keeps_session() {
    let temp = TempDir::new().unwrap();
    let launcher = RecordingLauncher {
        fail_trace: true,
        ..Default::default()
    };
    let mut controller = recording_controller(config_in(temp.path()), launcher);

    let activation = assert_ok!(controller.activate().await);

    assert_eq!(
        activation,
        Activation::Started {
            trace_override_sent: false
        }
    );
    assert_eq!(controller.state(), SessionState::Running);
}

#[tokio::test]
async fn test_activate_then_deactivate_reaches_stopped() {
    let temp = TempDir::new().unwrap();
    let launcher = RecordingLauncher::default();
    let recorder = launcher.recorder.clone();
    let mut controller = recording_controller(config_in(temp.path()), launcher);

    assert_ok!(controller.activate().await);
    assert_ok!(controller.deactivate().await);

    assert_eq!(controller.state(), SessionState::Stopped);
    assert_eq!(recorder.count(&Event::Stop), 1);

    // a second deactivate touches nothing
    assert_ok!(controller.deactivate().await);
    assert_eq!(recorder.count(&Event::Stop), 1);
}

#[tokio::test]
async fn test_second_activate_while_running_is_rejected() {
    let temp = TempDir::new().unwrap();
    let launcher = RecordingLauncher::default();
    let recorder = launcher.recorder.clone();
    let mut controller = recording_controller(config_in(temp.path()), launcher);

    assert_ok!(controller.activate().await);
    let err = assert_err!(controller.activate().await);

    assert!(matches!(
        err,
        ControllerError::AlreadyActive(SessionState::Running)
    ));
    assert_eq!(controller.state(), SessionState::Running);
    assert_eq!(recorder.created(), 1);
    assert_eq!(recorder.count(&Event::Stop), 0);
}

#[tokio::test]
async fn test_reactivation_builds_new_session() {
    let temp = TempDir::new().unwrap();
    let launcher = RecordingLauncher::default();
    let recorder = launcher.recorder.clone();
    let mut controller = recording_controller(config_in(temp.path()), launcher);

    assert_ok!(controller.activate().await);
    assert_ok!(controller.deactivate().await);
    assert_ok!(controller.activate().await);

    assert_eq!(controller.state(), SessionState::Running);
    assert_eq!(recorder.created(), 2);
    assert_eq!(recorder.count(&Event::Start), 2);
}

#[tokio::test]
async fn test_launch_failure_propagates() {
    let temp = TempDir::new().unwrap();
    let launcher = RecordingLauncher {
        fail_start: true,
        ..Default::default()
    };
    let recorder = launcher.recorder.clone();
    let mut controller = recording_controller(config_in(temp.path()), launcher);

    let err = assert_err!(controller.activate().await);

    assert!(matches!(err, ControllerError::Session(_)));
    assert_eq!(controller.state(), SessionState::Inactive);
    // one attempt, no retry, no trace override
    let events = recorder.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], Event::Create { .. }));
    assert_eq!(events[1], Event::Start);
}

#[tokio::test]
async fn test_controllers_do_not_share_sessions() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let mut first = recording_controller(config_in(first_dir.path()), RecordingLauncher::default());
    let mut second =
        recording_controller(config_in(second_dir.path()), RecordingLauncher::default());

    assert_ok!(first.activate().await);
    assert_ok!(second.activate().await);
    assert_ok!(first.deactivate().await);

    assert_eq!(first.state(), SessionState::Stopped);
    assert_eq!(second.state(), SessionState::Running);
}

#[tokio::test]
async fn test_session_receives_configuration() {
    let temp = TempDir::new().unwrap();
    let config = ClientConfig::builder()
        .server_path("wflang")
        .log_path(temp.path().join("server.log"))
        .launch_mode(LaunchMode::Debug)
        .build();
    let selector = DocumentSelector::for_extension("wfl", "wflang").unwrap();
    let mut controller = LifecycleController::with_launcher(
        RecordingLauncher::default(),
        config,
        ControllerOptions::new(selector.clone()),
    );

    assert_ok!(controller.activate().await);

    let session = controller.session().unwrap();
    assert_eq!(session.config.selector, selector);
    assert_eq!(session.config.launch_mode, LaunchMode::Debug);
    assert_eq!(session.config.initialization_options["LogLevel"], "verbose");
    assert_eq!(session.config.transport.run, session.config.transport.debug);
}
