//! Process-backed client session.
//!
//! [`ClientSession`] spawns the language server as a child process, runs the
//! async-lsp main loop over its stdio and drives the `initialize` /
//! `shutdown` handshakes. Traffic the server sends back (log messages,
//! traces, diagnostics) is forwarded to tracing under [`TRACE_TARGET`].
//!
//! # Example
//!
//! ```ignore
//! use wflang_client::lsp::{ClientSession, Session};
//!
//! let mut session = ClientSession::new(config);
//! session.start().await?;
//! session.did_open(Path::new("rules/main.wflang")).await?;
//! session.stop().await?;
//! ```

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::Path;
use std::time::Duration;

use async_lsp::concurrency::ConcurrencyLayer;
use async_lsp::panic::CatchUnwindLayer;
use async_lsp::router::Router;
use async_lsp::tracing::TracingLayer;
use async_lsp::{LanguageServer, ServerSocket};
use lsp_types::notification::{self, SetTrace};
use lsp_types::{
    ClientCapabilities, ClientInfo, CompletionClientCapabilities, CompletionItemCapability,
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DidSaveTextDocumentParams, DocumentSymbolClientCapabilities, GotoCapability,
    HoverClientCapabilities, InitializeParams, InitializedParams, LogMessageParams,
    LogTraceParams, MarkupKind, MessageType, PublishDiagnosticsParams, ServerCapabilities,
    SetTraceParams, ShowMessageParams, SignatureHelpClientCapabilities,
    TextDocumentClientCapabilities, TextDocumentContentChangeEvent, TextDocumentIdentifier,
    TextDocumentItem, TextDocumentSyncClientCapabilities, TraceValue, Url,
    VersionedTextDocumentIdentifier, WindowClientCapabilities, WorkspaceFolder,
};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tracing::{debug, error, info, trace, warn};

use crate::error::LspError;

use super::LspResult;
use super::session::{Session, SessionConfig, SessionLauncher, SessionState};
use super::types::path_to_url;

/// Tracing target for traffic originating from the server.
pub const TRACE_TARGET: &str = "wflang_client::trace";

/// State for handling notifications from the server.
#[derive(Debug, Clone)]
struct ClientState {
    client_id: String,
}

/// A language server process and the protocol connection to it.
#[derive(Debug)]
pub struct ClientSession {
    config: SessionConfig,
    state: SessionState,
    /// Handle for requests and notifications; present while running.
    server: Option<ServerSocket>,
    mainloop: Option<JoinHandle<()>>,
    child: Option<async_process::Child>,
    capabilities: Option<ServerCapabilities>,
    /// Open documents and their last sent version.
    documents: HashMap<Url, i32>,
}

impl ClientSession {
    /// Creates a session that has not been started.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Inactive,
            server: None,
            mainloop: None,
            child: None,
            capabilities: None,
            documents: HashMap::new(),
        }
    }

    /// The configuration this session was built from.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Capabilities the server advertised during initialization.
    pub fn capabilities(&self) -> Option<&ServerCapabilities> {
        self.capabilities.as_ref()
    }

    /// OS process id of the server, while one is owned.
    pub fn process_id(&self) -> Option<u32> {
        self.child.as_ref().map(async_process::Child::id)
    }

    /// Whether a document is currently open on the server.
    pub fn is_open(&self, uri: &Url) -> bool {
        self.documents.contains_key(uri)
    }

    async fn launch(&mut self) -> LspResult<()> {
        let workspace_root = self.config.workspace_root.canonicalize().map_err(|e| {
            LspError::InitializationFailed(format!(
                "failed to canonicalize workspace root '{}': {e}",
                self.config.workspace_root.display()
            ))
        })?;

        let executable = self.config.transport.select(self.config.launch_mode);
        let mut child = executable.command(&workspace_root).spawn().map_err(|e| {
            LspError::ServerStartFailed(format!(
                "failed to spawn '{}': {}",
                executable.command.display(),
                e
            ))
        })?;
        debug!(
            command = %executable.command.display(),
            args = ?executable.args,
            pid = child.id(),
            "spawned language server"
        );

        let stdout = child.stdout.take();
        let stdin = child.stdin.take();
        // Owned from here on so a failed handshake still reaps it.
        self.child = Some(child);
        let stdout =
            stdout.ok_or_else(|| LspError::ServerStartFailed("failed to capture stdout".to_string()))?;
        let stdin =
            stdin.ok_or_else(|| LspError::ServerStartFailed("failed to capture stdin".to_string()))?;

        let client_id = self.config.client_id.clone();
        let (mainloop, mut server) = async_lsp::MainLoop::new_client(move |_client| {
            let mut router = Router::new(ClientState {
                client_id: client_id.clone(),
            });

            router
                .notification::<notification::LogMessage>(|this, params| {
                    log_message(&this.client_id, &params);
                    ControlFlow::Continue(())
                })
                .notification::<notification::ShowMessage>(|this, params| {
                    show_message(&this.client_id, &params);
                    ControlFlow::Continue(())
                })
                .notification::<notification::LogTrace>(|this, params| {
                    log_trace(&this.client_id, &params);
                    ControlFlow::Continue(())
                })
                .notification::<notification::PublishDiagnostics>(|this, params| {
                    publish_diagnostics(&this.client_id, &params);
                    ControlFlow::Continue(())
                })
                .notification::<notification::Progress>(|_this, _params| ControlFlow::Continue(()))
                .unhandled_notification(|this, notif| {
                    trace!(
                        target: TRACE_TARGET,
                        client = %this.client_id,
                        method = %notif.method,
                        "unhandled notification"
                    );
                    ControlFlow::Continue(())
                });

            ServiceBuilder::new()
                .layer(TracingLayer::default())
                .layer(CatchUnwindLayer::default())
                .layer(ConcurrencyLayer::default())
                .service(router)
        });

        self.mainloop = Some(tokio::spawn(async move {
            if let Err(e) = mainloop.run_buffered(stdout, stdin).await {
                debug!(error = ?e, "language server main loop ended");
            }
        }));

        let init_params = self.initialize_params(&workspace_root)?;
        let timeout = self.config.init_timeout;
        // The main loop panics once every socket is gone, so the session holds
        // this one until `release` has seen the loop end.
        let server = self.server.insert(server);
        let handshake = tokio::time::timeout(timeout, server.initialize(init_params)).await;
        let init_result = match handshake {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                return Err(self.handshake_error(format!("initialize request failed: {e:?}")));
            }
            Err(_) => return Err(LspError::Timeout(timeout)),
        };

        if let Some(server) = self.server.as_mut() {
            server.initialized(InitializedParams {}).map_err(|e| {
                LspError::InitializationFailed(format!("initialized notification failed: {e:?}"))
            })?;
        }

        self.capabilities = Some(init_result.capabilities);
        Ok(())
    }

    /// Reports an early exit of the child in preference to the protocol error.
    fn handshake_error(&mut self, message: String) -> LspError {
        if let Some(child) = self.child.as_mut()
            && let Ok(Some(status)) = child.try_status()
        {
            return LspError::ServerExited(status.to_string());
        }
        LspError::InitializationFailed(message)
    }

    #[allow(deprecated)]
    fn initialize_params(&self, workspace_root: &Path) -> LspResult<InitializeParams> {
        let workspace_uri = Url::from_file_path(workspace_root).map_err(|()| {
            LspError::InitializationFailed(format!(
                "invalid workspace root path: {}",
                workspace_root.display()
            ))
        })?;

        Ok(InitializeParams {
            process_id: Some(std::process::id()),
            root_uri: Some(workspace_uri.clone()),
            workspace_folders: Some(vec![WorkspaceFolder {
                uri: workspace_uri,
                name: workspace_root
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("workspace")
                    .to_string(),
            }]),
            initialization_options: Some(self.config.initialization_options.clone()),
            capabilities: client_capabilities(),
            trace: Some(self.config.trace),
            client_info: Some(ClientInfo {
                name: self.config.client_id.clone(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            ..Default::default()
        })
    }

    /// Reaps the child, killing it if it lingers, then winds down the main
    /// loop before dropping the socket that feeds it.
    async fn release(&mut self) {
        self.documents.clear();
        if let Some(mut child) = self.child.take() {
            reap_child(&mut child, self.config.shutdown_timeout).await;
        }
        if let Some(handle) = self.mainloop.take() {
            finish_mainloop(handle, self.config.shutdown_timeout).await;
        }
        self.server = None;
    }

    fn running_server(&mut self) -> LspResult<&mut ServerSocket> {
        if self.state != SessionState::Running {
            return Err(LspError::NotRunning(self.state));
        }
        self.server
            .as_mut()
            .ok_or(LspError::NotRunning(self.state))
    }

    /// Opens a document on the server.
    ///
    /// Documents the selector does not match are not sent; `Ok(false)` is
    /// returned for them. Opening an already open document is a no-op.
    /// ## Errors
    pub async fn did_open(&mut self, path: &Path) -> LspResult<bool> {
        if self.state != SessionState::Running {
            return Err(LspError::NotRunning(self.state));
        }
        let uri = path_to_url(path)?;

        if !self.config.selector.matches(&uri) {
            debug!(uri = %uri, "document not selected, not forwarding");
            return Ok(false);
        }
        if self.documents.contains_key(&uri) {
            return Ok(true);
        }

        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            LspError::DocumentNotFound(format!("failed to read '{}': {}", path.display(), e))
        })?;

        let params = DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: uri.clone(),
                language_id: self.config.selector.language().to_string(),
                version: 0,
                text,
            },
        };
        self.running_server()?
            .did_open(params)
            .map_err(|e| LspError::RequestFailed(format!("didOpen notification failed: {e:?}")))?;

        self.documents.insert(uri, 0);
        Ok(true)
    }

    /// Replaces the content of an open document.
    /// ## Errors
    pub fn did_change(&mut self, path: &Path, text: &str) -> LspResult<()> {
        let uri = path_to_url(path)?;
        let version = self.next_version(&uri, path)?;

        let params = DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier { uri, version },
            content_changes: vec![TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text: text.to_string(),
            }],
        };
        self.running_server()?.did_change(params).map_err(|e| {
            LspError::RequestFailed(format!("didChange notification failed: {e:?}"))
        })
    }

    /// Tells the server an open document was saved.
    /// ## Errors
    pub fn did_save(&mut self, path: &Path) -> LspResult<()> {
        let uri = self.open_uri(path)?;

        let params = DidSaveTextDocumentParams {
            text_document: TextDocumentIdentifier { uri },
            text: None,
        };
        self.running_server()?
            .did_save(params)
            .map_err(|e| LspError::RequestFailed(format!("didSave notification failed: {e:?}")))
    }

    /// Closes an open document.
    /// ## Errors
    pub fn did_close(&mut self, path: &Path) -> LspResult<()> {
        let uri = self.open_uri(path)?;

        let params = DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
        };
        self.running_server()?
            .did_close(params)
            .map_err(|e| LspError::RequestFailed(format!("didClose notification failed: {e:?}")))?;

        self.documents.remove(&uri);
        Ok(())
    }

    fn open_uri(&self, path: &Path) -> LspResult<Url> {
        if self.state != SessionState::Running {
            return Err(LspError::NotRunning(self.state));
        }
        let uri = path_to_url(path)?;
        if !self.documents.contains_key(&uri) {
            return Err(LspError::DocumentNotFound(format!(
                "document not open: {}",
                path.display()
            )));
        }
        Ok(uri)
    }

    fn next_version(&mut self, uri: &Url, path: &Path) -> LspResult<i32> {
        if self.state != SessionState::Running {
            return Err(LspError::NotRunning(self.state));
        }
        let version = self.documents.get_mut(uri).ok_or_else(|| {
            LspError::DocumentNotFound(format!("document not open: {}", path.display()))
        })?;
        *version += 1;
        Ok(*version)
    }
}

impl Session for ClientSession {
    fn state(&self) -> SessionState {
        self.state
    }

    async fn start(&mut self) -> LspResult<()> {
        if self.state != SessionState::Inactive {
            return Err(LspError::ServerStartFailed(format!(
                "session cannot be restarted (state: {})",
                self.state
            )));
        }

        self.state = SessionState::Starting;
        info!(
            client = %self.config.client_id,
            log_path = %self.config.log_path.display(),
            mode = ?self.config.launch_mode,
            "starting language server"
        );

        match self.launch().await {
            Ok(()) => {
                self.state = SessionState::Running;
                info!(client = %self.config.client_id, "language server running");
                Ok(())
            }
            Err(e) => {
                error!(client = %self.config.client_id, error = %e, "language server failed to start");
                self.release().await;
                self.state = SessionState::Stopped;
                Err(e)
            }
        }
    }

    async fn stop(&mut self) -> LspResult<()> {
        if !matches!(self.state, SessionState::Starting | SessionState::Running) {
            debug!(state = %self.state, "stop ignored, session not live");
            return Ok(());
        }

        self.state = SessionState::Stopping;
        info!(client = %self.config.client_id, "stopping language server");

        if let Some(server) = self.server.as_mut() {
            match tokio::time::timeout(self.config.shutdown_timeout, server.shutdown(())).await {
                Ok(Ok(())) => {
                    if let Err(e) = server.exit(()) {
                        warn!(error = ?e, "exit notification failed");
                    }
                }
                Ok(Err(e)) => warn!(error = ?e, "shutdown request failed"),
                Err(_) => warn!(
                    timeout = ?self.config.shutdown_timeout,
                    "shutdown request timed out"
                ),
            }
        }

        self.release().await;
        self.state = SessionState::Stopped;
        info!(client = %self.config.client_id, "language server stopped");
        Ok(())
    }

    fn set_trace(&self, value: TraceValue) -> LspResult<()> {
        if self.state != SessionState::Running {
            return Err(LspError::NotRunning(self.state));
        }
        let server = self
            .server
            .as_ref()
            .ok_or(LspError::NotRunning(self.state))?;
        server
            .notify::<SetTrace>(SetTraceParams { value })
            .map_err(|e| LspError::RequestFailed(format!("setTrace notification failed: {e:?}")))
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        // the child is killed on drop; the main loop is not
        let Some(handle) = self.mainloop.take() else {
            return;
        };
        handle.abort();
        let server = self.server.take();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let _ = handle.await;
                drop(server);
            });
        }
    }
}

/// Launches [`ClientSession`]s backed by real server processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl SessionLauncher for ProcessLauncher {
    type Session = ClientSession;

    fn create(&self, config: SessionConfig) -> ClientSession {
        ClientSession::new(config)
    }
}

/// Waits up to `grace` for the child to exit, then kills it.
async fn reap_child(child: &mut async_process::Child, grace: Duration) {
    match tokio::time::timeout(grace, child.status()).await {
        Ok(Ok(status)) => {
            debug!(?status, "language server exited");
            return;
        }
        Ok(Err(e)) => warn!(error = %e, "failed to wait for language server, killing"),
        Err(_) => warn!(?grace, "language server did not exit in time, killing"),
    }

    if let Err(e) = child.kill() {
        warn!(error = %e, "failed to kill language server");
    }
    match child.status().await {
        Ok(status) => debug!(?status, "language server killed"),
        Err(e) => warn!(error = %e, "failed to reap language server"),
    }
}

/// Waits up to `grace` for the main loop to finish, then aborts it.
///
/// The loop normally ends by itself once the child's stdout closes.
async fn finish_mainloop(mut handle: JoinHandle<()>, grace: Duration) {
    let outcome = match tokio::time::timeout(grace, &mut handle).await {
        Ok(outcome) => outcome,
        Err(_) => {
            debug!(?grace, "main loop still running, aborting");
            handle.abort();
            handle.await
        }
    };
    match outcome {
        Err(e) if e.is_panic() => error!(error = %e, "language server main loop panicked"),
        _ => debug!("language server main loop finished"),
    }
}

fn client_capabilities() -> ClientCapabilities {
    ClientCapabilities {
        text_document: Some(TextDocumentClientCapabilities {
            synchronization: Some(TextDocumentSyncClientCapabilities {
                dynamic_registration: Some(false),
                will_save: Some(false),
                will_save_wait_until: Some(false),
                did_save: Some(true),
            }),
            completion: Some(CompletionClientCapabilities {
                dynamic_registration: Some(false),
                completion_item: Some(CompletionItemCapability {
                    snippet_support: Some(false),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            hover: Some(HoverClientCapabilities {
                dynamic_registration: Some(false),
                content_format: Some(vec![MarkupKind::Markdown, MarkupKind::PlainText]),
            }),
            signature_help: Some(SignatureHelpClientCapabilities {
                dynamic_registration: Some(false),
                ..Default::default()
            }),
            definition: Some(GotoCapability {
                dynamic_registration: Some(false),
                link_support: Some(false),
            }),
            document_symbol: Some(DocumentSymbolClientCapabilities {
                dynamic_registration: Some(false),
                hierarchical_document_symbol_support: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }),
        window: Some(WindowClientCapabilities {
            work_done_progress: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn log_message(client_id: &str, params: &LogMessageParams) {
    let message = params.message.as_str();
    match params.typ {
        MessageType::ERROR => error!(target: TRACE_TARGET, client = client_id, "{message}"),
        MessageType::WARNING => warn!(target: TRACE_TARGET, client = client_id, "{message}"),
        MessageType::INFO => info!(target: TRACE_TARGET, client = client_id, "{message}"),
        _ => debug!(target: TRACE_TARGET, client = client_id, "{message}"),
    }
}

fn show_message(client_id: &str, params: &ShowMessageParams) {
    let message = params.message.as_str();
    match params.typ {
        MessageType::ERROR => error!(target: TRACE_TARGET, client = client_id, show = true, "{message}"),
        MessageType::WARNING => warn!(target: TRACE_TARGET, client = client_id, show = true, "{message}"),
        _ => info!(target: TRACE_TARGET, client = client_id, show = true, "{message}"),
    }
}

fn log_trace(client_id: &str, params: &LogTraceParams) {
    debug!(
        target: TRACE_TARGET,
        client = client_id,
        verbose = params.verbose.as_deref().unwrap_or_default(),
        "{}",
        params.message
    );
}

fn publish_diagnostics(client_id: &str, params: &PublishDiagnosticsParams) {
    debug!(
        target: TRACE_TARGET,
        client = client_id,
        uri = %params.uri,
        count = params.diagnostics.len(),
        "diagnostics published"
    );
}
