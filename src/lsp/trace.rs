//! Post-start trace negotiation.
//!
//! The wflang server ignores the `trace` field of `initialize`; only an
//! explicit `$/setTrace` notification sent after the handshake changes its
//! verbosity. This runs as a hook once the session reports `Running`, so it
//! can be switched off when the server honours the initial setting.

use lsp_types::TraceValue;
use tracing::{debug, warn};

use super::session::{Session, SessionState};

/// Sends the trace override to a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceNegotiator {
    value: TraceValue,
}

impl TraceNegotiator {
    /// Negotiator forcing `verbose`.
    pub fn verbose() -> Self {
        Self {
            value: TraceValue::Verbose,
        }
    }

    /// The value sent.
    pub fn value(&self) -> TraceValue {
        self.value
    }

    /// Sends `$/setTrace` once if the session is running.
    ///
    /// Best effort: failures are logged and reported as `false`, never
    /// raised.
    pub fn negotiate<S: Session>(&self, session: &S) -> bool {
        let state = session.state();
        if state != SessionState::Running {
            debug!(state = %state, "skipping trace override, session not running");
            return false;
        }

        match session.set_trace(self.value) {
            Ok(()) => {
                debug!(value = ?self.value, "sent trace override");
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to send trace override");
                false
            }
        }
    }
}

impl Default for TraceNegotiator {
    fn default() -> Self {
        Self::verbose()
    }
}

/// Forces verbose tracing on a running session.
pub fn force_verbose_trace<S: Session>(session: &S) -> bool {
    TraceNegotiator::verbose().negotiate(session)
}
