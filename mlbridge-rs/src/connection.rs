//! The single shared engine session.
//!
//! A [`SessionManager`] caches at most one [`Session`].  [`acquire`] hands
//! out the cached one while it reports connected and otherwise asks its
//! [`SessionFactory`] for a fresh one, under a lock so concurrent first
//! callers cannot start two engines.  Callers borrow the session per call
//! and never keep it.
//!
//! [`acquire`]: SessionManager::acquire

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::config::Options;
use crate::error::{Error, Result};
use crate::process::ProcessFactory;
use crate::transport::{Session, SessionConfig, SessionFactory};

/// Status messages reported by [`SessionManager::end_session`].
pub const SHUTDOWN_OK: &str = "MATLAB shutdown successful";
pub const SHUTDOWN_FAILED: &str = "MATLAB shutdown failed";
pub const NO_CONNECTION: &str = "No MATLAB connection detected.";

static GLOBAL: OnceLock<Arc<SessionManager>> = OnceLock::new();

pub struct SessionManager {
    factory: Box<dyn SessionFactory>,
    slot: Mutex<Option<Session>>,
}

impl SessionManager {
    pub fn new(factory: impl SessionFactory + 'static) -> Self {
        Self { factory: Box::new(factory), slot: Mutex::new(None) }
    }

    /// The process-wide manager, launching the configured bridge executable.
    pub fn global() -> Arc<SessionManager> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(SessionManager::new(ProcessFactory))))
    }

    fn slot(&self) -> MutexGuard<'_, Option<Session>> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Return the live session, connecting (or reconnecting) first if needed.
    ///
    /// `opts` is only consulted when a new session has to be created.
    pub fn acquire(&self, opts: &Options) -> Result<Session> {
        let mut slot = self.slot();
        if let Some(session) = slot.as_ref() {
            if session.is_connected() {
                return Ok(session.clone());
            }
            tracing::info!("engine session lost, reconnecting");
        }

        let config = SessionConfig::from(opts);
        tracing::debug!(?config, engine = %config.engine_command, "connecting to engine");
        let session = self.factory.connect(&config).map_err(|e| match e {
            Error::Connection(_) => e,
            other => Error::Connection(other.to_string()),
        })?;
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Whether a session is cached, connected or not.
    pub fn has_session(&self) -> bool {
        self.slot().is_some()
    }

    /// Drop the cached session and ask the engine to exit.
    ///
    /// Returns `Ok(false)` when there was no session to close.
    pub fn close(&self) -> Result<bool> {
        let Some(session) = self.slot().take() else {
            return Ok(false);
        };
        tracing::info!("closing engine session");
        session.exit()?;
        Ok(true)
    }

    /// [`close`](Self::close), reported as a one-line status message.
    pub fn end_session(&self) -> &'static str {
        match self.close() {
            Ok(true) => SHUTDOWN_OK,
            Ok(false) => NO_CONNECTION,
            Err(e) => {
                tracing::warn!("engine shutdown failed: {e}");
                SHUTDOWN_FAILED
            }
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("has_session", &self.has_session())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
