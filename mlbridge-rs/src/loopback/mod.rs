//! An in-process engine workspace.
//!
//! [`LoopbackTransport`] interprets a small MATLAB subset against a map of
//! variables so the bridge can run without an engine: `mlbridge -n` uses it
//! for dry runs, and the test suite uses it throughout.
//!
//! Variable reads mimic the engine's plain channel: a numeric array comes
//! back flattened to a row, and only the typed array channel preserves its
//! shape.

mod expr;
mod interp;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::transport::{Session, SessionConfig, SessionFactory, Transport};
use crate::value::{NumericArray, Value};

pub use interp::Workspace;
use interp::Fault;

/// Workspace storage shared by every session of one [`LoopbackFactory`].
pub type SharedWorkspace = Arc<Mutex<Workspace>>;

impl From<Fault> for Error {
    fn from(f: Fault) -> Self {
        match f {
            Fault::NoResult => Error::NoResult,
            Fault::Error(msg) => Error::Invocation(msg),
        }
    }
}

// ── LoopbackTransport ─────────────────────────────────────────────────────────

pub struct LoopbackTransport {
    workspace: SharedWorkspace,
    connected: AtomicBool,
    inside_engine: bool,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    /// A session over a fresh, empty workspace.
    pub fn new() -> Self {
        Self::with_workspace(SharedWorkspace::default())
    }

    pub fn with_workspace(workspace: SharedWorkspace) -> Self {
        Self { workspace, connected: AtomicBool::new(true), inside_engine: false }
    }

    /// Pretend to run inside the engine, so host objects may be stored.
    pub fn inside_engine(mut self, yes: bool) -> Self {
        self.inside_engine = yes;
        self
    }

    fn workspace(&self) -> Result<MutexGuard<'_, Workspace>> {
        if !self.is_connected() {
            return Err(Error::Invocation("engine session is closed".into()));
        }
        Ok(self.workspace.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

impl Transport for LoopbackTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn is_running_inside_engine(&self) -> bool {
        self.inside_engine
    }

    fn eval(&self, source: &str) -> Result<()> {
        tracing::trace!(source, "loopback eval");
        let mut ws = self.workspace()?;
        interp::run(&mut ws, source)?;
        Ok(())
    }

    fn returning_eval(&self, source: &str, nargout: usize) -> Result<Vec<Value>> {
        tracing::trace!(source, nargout, "loopback returning eval");
        let mut ws = self.workspace()?;
        if nargout == 0 {
            interp::run(&mut ws, source)?;
            return Ok(Vec::new());
        }
        Ok(vec![interp::run_returning(&mut ws, source)?])
    }

    fn get_variable(&self, name: &str) -> Result<Value> {
        match self.workspace()?.get(name) {
            Some(Value::Numeric(a)) => Ok(Value::Numeric(a.flattened())),
            Some(v) => Ok(v.clone()),
            None => Err(Error::Invocation(format!("Undefined variable '{name}'."))),
        }
    }

    fn set_variable(&self, name: &str, value: &Value) -> Result<()> {
        let stored = match value {
            Value::Scalar(x) => Value::Numeric(NumericArray::scalar(*x)),
            other => other.clone(),
        };
        self.workspace()?.insert(name.to_owned(), stored);
        Ok(())
    }

    fn get_numeric_array(&self, name: &str) -> Result<NumericArray> {
        match self.workspace()?.get(name) {
            Some(Value::Numeric(a)) => Ok(a.clone()),
            Some(Value::Scalar(x)) => Ok(NumericArray::scalar(*x)),
            Some(other) => Err(Error::Invocation(format!(
                "'{name}' is {}, not a double array",
                other.type_name()
            ))),
            None => Err(Error::Invocation(format!("Undefined variable '{name}'."))),
        }
    }

    fn set_numeric_array(&self, name: &str, array: &NumericArray) -> Result<()> {
        self.workspace()?
            .insert(name.to_owned(), Value::Numeric(array.clone()));
        Ok(())
    }

    fn exit(&self) -> Result<()> {
        if self.connected.swap(false, Ordering::AcqRel) {
            Ok(())
        } else {
            Err(Error::Invocation("engine session is closed".into()))
        }
    }
}

// ── LoopbackFactory ───────────────────────────────────────────────────────────

/// Hands out loopback sessions over one shared workspace, the way a real
/// engine keeps its workspace when a previously controlled session is
/// re-attached.
///
/// Clones share the workspace and the connection counter.
#[derive(Clone, Default)]
pub struct LoopbackFactory {
    workspace: SharedWorkspace,
    connects: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
    inside_engine: bool,
}

impl LoopbackFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions from this factory report running inside the engine.
    pub fn inside_engine(mut self, yes: bool) -> Self {
        self.inside_engine = yes;
        self
    }

    /// Number of sessions created so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::Acquire)
    }

    /// Make further `connect` calls fail, as if no engine could be started.
    pub fn set_unavailable(&self, yes: bool) {
        self.unavailable.store(yes, Ordering::Release);
    }

    pub fn workspace(&self) -> SharedWorkspace {
        Arc::clone(&self.workspace)
    }
}

impl SessionFactory for LoopbackFactory {
    fn connect(&self, config: &SessionConfig) -> Result<Session> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(Error::Connection("loopback engine unavailable".into()));
        }
        if !config.use_previous_session {
            self.workspace.lock().unwrap_or_else(|p| p.into_inner()).clear();
        }
        self.connects.fetch_add(1, Ordering::AcqRel);
        let transport = LoopbackTransport::with_workspace(self.workspace())
            .inside_engine(self.inside_engine);
        Ok(Arc::new(transport))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
