//! The engine workspace as a key/value store.
//!
//! | Operation | Remote calls |
//! |-----------|--------------|
//! | `keys` | `who` with one result |
//! | `get` | `who`, read; for arrays also `k = double(k);` and a typed read |
//! | `put` | typed array write, or plain variable write |
//! | `remove` | as `get`, then `clear k` |
//! | `clear` | `clear` |
//!
//! A plain variable read flattens numeric arrays, so `get` re-reads array
//! values through the typed channel to recover their shape.
//!
//! Every operation acquires the session through the [`SessionManager`], so a
//! lost engine is reconnected transparently.  Remote failures come back as
//! [`Error`] values and are logged; they never panic.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::{Options, SharedOptions};
use crate::connection::SessionManager;
use crate::error::{Error, Result};
use crate::transport::Session;
use crate::value::{NumericArray, Value};

/// Key under which the host stores its scripting context.
///
/// When the bridge is not running inside the engine the context cannot be
/// sent across, so it is kept here instead.
pub const SCRIPT_CONTEXT_KEY: &str = "mlbridge.script_context";

/// Replace every character that cannot appear in an engine identifier with
/// `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

pub struct Bindings {
    sessions: Arc<SessionManager>,
    options: SharedOptions,
    host_cache: Mutex<Option<Value>>,
}

impl Bindings {
    pub fn new(sessions: Arc<SessionManager>, options: SharedOptions) -> Self {
        Self { sessions, options, host_cache: Mutex::new(None) }
    }

    /// Bindings over the process-wide session.
    pub fn global(options: SharedOptions) -> Self {
        Self::new(SessionManager::global(), options)
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn options(&self) -> &SharedOptions {
        &self.options
    }

    pub(crate) fn session(&self) -> Result<Session> {
        let opts: Options = self
            .options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.sessions.acquire(&opts)
    }

    fn host_cache(&self) -> MutexGuard<'_, Option<Value>> {
        self.host_cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `name` is the script context and it is held in this process
    /// rather than in the workspace.
    fn holds_context(&self, session: &Session, name: &str) -> bool {
        name == SCRIPT_CONTEXT_KEY
            && !session.is_running_inside_engine()
            && self.host_cache().is_some()
    }

    // ── Mapping ───────────────────────────────────────────────────────────────

    pub fn len(&self) -> Result<usize> {
        Ok(self.keys()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.keys()?.is_empty())
    }

    pub fn contains_key(&self, name: &str) -> Result<bool> {
        let session = self.session()?;
        if self.holds_context(&session, name) {
            return Ok(true);
        }
        Ok(remote_keys(&session)?.contains(&sanitize(name)))
    }

    pub fn contains_value(&self, value: &Value) -> Result<bool> {
        Ok(self.values()?.iter().any(|v| v == value))
    }

    /// Names of all workspace variables, plus [`SCRIPT_CONTEXT_KEY`] while a
    /// host context is cached.
    pub fn keys(&self) -> Result<BTreeSet<String>> {
        let session = self.session()?;
        let mut keys = remote_keys(&session)?;
        if self.host_cache().is_some() {
            keys.insert(SCRIPT_CONTEXT_KEY.to_owned());
        }
        Ok(keys)
    }

    pub fn values(&self) -> Result<Vec<Value>> {
        Ok(self.entries()?.into_iter().map(|(_, v)| v).collect())
    }

    pub fn entries(&self) -> Result<Vec<(String, Value)>> {
        let mut out = Vec::new();
        for key in self.keys()? {
            if let Some(v) = self.get(&key)? {
                out.push((key, v));
            }
        }
        Ok(out)
    }

    /// Read a variable, recovering array shape.  `Ok(None)` if it does not
    /// exist.
    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        let session = self.session()?;
        if self.holds_context(&session, name) {
            return Ok(self.host_cache().clone());
        }
        let name = sanitize(name);
        if !remote_keys(&session)?.contains(&name) {
            return Ok(None);
        }

        let raw = session.get_variable(&name).inspect_err(|e| {
            tracing::warn!("reading '{name}' failed: {e}");
        })?;
        if !raw.is_array() {
            return Ok(Some(raw));
        }

        match recover_array(&session, &name) {
            Ok(array) => Ok(Some(Value::Numeric(array))),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!("shape recovery for '{name}' failed, using flat value: {e}");
                Ok(Some(raw))
            }
        }
    }

    /// Write a variable.  Numeric arrays go through the typed channel so the
    /// engine sees their real shape.
    pub fn put(&self, name: &str, value: Value) -> Result<()> {
        let session = self.session()?;
        if name == SCRIPT_CONTEXT_KEY
            && matches!(value, Value::Host(_))
            && !session.is_running_inside_engine()
        {
            *self.host_cache() = Some(value);
            return Ok(());
        }
        if name == SCRIPT_CONTEXT_KEY {
            // A remote write replaces whatever context was held locally.
            *self.host_cache() = None;
        }

        let name = sanitize(name);
        if let Ok(array) = NumericArray::try_from(&value) {
            tracing::debug!(name = %name, dims = ?array.dims(), "typed array write");
            match session.set_numeric_array(&name, &array) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::warn!("typed write of '{name}' failed, retrying as plain value: {e}"),
            }
        }

        tracing::debug!(name = %name, kind = value.type_name(), "variable write");
        session.set_variable(&name, &value).inspect_err(|e| {
            tracing::warn!("could not bind '{name}': {e}");
        })
    }

    /// Put every entry, skipping (and logging) those the engine rejects.
    ///
    /// Returns the number of entries bound.  A lost connection aborts.
    pub fn put_all<I, K>(&self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut bound = 0;
        for (name, value) in entries {
            match self.put(name.as_ref(), value) {
                Ok(()) => bound += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => {}
            }
        }
        Ok(bound)
    }

    /// Delete a variable, returning its value from just before.
    pub fn remove(&self, name: &str) -> Result<Option<Value>> {
        let session = self.session()?;
        if self.holds_context(&session, name) {
            return Ok(self.host_cache().take());
        }
        let previous = self.get(name)?;
        if previous.is_some() {
            let name = sanitize(name);
            if let Err(e) = session.eval(&format!("clear {name}")) {
                if e.is_fatal() {
                    return Err(e);
                }
                tracing::warn!("clearing '{name}' failed: {e}");
            }
        }
        Ok(previous)
    }

    /// Wipe the whole workspace.
    ///
    /// Not synchronized with evaluations running on other threads: their
    /// temporary script variables are wiped too.
    pub fn clear(&self) -> Result<()> {
        let session = self.session()?;
        *self.host_cache() = None;
        session.eval("clear").inspect_err(|e| {
            tracing::warn!("clearing the workspace failed: {e}");
        })
    }
}

impl std::fmt::Debug for Bindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bindings")
            .field("sessions", &self.sessions)
            .field("host_cache", &self.host_cache().is_some())
            .finish()
    }
}

/// `who`, as a set.
fn remote_keys(session: &Session) -> Result<BTreeSet<String>> {
    let values = match session.returning_eval("who", 1) {
        Ok(values) => values,
        // Some engines answer `who` on an empty workspace with nothing at all.
        Err(Error::NoResult) => return Ok(BTreeSet::new()),
        Err(e) => {
            tracing::warn!("listing variables failed: {e}");
            return Err(e);
        }
    };
    match values.into_iter().next() {
        None | Some(Value::Empty) => Ok(BTreeSet::new()),
        Some(Value::TextList(names)) => Ok(names.into_iter().collect()),
        Some(Value::Text(name)) => Ok(BTreeSet::from([name])),
        Some(Value::List(items)) => items
            .into_iter()
            .map(|v| match v {
                Value::Text(s) => Ok(s),
                other => Err(Error::Protocol(format!(
                    "'who' listed a {} instead of a name",
                    other.type_name()
                ))),
            })
            .collect(),
        Some(other) => Err(Error::Protocol(format!(
            "'who' returned {} instead of names",
            other.type_name()
        ))),
    }
}

/// Coerce `name` to doubles in place and read it back with its dimensions.
fn recover_array(session: &Session, name: &str) -> Result<NumericArray> {
    session.eval(&format!("{name} = double({name});"))?;
    let array = session.get_numeric_array(name)?;
    Ok(if array.is_scalar() { array.flattened() } else { array })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
