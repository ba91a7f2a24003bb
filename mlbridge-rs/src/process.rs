//! Engine sessions backed by a bridge child process.
//!
//! The bridge executable (by default `matlab-bridge`) starts or re-attaches
//! to an engine and relays [`wire`](crate::wire) messages over its stdin and
//! stdout.  The pipe I/O runs on a private current-thread tokio runtime so a
//! per-call timeout can be enforced while callers stay synchronous.

use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::runtime::Runtime;

use crate::error::{Error, Result};
use crate::transport::{Session, SessionConfig, SessionFactory, Transport};
use crate::value::{NumericArray, Value};
use crate::wire::{self, Request, Response};

// ── Pipe ──────────────────────────────────────────────────────────────────────

/// The child and its two ends.  Dropped (and the child killed) as soon as any
/// exchange fails, so a half-read response can never be mistaken for the
/// answer to the next request.
struct Pipe {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Pipe {
    async fn exchange(&mut self, line: &str) -> Result<String> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        let mut reply = String::new();
        if self.stdout.read_line(&mut reply).await? == 0 {
            return Err(Error::Invocation("engine bridge closed its output".into()));
        }
        Ok(reply)
    }
}

// ── ProcessTransport ──────────────────────────────────────────────────────────

/// A [`Transport`] speaking to a bridge child process.
///
/// Calls block the current thread on a private runtime, so they must not be
/// made from inside another tokio runtime; async callers go through
/// `spawn_blocking`.  Doing so anyway fails with [`Error::Connection`].
pub struct ProcessTransport {
    rt: Runtime,
    pipe: Mutex<Option<Pipe>>,
    timeout: Option<Duration>,
    inside_engine: bool,
}

impl ProcessTransport {
    /// Launch the bridge described by `config` and perform the handshake.
    pub fn spawn(config: &SessionConfig) -> Result<Self> {
        ensure_blocking_context()?;
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()
            .map_err(|e| Error::Connection(format!("cannot start I/O runtime: {e}")))?;

        let pipe = rt.block_on(async {
            let mut cmd = Command::new(&config.engine_command);
            cmd.args(&config.engine_args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .kill_on_drop(true);

            let mut child = cmd.spawn().map_err(|e| {
                Error::Connection(format!("cannot launch '{}': {e}", config.engine_command))
            })?;
            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| Error::Connection("bridge has no stdin".into()))?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| Error::Connection("bridge has no stdout".into()))?;

            Ok::<_, Error>(Pipe { child, stdin, stdout: BufReader::new(stdout) })
        })?;

        let transport = Self {
            rt,
            pipe: Mutex::new(Some(pipe)),
            timeout: config.timeout,
            inside_engine: false,
        };

        match transport.request(&Request::Hello { config })? {
            Response::Ready { inside_engine, version } => {
                tracing::info!(
                    engine = %config.engine_command,
                    version = version.as_deref().unwrap_or("unknown"),
                    inside_engine,
                    "engine session ready"
                );
                Ok(Self { inside_engine, ..transport })
            }
            Response::Error { message } => Err(Error::Connection(message)),
            other => Err(Error::Connection(format!("unexpected handshake reply: {other:?}"))),
        }
    }

    /// Send one request and wait for its response.
    fn request(&self, req: &Request<'_>) -> Result<Response> {
        ensure_blocking_context()?;
        let line = wire::encode(req)?;
        let mut guard = self.pipe.lock().unwrap_or_else(|p| p.into_inner());
        let Some(pipe) = guard.as_mut() else {
            return Err(Error::Invocation("engine session is closed".into()));
        };

        let outcome = self.rt.block_on(async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, pipe.exchange(&line))
                    .await
                    .unwrap_or(Err(Error::Timeout(limit))),
                None => pipe.exchange(&line).await,
            }
        });

        match outcome.and_then(|reply| wire::decode(&reply)) {
            Ok(resp) => Ok(resp),
            Err(e) => {
                tracing::warn!("dropping engine pipe after failed exchange: {e}");
                *guard = None;
                Err(e)
            }
        }
    }
}

impl Transport for ProcessTransport {
    fn is_connected(&self) -> bool {
        let mut guard = self.pipe.lock().unwrap_or_else(|p| p.into_inner());
        match guard.as_mut() {
            Some(pipe) => matches!(pipe.child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn is_running_inside_engine(&self) -> bool {
        self.inside_engine
    }

    fn eval(&self, source: &str) -> Result<()> {
        self.request(&Request::Eval { source })?.into_unit()
    }

    fn returning_eval(&self, source: &str, nargout: usize) -> Result<Vec<Value>> {
        self.request(&Request::ReturningEval { source, nargout })?.into_values()
    }

    fn get_variable(&self, name: &str) -> Result<Value> {
        self.request(&Request::GetVariable { name })?.into_value()
    }

    fn set_variable(&self, name: &str, value: &Value) -> Result<()> {
        if let Value::Host(h) = value {
            return Err(Error::Invocation(format!(
                "cannot send {} to an out-of-process engine; convert it to a numeric array",
                h.type_name()
            )));
        }
        self.request(&Request::SetVariable { name, value })?.into_unit()
    }

    fn get_numeric_array(&self, name: &str) -> Result<NumericArray> {
        self.request(&Request::GetArray { name })?.into_array()
    }

    fn set_numeric_array(&self, name: &str, array: &NumericArray) -> Result<()> {
        self.request(&Request::SetArray { name, array })?.into_unit()
    }

    fn eval_indirect(&self, var: &str) -> Result<()> {
        self.request(&Request::EvalIndirect { var, nargout: None })?.into_unit()
    }

    fn returning_eval_indirect(&self, var: &str, nargout: usize) -> Result<Vec<Value>> {
        self.request(&Request::EvalIndirect { var, nargout: Some(nargout) })?
            .into_values()
    }

    fn exit(&self) -> Result<()> {
        ensure_blocking_context()?;
        let result = self.request(&Request::Exit).and_then(Response::into_unit);
        let mut guard = self.pipe.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(mut pipe) = guard.take() {
            // Give the bridge a moment to leave on its own before killing it.
            let limit = self.timeout.unwrap_or(Duration::from_secs(5));
            let exited = self
                .rt
                .block_on(async { tokio::time::timeout(limit, pipe.child.wait()).await });
            if exited.is_err() {
                let _ = self.rt.block_on(pipe.child.kill());
            }
        }
        result
    }
}

/// `Runtime::block_on` panics when the thread already drives a runtime.
fn ensure_blocking_context() -> Result<()> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(Error::Connection(
            "engine calls block; make them outside the async runtime (e.g. spawn_blocking)".into(),
        ));
    }
    Ok(())
}

// ── ProcessFactory ────────────────────────────────────────────────────────────

/// [`SessionFactory`] that launches the configured bridge executable.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessFactory;

impl SessionFactory for ProcessFactory {
    fn connect(&self, config: &SessionConfig) -> Result<Session> {
        let transport = ProcessTransport::spawn(config).map_err(|e| match e {
            Error::Connection(_) => e,
            other => Error::Connection(other.to_string()),
        })?;
        Ok(std::sync::Arc::new(transport))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
