//! The request/response boundary to the engine.
//!
//! Everything the bridge does is expressed through [`Transport`]: plain
//! evaluation, evaluation with ordinal results, variable reads and writes,
//! and a typed sub-channel for numeric arrays that preserves their shape.
//! [`ProcessTransport`](crate::process::ProcessTransport) talks to a real
//! engine; [`LoopbackTransport`](crate::loopback::LoopbackTransport) keeps an
//! in-process workspace.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::Options;
use crate::error::Result;
use crate::value::{NumericArray, Value};

/// One live session to the engine.
pub type Session = Arc<dyn Transport>;

/// Remote-invocation API of an engine session.
///
/// All calls block until the engine answers (or the transport's timeout
/// fires).  Implementations must be usable from several threads at once.
pub trait Transport: Send + Sync {
    /// Whether the session can still take requests.
    fn is_connected(&self) -> bool;

    /// Whether this process runs inside the engine itself, in which case host
    /// objects can be handed over directly.
    fn is_running_inside_engine(&self) -> bool {
        false
    }

    /// Evaluate source text, discarding any result.
    fn eval(&self, source: &str) -> Result<()>;

    /// Evaluate source text and return up to `nargout` ordinal results.
    ///
    /// Fails with [`Error::NoResult`](crate::Error::NoResult) when the source
    /// produces no value.
    fn returning_eval(&self, source: &str, nargout: usize) -> Result<Vec<Value>>;

    fn get_variable(&self, name: &str) -> Result<Value>;

    fn set_variable(&self, name: &str, value: &Value) -> Result<()>;

    /// Read a variable through the typed array channel.  The variable must
    /// already hold doubles.
    fn get_numeric_array(&self, name: &str) -> Result<NumericArray>;

    fn set_numeric_array(&self, name: &str, array: &NumericArray) -> Result<()>;

    /// Evaluate the text stored in variable `var`.
    ///
    /// Evaluating the bare name would only echo it; this runs its contents.
    fn eval_indirect(&self, var: &str) -> Result<()> {
        self.eval(&format!("eval({var})"))
    }

    /// As [`Self::eval_indirect`], returning up to `nargout` results.
    fn returning_eval_indirect(&self, var: &str, nargout: usize) -> Result<Vec<Value>> {
        self.returning_eval(&format!("eval({var})"), nargout)
    }

    /// Ask the engine to shut down.  The session is unusable afterwards.
    fn exit(&self) -> Result<()>;
}

/// Everything needed to start (or re-attach to) an engine session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    /// Re-attach to an engine this host controlled earlier instead of
    /// launching another one.
    pub use_previous_session: bool,
    pub single_computational_thread: bool,
    pub hidden: bool,
    pub license_file: Option<PathBuf>,
    #[serde(skip)]
    pub engine_command: String,
    #[serde(skip)]
    pub engine_args: Vec<String>,
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl From<&Options> for SessionConfig {
    fn from(opts: &Options) -> Self {
        Self {
            use_previous_session: true,
            single_computational_thread: !opts.multithreaded,
            hidden: opts.hidden,
            license_file: opts.license_path.clone(),
            engine_command: opts.engine_command.clone(),
            engine_args: opts.engine_args.clone(),
            timeout: opts.timeout,
        }
    }
}

/// Creates new sessions for the connection manager.
pub trait SessionFactory: Send + Sync {
    /// Establish a fresh session.  Failures must be
    /// [`Error::Connection`](crate::Error::Connection).
    fn connect(&self, config: &SessionConfig) -> Result<Session>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_options() {
        let opts = Options {
            hidden: true,
            multithreaded: false,
            license_path: Some(PathBuf::from("/opt/lic.dat")),
            ..Options::default()
        };
        let cfg = SessionConfig::from(&opts);
        assert!(cfg.use_previous_session);
        assert!(cfg.single_computational_thread);
        assert!(cfg.hidden);
        assert_eq!(cfg.license_file, Some(PathBuf::from("/opt/lic.dat")));
    }

    #[test]
    fn multithreaded_by_default() {
        let cfg = SessionConfig::from(&Options::default());
        assert!(!cfg.single_computational_thread);
        assert!(!cfg.hidden);
        assert!(cfg.license_file.is_none());
    }

    #[test]
    fn launch_details_stay_off_the_wire() {
        let cfg = SessionConfig::from(&Options::default());
        let json = serde_json::to_value(&cfg).unwrap();
        assert!(json.get("engine_command").is_none());
        assert!(json.get("timeout").is_none());
        assert_eq!(json["use_previous_session"], true);
    }
}
