//! Error type shared by the session, bindings, and evaluator layers.
//!
//! Only [`Error::Connection`] is fatal: it means no engine session could be
//! established.  Every other variant describes a single remote call that went
//! wrong and leaves the session usable.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No session to the engine could be established or re-established.
    #[error("engine connection unavailable: {0}")]
    Connection(String),

    /// The engine rejected or failed a request.
    #[error("remote invocation failed: {0}")]
    Invocation(String),

    /// A returning evaluation produced no value (e.g. the script only assigns).
    #[error("evaluation produced no result")]
    NoResult,

    /// The engine did not answer within the configured timeout.
    #[error("engine did not respond within {0:?}")]
    Timeout(Duration),

    /// The engine answered with something that is not a valid response.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the engine is unreachable, as opposed to a
    /// single failed call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Protocol(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connection_is_fatal() {
        assert!(Error::Connection("down".into()).is_fatal());
        assert!(!Error::Invocation("bad".into()).is_fatal());
        assert!(!Error::NoResult.is_fatal());
        assert!(!Error::Timeout(Duration::from_secs(1)).is_fatal());
    }

    #[test]
    fn json_errors_become_protocol_errors() {
        let e: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(e, Error::Protocol(_)));
    }
}
