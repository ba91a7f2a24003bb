//! Line-delimited JSON messages exchanged with the engine bridge process.
//!
//! Each request is one JSON object on one line, tagged by `"op"`; the bridge
//! answers each with exactly one response line tagged by `"status"`:
//!
//! ```text
//! → {"op":"returning_eval","source":"(1+2)","nargout":1}
//! ← {"status":"ok","values":[{"type":"numeric","value":{"dims":[1,1],"real":[3.0]}}]}
//! → {"op":"eval","source":"x = 1"}
//! ← {"status":"ok"}
//! → {"op":"returning_eval","source":"x = 2","nargout":1}
//! ← {"status":"no_result"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transport::SessionConfig;
use crate::value::{NumericArray, Value};

/// Requests understood by the bridge.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request<'a> {
    /// First message on a fresh pipe; the bridge answers `ready`.
    Hello { config: &'a SessionConfig },
    Eval { source: &'a str },
    ReturningEval { source: &'a str, nargout: usize },
    /// Evaluate the contents of `var`; `nargout` of `None` means no result.
    EvalIndirect {
        var: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        nargout: Option<usize>,
    },
    GetVariable { name: &'a str },
    SetVariable { name: &'a str, value: &'a Value },
    GetArray { name: &'a str },
    SetArray { name: &'a str, array: &'a NumericArray },
    Exit,
}

/// Bridge responses.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ready {
        #[serde(default)]
        inside_engine: bool,
        #[serde(default)]
        version: Option<String>,
    },
    Ok {
        #[serde(default)]
        values: Vec<Value>,
        #[serde(default)]
        array: Option<NumericArray>,
    },
    NoResult,
    Error { message: String },
}

impl Response {
    /// Collapse `no_result` and `error` into the matching [`Error`].
    pub fn into_result(self) -> Result<Response> {
        match self {
            Response::NoResult => Err(Error::NoResult),
            Response::Error { message } => Err(Error::Invocation(message)),
            other => Ok(other),
        }
    }

    /// The ordinal values of an `ok` response.
    pub fn into_values(self) -> Result<Vec<Value>> {
        match self.into_result()? {
            Response::Ok { values, .. } => Ok(values),
            other => Err(unexpected(&other)),
        }
    }

    /// The single value of an `ok` response to a variable read.
    pub fn into_value(self) -> Result<Value> {
        let mut values = self.into_values()?;
        match values.len() {
            1 => Ok(values.remove(0)),
            n => Err(Error::Protocol(format!("expected 1 value, got {n}"))),
        }
    }

    /// The array of an `ok` response to a typed array read.
    pub fn into_array(self) -> Result<NumericArray> {
        match self.into_result()? {
            Response::Ok { array: Some(array), .. } => Ok(array),
            other => Err(unexpected(&other)),
        }
    }

    /// Accept any `ok` response.
    pub fn into_unit(self) -> Result<()> {
        match self.into_result()? {
            Response::Ok { .. } => Ok(()),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(resp: &Response) -> Error {
    Error::Protocol(format!("unexpected response: {resp:?}"))
}

/// Serialize a request as one line (including the trailing newline).
pub fn encode(req: &Request<'_>) -> Result<String> {
    let mut line = serde_json::to_string(req)?;
    line.push('\n');
    Ok(line)
}

/// Parse one response line.
pub fn decode(line: &str) -> Result<Response> {
    Ok(serde_json::from_str(line.trim_end())?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;

    #[test]
    fn encode_is_one_tagged_line() {
        let line = encode(&Request::ReturningEval { source: "(1+2)", nargout: 1 }).unwrap();
        assert_eq!(line, "{\"op\":\"returning_eval\",\"source\":\"(1+2)\",\"nargout\":1}\n");
    }

    #[test]
    fn encode_escapes_newlines() {
        let line = encode(&Request::Eval { source: "a = 1\nb = 2" }).unwrap();
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn eval_indirect_omits_missing_nargout() {
        let line = encode(&Request::EvalIndirect { var: "t", nargout: None }).unwrap();
        assert_eq!(line, "{\"op\":\"eval_indirect\",\"var\":\"t\"}\n");
    }

    #[test]
    fn exit_is_a_bare_op() {
        assert_eq!(encode(&Request::Exit).unwrap(), "{\"op\":\"exit\"}\n");
    }

    #[test]
    fn hello_carries_config() {
        let cfg = SessionConfig::from(&Options { hidden: true, ..Options::default() });
        let line = encode(&Request::Hello { config: &cfg }).unwrap();
        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["op"], "hello");
        assert_eq!(json["config"]["hidden"], true);
    }

    #[test]
    fn set_variable_carries_tagged_value() {
        let v = Value::Scalar(17.0);
        let line = encode(&Request::SetVariable { name: "hello", value: &v }).unwrap();
        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["value"]["type"], "scalar");
        assert_eq!(json["value"]["value"], 17.0);
    }

    #[test]
    fn decode_ok_with_values() {
        let resp = decode(
            r#"{"status":"ok","values":[{"type":"numeric","value":{"dims":[1,1],"real":[3.0]}}]}"#,
        )
        .unwrap();
        let v = resp.into_value().unwrap();
        assert_eq!(v, Value::Numeric(NumericArray::scalar(3.0)));
    }

    #[test]
    fn decode_bare_ok() {
        assert!(decode("{\"status\":\"ok\"}\n").unwrap().into_unit().is_ok());
    }

    #[test]
    fn no_result_and_error_map_to_errors() {
        assert!(matches!(
            decode(r#"{"status":"no_result"}"#).unwrap().into_values(),
            Err(Error::NoResult)
        ));
        match decode(r#"{"status":"error","message":"Undefined variable x"}"#)
            .unwrap()
            .into_unit()
        {
            Err(Error::Invocation(m)) => assert_eq!(m, "Undefined variable x"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn ready_defaults() {
        let resp = decode(r#"{"status":"ready"}"#).unwrap();
        assert_eq!(resp, Response::Ready { inside_engine: false, version: None });
    }

    #[test]
    fn garbage_is_a_protocol_error() {
        assert!(matches!(decode("MATLAB is starting..."), Err(Error::Protocol(_))));
    }

    #[test]
    fn array_missing_is_a_protocol_error() {
        let resp = decode(r#"{"status":"ok"}"#).unwrap();
        assert!(matches!(resp.into_array(), Err(Error::Protocol(_))));
    }
}
