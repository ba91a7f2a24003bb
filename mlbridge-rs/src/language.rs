//! Descriptor for the MATLAB scripting language as exposed by this bridge.

use std::path::Path;

use crate::bindings::Bindings;
use crate::engine::ScriptEngine;
use crate::value::{NumericArray, Value};

pub struct Language;

impl Language {
    pub const NAME: &'static str = "MATLAB";
    pub const EXTENSIONS: &'static [&'static str] = &["m"];

    /// Type aliases scripts may use for bridged values.
    pub const ALIASES: &'static [(&'static str, &'static str)] = &[("matrix", "NumericArray")];

    /// Whether `path` names a script in this language.
    pub fn handles(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| Self::EXTENSIONS.contains(&e))
    }

    /// Turn the result list of an evaluation into one value.
    ///
    /// No results is `None`; a single result is unwrapped; several are
    /// returned as a [`Value::List`].
    pub fn decode(mut values: Vec<Value>) -> Option<Value> {
        match values.len() {
            0 => None,
            1 => values.pop(),
            _ => Some(Value::List(values)),
        }
    }

    /// Convert `value` to the type named by `alias`.
    ///
    /// Returns `None` for an unknown alias or a value that does not convert.
    pub fn coerce(alias: &str, value: &Value) -> Option<Value> {
        match alias {
            "matrix" => NumericArray::try_from(value)
                .ok()
                .or_else(|| value.as_f64().map(NumericArray::scalar))
                .map(Value::Numeric),
            _ => None,
        }
    }

    pub fn script_engine(bindings: Bindings) -> ScriptEngine {
        ScriptEngine::new(bindings)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
