//! Scripting bridge to a MATLAB engine.
//!
//! | Module | Role |
//! |--------|------|
//! | [`connection`] | the single cached engine session |
//! | [`bindings`] | the engine workspace as a key/value store |
//! | [`engine`] | multi-line script evaluation |
//! | [`script`] | folding a script into one command |
//! | [`transport`] | the remote-call interface a session implements |
//! | [`process`] | sessions backed by a bridge subprocess |
//! | [`loopback`] | an in-process workspace for dry runs and tests |

pub mod bindings;
pub mod cli;
pub mod commands;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod language;
pub mod loopback;
pub mod process;
pub mod script;
pub mod transport;
pub mod value;
pub mod wire;

pub use bindings::Bindings;
pub use config::Options;
pub use connection::SessionManager;
pub use engine::ScriptEngine;
pub use error::{Error, Result};
pub use language::Language;
pub use value::{NumericArray, Value};
