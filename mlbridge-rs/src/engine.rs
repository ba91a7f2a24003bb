//! Script evaluation against the engine workspace.
//!
//! A script is folded into one command (see [`script`](crate::script)), the
//! command materializes the script text in a temporary variable, and the
//! variable's contents are evaluated indirectly:
//!
//! ```text
//! eval     mlbridge_script123456 = sprintf('...');
//! eval     eval(mlbridge_script123456)          one result requested
//!   └─ no result → eval(mlbridge_script123456)  without one
//! eval     clearvars mlbridge_script123456      always
//! ```

use std::io::BufRead;

use crate::bindings::Bindings;
use crate::commands::VariableSink;
use crate::error::{Error, Result};
use crate::language::Language;
use crate::script::{self, ScriptCommand};
use crate::transport::Session;
use crate::value::Value;

pub struct ScriptEngine {
    bindings: Bindings,
}

impl ScriptEngine {
    pub fn new(bindings: Bindings) -> Self {
        Self { bindings }
    }

    /// The variables this engine evaluates against.
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Run `script`, returning its value if it produced one.
    ///
    /// A script with no code in it makes no remote call and yields
    /// `Ok(None)`.
    pub fn eval(&self, script: &str) -> Result<Option<Value>> {
        self.run(script::fold(script))
    }

    /// As [`eval`](Self::eval), reading the script line by line.
    pub fn eval_reader<R: BufRead>(&self, reader: R) -> Result<Option<Value>> {
        let mut read_error = None;
        let folded = script::fold_lines(
            reader
                .lines()
                .map_while(|line| line.map_err(|e| read_error = Some(e)).ok()),
        );
        if let Some(e) = read_error {
            return Err(Error::Io(e));
        }
        self.run(folded)
    }

    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        self.bindings.get(name)
    }

    pub fn put(&self, name: &str, value: Value) -> Result<()> {
        self.bindings.put(name, value)
    }

    fn run(&self, folded: Option<ScriptCommand>) -> Result<Option<Value>> {
        let Some(cmd) = folded else {
            tracing::debug!("script has no code, nothing to evaluate");
            return Ok(None);
        };
        let session = self.bindings.session()?;

        tracing::debug!(var = cmd.var(), command = cmd.command(), "evaluating script");
        let outcome = evaluate(&session, &cmd);
        if let Err(e) = session.eval(&cmd.cleanup()) {
            tracing::warn!("could not clear {}: {e}", cmd.var());
        }

        match outcome {
            Ok(values) => Ok(Language::decode(values)),
            Err(e) => {
                tracing::warn!("script evaluation failed: {e}");
                Err(e)
            }
        }
    }
}

fn evaluate(session: &Session, cmd: &ScriptCommand) -> Result<Vec<Value>> {
    session.eval(cmd.command())?;
    match session.returning_eval_indirect(cmd.var(), 1) {
        Ok(values) => Ok(values),
        Err(Error::NoResult) => {
            session.eval_indirect(cmd.var())?;
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

impl VariableSink for ScriptEngine {
    fn make_variable(&self, name: &str, value: Value) -> Result<()> {
        self.put(name, value)
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine").field("bindings", &self.bindings).finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
