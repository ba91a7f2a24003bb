//! Host command plugins published into the engine workspace.
//!
//! A host application registers [`CommandSet`]s; the [`CommandService`]
//! exposes each one as a host-object variable named after the set, so
//! scripts can reach it, and produces the combined usage text.

use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::value::{HostObject, Value};

/// Header of [`CommandService::command_help`].
pub const HELP_HEADER: &str = "--- MATLAB Command Plugins ---\n\n";

pub trait CommandSet: Send + Sync {
    /// Variable name the set is published under.
    fn name(&self) -> &str;
    fn usage(&self) -> &str;
}

/// Source of the command sets to publish.
pub trait CommandRegistry {
    fn command_sets(&self) -> Vec<Arc<dyn CommandSet>>;
}

impl CommandRegistry for Vec<Arc<dyn CommandSet>> {
    fn command_sets(&self) -> Vec<Arc<dyn CommandSet>> {
        self.clone()
    }
}

/// Something that can create workspace variables.
pub trait VariableSink {
    fn make_variable(&self, name: &str, value: Value) -> Result<()>;
}

pub struct CommandService<R> {
    registry: R,
    initialized: Mutex<bool>,
}

impl<R: CommandRegistry> CommandService<R> {
    pub fn new(registry: R) -> Self {
        Self { registry, initialized: Mutex::new(false) }
    }

    pub fn is_initialized(&self) -> bool {
        *self.initialized.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn command_help(&self) -> String {
        let mut help = String::from(HELP_HEADER);
        for set in self.registry.command_sets() {
            help.push_str(set.usage());
        }
        help.push('\n');
        help
    }

    /// Publish every command set into `sink`.  Runs once; later calls are
    /// no-ops until [`dispose`](Self::dispose).
    ///
    /// A set that cannot be published is logged and skipped unless the
    /// failure is fatal.
    pub fn initialize_commands(&self, sink: &dyn VariableSink) -> Result<()> {
        let mut initialized = self.initialized.lock().unwrap_or_else(|p| p.into_inner());
        if *initialized {
            return Ok(());
        }
        for set in self.registry.command_sets() {
            let name = set.name().to_owned();
            match sink.make_variable(&name, Value::Host(HostObject::new(set))) {
                Ok(()) => tracing::debug!("published command set {name}"),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::warn!("could not publish command set {name}: {e}"),
            }
        }
        *initialized = true;
        Ok(())
    }

    /// Overwrite every published command variable with an empty value.
    pub fn dispose(&self, sink: &dyn VariableSink) -> Result<()> {
        let mut initialized = self.initialized.lock().unwrap_or_else(|p| p.into_inner());
        if !*initialized {
            return Ok(());
        }
        for set in self.registry.command_sets() {
            if let Err(e) = sink.make_variable(set.name(), Value::Empty) {
                if e.is_fatal() {
                    return Err(e);
                }
                tracing::warn!("could not dispose command set {}: {e}", set.name());
            }
        }
        *initialized = false;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::BTreeMap;

    struct Plot;

    impl CommandSet for Plot {
        fn name(&self) -> &str {
            "plot"
        }
        fn usage(&self) -> &str {
            "plot.draw(x) - draw x\n"
        }
    }

    struct Stats;

    impl CommandSet for Stats {
        fn name(&self) -> &str {
            "stats"
        }
        fn usage(&self) -> &str {
            "stats.mean(x) - average of x\n"
        }
    }

    #[derive(Default)]
    struct Recorder {
        vars: Mutex<BTreeMap<String, Value>>,
        writes: Mutex<usize>,
        fail: Option<fn() -> Error>,
    }

    impl VariableSink for Recorder {
        fn make_variable(&self, name: &str, value: Value) -> Result<()> {
            if let Some(fail) = self.fail {
                return Err(fail());
            }
            *self.writes.lock().unwrap() += 1;
            self.vars.lock().unwrap().insert(name.to_owned(), value);
            Ok(())
        }
    }

    fn registry() -> Vec<Arc<dyn CommandSet>> {
        vec![Arc::new(Plot), Arc::new(Stats)]
    }

    #[test]
    fn help_concatenates_usages() {
        let svc = CommandService::new(registry());
        assert_eq!(
            svc.command_help(),
            "--- MATLAB Command Plugins ---\n\nplot.draw(x) - draw x\nstats.mean(x) - average of x\n\n"
        );
    }

    #[test]
    fn initialize_publishes_host_objects_once() {
        let svc = CommandService::new(registry());
        let sink = Recorder::default();
        svc.initialize_commands(&sink).unwrap();
        svc.initialize_commands(&sink).unwrap();
        assert!(svc.is_initialized());
        assert_eq!(*sink.writes.lock().unwrap(), 2);

        let vars = sink.vars.lock().unwrap();
        let plot = vars["plot"].as_host().unwrap();
        let set = plot.downcast_ref::<Arc<dyn CommandSet>>().unwrap();
        assert_eq!(set.name(), "plot");
    }

    #[test]
    fn dispose_empties_variables() {
        let svc = CommandService::new(registry());
        let sink = Recorder::default();
        svc.dispose(&sink).unwrap();
        assert_eq!(*sink.writes.lock().unwrap(), 0);

        svc.initialize_commands(&sink).unwrap();
        svc.dispose(&sink).unwrap();
        assert!(!svc.is_initialized());
        let vars = sink.vars.lock().unwrap();
        assert_eq!(vars["plot"], Value::Empty);
        assert_eq!(vars["stats"], Value::Empty);
    }

    #[test]
    fn non_fatal_failures_are_skipped() {
        let svc = CommandService::new(registry());
        let sink = Recorder { fail: Some(|| Error::Invocation("nope".into())), ..Default::default() };
        svc.initialize_commands(&sink).unwrap();
        assert!(svc.is_initialized());
    }

    #[test]
    fn fatal_failures_propagate() {
        let svc = CommandService::new(registry());
        let sink = Recorder { fail: Some(|| Error::Connection("down".into())), ..Default::default() };
        assert!(svc.initialize_commands(&sink).unwrap_err().is_fatal());
        assert!(!svc.is_initialized());
    }
}
