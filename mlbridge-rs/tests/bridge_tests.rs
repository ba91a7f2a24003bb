//! Bridge behaviour through the public API, against the loopback workspace.

use std::sync::Arc;

use mlbridge::commands::{CommandService, CommandSet};
use mlbridge::loopback::LoopbackFactory;
use mlbridge::script::TEMP_PREFIX;
use mlbridge::{Bindings, Error, Language, NumericArray, Options, ScriptEngine, SessionManager, Value};

// ── Helpers ───────────────────────────────────────────────────────────────────

struct Bridge {
    factory: LoopbackFactory,
    sessions: Arc<SessionManager>,
    engine: ScriptEngine,
}

fn bridge() -> Bridge {
    let factory = LoopbackFactory::new();
    let sessions = Arc::new(SessionManager::new(factory.clone()));
    let bindings = Bindings::new(Arc::clone(&sessions), Options::default().shared());
    Bridge { factory, sessions, engine: Language::script_engine(bindings) }
}

impl Bridge {
    fn bindings(&self) -> &Bindings {
        self.engine.bindings()
    }

    fn snapshot(&self) -> Vec<String> {
        let ws = self.factory.workspace();
        let ws = ws.lock().unwrap();
        ws.keys().cloned().collect()
    }
}

// ── Script evaluation ─────────────────────────────────────────────────────────

#[test]
fn comment_only_scripts_leave_workspace_unchanged() {
    let b = bridge();
    b.bindings().put("keep", Value::from(1)).unwrap();
    let before = b.snapshot();

    assert_eq!(b.engine.eval("% one\n% two\n   % three").unwrap(), None);
    assert_eq!(b.engine.eval("%{\nx = 1;\n%}").unwrap(), None);
    assert_eq!(b.snapshot(), before);
}

#[test]
fn simple_expression() {
    let b = bridge();
    assert_eq!(b.engine.eval("(1+2)").unwrap(), Some(Value::from(vec![3.0])));
}

#[test]
fn continuation_equals_single_line() {
    let b = bridge();
    let split = b.engine.eval("(1+...\n2)").unwrap();
    assert_eq!(split, b.engine.eval("(1+2)").unwrap());
    assert_eq!(split, Some(Value::from(vec![3.0])));
}

#[test]
fn if_else_with_interleaved_comments() {
    let b = bridge();
    let script = "\
a = 1;
% decide which branch runs
if a == 1 % the interesting one
    % comment inside the branch
    testVar = 42;
else
    testVar = 0; % never
end
% trailing comment
";
    assert_eq!(b.engine.eval(script).unwrap(), None);
    assert_eq!(b.bindings().get("testVar").unwrap(), Some(Value::from(vec![42.0])));
}

#[test]
fn temporary_variables_are_always_cleared() {
    let b = bridge();
    b.engine.eval("x = 1;").unwrap();
    b.engine.eval("(x)").unwrap();
    b.engine.eval("x = missing_thing;").unwrap_err();
    assert!(b.snapshot().iter().all(|k| !k.starts_with(TEMP_PREFIX)), "{:?}", b.snapshot());
}

#[test]
fn loop_results_land_in_the_workspace() {
    let b = bridge();
    b.engine
        .eval("total = 0;\nfor k = 1:4 % sum up\n  total = total + k;\nend")
        .unwrap();
    assert_eq!(b.bindings().get("total").unwrap(), Some(Value::from(vec![10.0])));
}

#[test]
fn evaluation_error_is_typed_and_non_fatal() {
    let b = bridge();
    let err = b.engine.eval("y = 1 +* 2;").unwrap_err();
    assert!(matches!(err, Error::Invocation(_)), "{err:?}");
    assert!(!err.is_fatal());
    assert_eq!(b.engine.eval("(4)").unwrap(), Some(Value::from(vec![4.0])));
}

// ── Variable bridge ───────────────────────────────────────────────────────────

#[test]
fn put_then_get() {
    let b = bridge();
    b.bindings().put("hello", Value::from(17)).unwrap();
    assert_eq!(b.bindings().get("hello").unwrap(), Some(Value::from(vec![17.0])));
}

#[test]
fn clear_empties_everything() {
    let b = bridge();
    b.bindings().put("hello", Value::from(17)).unwrap();
    b.bindings().put("name", Value::from("x")).unwrap();
    assert_eq!(b.bindings().len().unwrap(), 2);

    b.bindings().clear().unwrap();
    assert!(b.bindings().keys().unwrap().is_empty());
    assert_eq!(b.bindings().get("hello").unwrap(), None);
}

#[test]
fn matrix_shape_survives_a_round_trip() {
    let b = bridge();
    let m = NumericArray::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
    b.bindings().put("m", Value::Numeric(m.clone())).unwrap();
    assert_eq!(b.bindings().get("m").unwrap(), Some(Value::Numeric(m)));
    assert_eq!(b.engine.eval("size(m)").unwrap(), Some(Value::from(vec![2.0, 3.0])));
}

#[test]
fn script_sees_bound_variables() {
    let b = bridge();
    b.bindings().put("n", Value::from(6)).unwrap();
    b.engine.eval("half = n / 2;").unwrap();
    assert_eq!(b.bindings().get("half").unwrap(), Some(Value::from(vec![3.0])));
}

#[test]
fn invalid_names_are_sanitized_consistently() {
    let b = bridge();
    b.bindings().put("my-var", Value::from(2)).unwrap();
    assert!(b.bindings().contains_key("my var").unwrap());
    assert_eq!(b.engine.eval("(my_var)").unwrap(), Some(Value::from(vec![2.0])));
}

// ── Sessions ──────────────────────────────────────────────────────────────────

#[test]
fn session_is_shared_and_reconnects() {
    let b = bridge();
    b.engine.eval("x = 1;").unwrap();
    b.bindings().get("x").unwrap();
    assert_eq!(b.factory.connects(), 1);

    assert!(b.sessions.close().unwrap());
    assert_eq!(b.bindings().get("x").unwrap(), Some(Value::from(vec![1.0])));
    assert_eq!(b.factory.connects(), 2);
}

#[test]
fn unavailable_engine_is_fatal_everywhere() {
    let b = bridge();
    b.factory.set_unavailable(true);
    assert!(b.engine.eval("x = 1;").unwrap_err().is_fatal());
    assert!(b.bindings().get("x").unwrap_err().is_fatal());
    assert!(b.bindings().put("x", Value::from(1)).unwrap_err().is_fatal());
}

// ── Command plugins ───────────────────────────────────────────────────────────

struct Greeter;

impl CommandSet for Greeter {
    fn name(&self) -> &str {
        "greeter"
    }
    fn usage(&self) -> &str {
        "greeter.hello(name)\n"
    }
}

#[test]
fn command_sets_are_published_through_the_engine() {
    let factory = LoopbackFactory::new().inside_engine(true);
    let sessions = Arc::new(SessionManager::new(factory.clone()));
    let engine = ScriptEngine::new(Bindings::new(sessions, Options::default().shared()));

    let registry: Vec<Arc<dyn CommandSet>> = vec![Arc::new(Greeter)];
    let service = CommandService::new(registry);
    service.initialize_commands(&engine).unwrap();

    let published = engine.get("greeter").unwrap().unwrap();
    assert!(published.as_host().is_some(), "{published:?}");

    service.dispose(&engine).unwrap();
    assert_eq!(engine.get("greeter").unwrap(), Some(Value::Empty));
}
