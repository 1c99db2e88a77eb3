use std::collections::HashMap;

use microjs::{Interp, InterpConfig, JsError, ModuleLoader};

// Initialize logger for this integration test binary so `RUST_LOG` is honored.
// Using `ctor` ensures initialization runs before tests start.
#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

struct MapLoader(HashMap<&'static str, &'static str>);

impl ModuleLoader for MapLoader {
    fn load(&mut self, name: &str) -> Option<Vec<u8>> {
        self.0.get(name).map(|s| s.as_bytes().to_vec())
    }
}

fn interp_with_modules(modules: &[(&'static str, &'static str)]) -> Interp {
    let mut interp = Interp::new(InterpConfig::default());
    interp.set_module_loader(Box::new(MapLoader(modules.iter().copied().collect())));
    interp
}

fn eval_str(interp: &mut Interp, code: &str) -> String {
    let v = interp.eval(code).expect("script evaluated");
    let s = interp.heap.format_value(v);
    interp.heap.put(v);
    s
}

#[test]
fn require_exposes_module_exports() {
    let mut interp = interp_with_modules(&[(
        "adder",
        "module.exports.add = function(a, b) { return a + b; };",
    )]);
    assert_eq!(eval_str(&mut interp, r#"var m = require("adder"); m.add(20, 22);"#), "42");
}

#[test]
fn module_scope_does_not_leak() {
    let mut interp = interp_with_modules(&[(
        "m",
        "var secret = 99; module.exports.ok = 1;",
    )]);
    assert_eq!(eval_str(&mut interp, r#"require("m").ok;"#), "1");
    let err = interp.eval("secret;").unwrap();
    assert_eq!(interp.heap.format_value(err), "undefined");
    interp.heap.put(err);
}

#[test]
fn modules_load_once() {
    let mut interp = interp_with_modules(&[(
        "counted",
        "loads = loads + 1; module.exports.n = loads;",
    )]);
    eval_str(&mut interp, "var loads = 0;");
    assert_eq!(
        eval_str(&mut interp, r#"require("counted").n + require("counted").n;"#),
        "2"
    );
    assert_eq!(eval_str(&mut interp, "loads;"), "1");
}

#[test]
fn missing_module_throws_in_script() {
    let mut interp = interp_with_modules(&[]);
    let err = interp.eval(r#"require("nope");"#).unwrap_err();
    assert_eq!(err.to_string(), "uncaught exception: Exception: Module not found");
}

#[test]
fn require_without_a_loader_throws() {
    let mut interp = Interp::new(InterpConfig::default());
    let err = interp.eval(r#"require("anything");"#).unwrap_err();
    assert_eq!(err.to_string(), "uncaught exception: Exception: Module not found");
}

#[test]
fn modules_can_require_each_other() {
    let mut interp = interp_with_modules(&[
        ("a", r#"var b = require("b"); module.exports.v = b.v + 1;"#),
        ("b", "module.exports.v = 41;"),
    ]);
    assert_eq!(eval_str(&mut interp, r#"require("a").v;"#), "42");
}

#[test]
fn module_exceptions_propagate() {
    let mut interp = interp_with_modules(&[("bad", r#"throw "broken module";"#)]);
    let err = interp.eval(r#"require("bad");"#).unwrap_err();
    assert_eq!(err.to_string(), "uncaught exception: broken module");
}

#[test]
fn host_require_returns_exports() {
    let mut interp = interp_with_modules(&[("m", "module.exports.n = 7;")]);
    let exports = interp.require("m").unwrap();
    assert_eq!(interp.heap.format_value(exports), "{ n : 7 }");
    interp.heap.put(exports);
}

#[test]
fn host_require_miss_is_a_typed_error() {
    let mut interp = interp_with_modules(&[]);
    match interp.require("gone") {
        Err(JsError::ModuleNotFound(name)) => assert_eq!(name, "gone"),
        other => panic!("expected ModuleNotFound, got {other:?}"),
    }
}

#[test]
fn host_and_script_share_the_cache() {
    let mut interp = interp_with_modules(&[("c", "loads = loads + 1; module.exports.ok = 1;")]);
    eval_str(&mut interp, "var loads = 0;");
    let exports = interp.require("c").unwrap();
    interp.heap.put(exports);
    assert_eq!(eval_str(&mut interp, r#"require("c").ok;"#), "1");
    assert_eq!(eval_str(&mut interp, "loads;"), "1");
}
