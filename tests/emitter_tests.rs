use microjs::{Interp, InterpConfig};

// Initialize logger for this integration test binary so `RUST_LOG` is honored.
// Using `ctor` ensures initialization runs before tests start.
#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

fn eval_str(code: &str) -> String {
    let mut interp = Interp::new(InterpConfig::default());
    let v = interp.eval(code).expect("script evaluated");
    let s = interp.heap.format_value(v);
    interp.heap.put(v);
    s
}

#[test]
fn emit_calls_the_registered_handler_with_arguments() {
    let script = r#"
        var o = {};
        var got = 0;
        o.on("hit", function(n) { got = n; });
        o.emit("hit", 42);
        got;
    "#;
    assert_eq!(eval_str(script), "42");
}

#[test]
fn handlers_run_in_registration_order() {
    let script = r#"
        var o = {};
        var trail = [];
        o.on("step", function() { trail.push("a"); });
        o.on("step", function() { trail.push("b"); });
        o.emit("step");
        o.emit("step");
        trail.join("");
    "#;
    assert_eq!(eval_str(script), "\"abab\"");
}

#[test]
fn emit_without_listeners_is_a_no_op() {
    assert_eq!(eval_str(r#"var o = {}; o.emit("nothing"); 1;"#), "1");
}

#[test]
fn handler_this_is_the_emitter() {
    let script = r#"
        var o = { tag: 7 };
        var seen = 0;
        o.on("e", function() { seen = this.tag; });
        o.emit("e");
        seen;
    "#;
    assert_eq!(eval_str(script), "7");
}

#[test]
fn listeners_returns_the_handler_array() {
    let script = r#"
        var o = {};
        o.on("e", function() {});
        o.on("e", function() {});
        o.listeners("e").length;
    "#;
    assert_eq!(eval_str(script), "2");
    assert_eq!(eval_str(r#"var o = {}; o.listeners("never") === undefined;"#), "true");
}

#[test]
fn remove_listeners_for_one_event() {
    let script = r#"
        var o = {};
        var n = 0;
        o.on("a", function() { n += 1; });
        o.on("b", function() { n += 10; });
        o.removeAllListeners("a");
        o.emit("a");
        o.emit("b");
        n;
    "#;
    assert_eq!(eval_str(script), "10");
}

#[test]
fn removed_event_accepts_new_handlers() {
    let script = r#"
        var o = {};
        var n = 0;
        o.on("e", function() { n = 1; });
        o.removeAllListeners("e");
        o.on("e", function() { n = 2; });
        o.emit("e");
        n;
    "#;
    assert_eq!(eval_str(script), "2");
}

#[test]
fn remove_all_listeners_drops_every_event() {
    let script = r#"
        var o = {};
        var n = 0;
        o.on("a", function() { n += 1; });
        o.on("b", function() { n += 10; });
        o.removeAllListeners();
        o.emit("a");
        o.emit("b");
        n;
    "#;
    assert_eq!(eval_str(script), "0");
}

#[test]
fn on_rejects_a_non_function_handler() {
    let script = r#"
        var o = {};
        var caught = "";
        try { o.on("e", 5); } catch (e) { caught = e; }
        caught;
    "#;
    assert_eq!(eval_str(script), "\"Exception: Invalid arguments\"");
}

#[test]
fn listener_table_stays_hidden() {
    let script = r#"
        var o = { x: 1 };
        o.on("e", function() {});
        var keys = "";
        for (var k in o) keys += k;
        keys;
    "#;
    assert_eq!(eval_str(script), "\"x\"");
    assert_eq!(eval_str(r#"var o = {}; o.on("e", function() {}); o;"#), "{  }");
}

#[test]
fn throwing_handler_propagates() {
    let script = r#"
        var o = {};
        o.on("e", function() { throw "boom"; });
        var caught = "";
        try { o.emit("e"); } catch (e) { caught = e; }
        caught;
    "#;
    assert_eq!(eval_str(script), "\"boom\"");
}
