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

fn eval_err(code: &str) -> String {
    let mut interp = Interp::new(InterpConfig::default());
    match interp.eval(code) {
        Ok(v) => panic!("expected an error, got {}", interp.heap.format_value(v)),
        Err(e) => e.to_string(),
    }
}

#[test]
fn catch_receives_the_thrown_value() {
    let script = r#"
        var r;
        try { throw "boom"; } catch (e) { r = e; }
        r;
    "#;
    assert_eq!(eval_str(script), "\"boom\"");
}

#[test]
fn code_after_throw_does_not_run() {
    let script = r#"
        var r = "before";
        try { throw 1; r = "after"; } catch (e) {}
        r;
    "#;
    assert_eq!(eval_str(script), "\"before\"");
}

#[test]
fn try_without_a_throw_skips_catch() {
    let script = r#"
        var r = 0;
        try { r = 1; } catch (e) { r = 2; }
        r;
    "#;
    assert_eq!(eval_str(script), "1");
}

#[test]
fn thrown_values_keep_their_type() {
    assert_eq!(eval_str("var r; try { throw 42; } catch (e) { r = e + 1; } r;"), "43");
}

#[test]
fn rethrow_from_catch() {
    let script = r#"
        var log = "";
        try {
            try { throw "inner"; } catch (e) { log = log + "caught "; throw e; }
        } catch (e2) {
            log = log + e2;
        }
        log;
    "#;
    assert_eq!(eval_str(script), "\"caught inner\"");
}

#[test]
fn uncaught_throw_surfaces_to_the_host() {
    assert_eq!(eval_err("throw \"top level\";"), "uncaught exception: top level");
    assert_eq!(eval_err("throw 42;"), "uncaught exception: 42");
}

#[test]
fn builtin_exceptions_are_catchable() {
    let script = r#"
        var r;
        try { var a = Array(-1); } catch (e) { r = e; }
        r;
    "#;
    assert_eq!(eval_str(script), "\"Exception: Invalid range\"");
}

#[test]
fn return_passes_through_try() {
    let script = r#"
        function f() {
            try { return "early"; } catch (e) { return "caught"; }
            return "late";
        }
        f();
    "#;
    assert_eq!(eval_str(script), "\"early\"");
}

#[test]
fn throw_propagates_out_of_function_calls() {
    let script = r#"
        function deep() { throw "from deep"; }
        function mid() { deep(); return "unreached"; }
        var r;
        try { mid(); } catch (e) { r = e; }
        r;
    "#;
    assert_eq!(eval_str(script), "\"from deep\"");
}

#[test]
fn catch_binding_is_scoped_to_the_catch_block() {
    let script = r#"
        var e = "outer";
        try { throw "inner"; } catch (e) {}
        e;
    "#;
    assert_eq!(eval_str(script), "\"outer\"");
}

#[test]
fn loop_inside_try_keeps_its_breaks() {
    let script = r#"
        var n = 0;
        try {
            while (1) { n = n + 1; if (n == 3) break; }
        } catch (e) { n = -1; }
        n;
    "#;
    assert_eq!(eval_str(script), "3");
}

#[test]
fn parse_error_surfaces_as_an_exception() {
    assert_eq!(
        eval_err("var = 1;"),
        "uncaught exception: Exception: Parse error"
    );
}

#[test]
fn member_access_on_undefined_throws() {
    assert_eq!(
        eval_err("var u; u.x;"),
        "uncaught exception: Exception: Can't access property of undefined"
    );
}
