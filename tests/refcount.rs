use microjs::{Interp, InterpConfig};

// Initialize logger for this integration test binary so `RUST_LOG` is honored.
// Using `ctor` ensures initialization runs before tests start.
#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

fn run_and_release(interp: &mut Interp, code: &str) {
    let v = interp.eval(code).expect("script evaluated");
    interp.heap.put(v);
}

#[test]
fn immediate_results_allocate_nothing() {
    let mut interp = Interp::new(InterpConfig::default());
    let baseline = interp.heap.live_count();
    run_and_release(&mut interp, "1 + 2 * 3;");
    assert_eq!(interp.heap.live_count(), baseline);
}

#[test]
fn released_results_free_their_slot() {
    let mut interp = Interp::new(InterpConfig::default());
    let baseline = interp.heap.live_count();
    let v = interp.eval(r#""a" + "b";"#).unwrap();
    assert!(interp.heap.live_count() > baseline);
    interp.heap.put(v);
    assert_eq!(interp.heap.live_count(), baseline);
}

#[test]
fn temporaries_inside_expressions_do_not_leak() {
    let mut interp = Interp::new(InterpConfig::default());
    let baseline = interp.heap.live_count();
    run_and_release(&mut interp, r#"("x" + "y") == ("x" + "z") ? 1 : 2;"#);
    assert_eq!(interp.heap.live_count(), baseline);
}

#[test]
fn control_flow_does_not_leak() {
    let mut interp = Interp::new(InterpConfig::default());
    let baseline = interp.heap.live_count();
    run_and_release(
        &mut interp,
        r#"
        var n = 0;
        for (var i = 0; i < 10; i++) {
            if (i % 2) continue;
            n = n + i;
        }
        n;
    "#,
    );
    // The loop variables are Int bindings; only the global names persist.
    assert_eq!(interp.heap.live_count(), baseline);
}

#[test]
fn discarded_throw_values_are_freed() {
    let mut interp = Interp::new(InterpConfig::default());
    let baseline = interp.heap.live_count();
    let err = interp.eval(r#"throw "gone";"#).unwrap_err();
    drop(err);
    assert_eq!(interp.heap.live_count(), baseline);
}

#[test]
fn caught_exceptions_do_not_leak() {
    let mut interp = Interp::new(InterpConfig::default());
    let baseline = interp.heap.live_count();
    run_and_release(
        &mut interp,
        r#"var ok = 0; try { throw "x" + "y"; } catch (e) { ok = 1; } ok;"#,
    );
    assert_eq!(interp.heap.live_count(), baseline);
}

#[test]
fn function_call_scopes_are_reclaimed() {
    let mut interp = Interp::new(InterpConfig::default());
    run_and_release(&mut interp, "function f(a, b) { var c = a + b; return c; }");
    let baseline = interp.heap.live_count();
    run_and_release(&mut interp, "f(1, 2);");
    assert_eq!(interp.heap.live_count(), baseline);
}

#[test]
fn cycles_survive_refcounting_until_gc() {
    let mut interp = Interp::new(InterpConfig::default());
    run_and_release(&mut interp, "var o = 0;");
    let baseline = interp.heap.live_count();

    run_and_release(&mut interp, "o = { }; o.me = o;");
    assert_eq!(interp.heap.live_count(), baseline + 1);

    // Unreachable now, but the cycle keeps the refcount above zero.
    run_and_release(&mut interp, "o = 0;");
    assert_eq!(interp.heap.live_count(), baseline + 1);

    interp.gc();
    assert_eq!(interp.heap.live_count(), baseline);
}

#[test]
fn gc_keeps_reachable_values() {
    let mut interp = Interp::new(InterpConfig::default());
    run_and_release(&mut interp, r#"var keep = { tag: "kept" };"#);
    interp.gc();
    interp.gc();
    let v = interp.eval("keep.tag;").unwrap();
    assert_eq!(interp.heap.format_value(v), "\"kept\"");
    interp.heap.put(v);
}

#[test]
fn gc_reclaims_closure_cycles() {
    let mut interp = Interp::new(InterpConfig::default());
    run_and_release(&mut interp, "var c = 0;");
    let baseline = interp.heap.live_count();

    // The returned closure's scope is the call env, and the env binds the
    // closure's sibling; dropping `c` leaves a cycle only gc can see.
    run_and_release(
        &mut interp,
        r#"
        c = (function() {
            var self = function() { return self; };
            return self;
        })();
        c = 0;
    "#,
    );
    interp.gc();
    assert_eq!(interp.heap.live_count(), baseline);
}

#[test]
fn repeated_gc_is_stable() {
    let mut interp = Interp::new(InterpConfig::default());
    run_and_release(&mut interp, "var a = [1, 2, 3];");
    interp.gc();
    let live = interp.heap.live_count();
    interp.gc();
    interp.gc();
    assert_eq!(interp.heap.live_count(), live);
    let v = interp.eval("a.length;").unwrap();
    assert_eq!(interp.heap.format_value(v), "3");
    interp.heap.put(v);
}
