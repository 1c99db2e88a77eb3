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
fn if_else_chain() {
    let script = r#"
        var r;
        var n = 2;
        if (n == 1) r = "one";
        else if (n == 2) r = "two";
        else r = "many";
        r;
    "#;
    assert_eq!(eval_str(script), "\"two\"");
}

#[test]
fn if_without_braces() {
    assert_eq!(eval_str("var r = 0; if (1) r = 5; r;"), "5");
    assert_eq!(eval_str("var r = 0; if (0) r = 5; r;"), "0");
}

#[test]
fn while_loop() {
    assert_eq!(eval_str("var n = 0; while (n < 10) n = n + 1; n;"), "10");
}

#[test]
fn while_break_and_continue() {
    let script = r#"
        var s = 0;
        var n = 0;
        while (n < 10) {
            n = n + 1;
            if (n % 2) continue;
            if (n > 6) break;
            s = s + n;
        }
        s;
    "#;
    // 2 + 4 + 6
    assert_eq!(eval_str(script), "12");
}

#[test]
fn do_while_runs_at_least_once() {
    assert_eq!(eval_str("var n = 0; do { n = n + 1; } while (0); n;"), "1");
}

#[test]
fn do_while_break_stays_inside() {
    let script = r#"
        var r = 0;
        while (r < 3) {
            do { break; } while (1);
            r = r + 1;
        }
        r;
    "#;
    // break leaves the do-while only; the outer while keeps running.
    assert_eq!(eval_str(script), "3");
}

#[test]
fn do_while_continue_rechecks_condition() {
    let script = r#"
        var n = 0;
        var c = 0;
        do {
            n = n + 1;
            if (n < 3) continue;
            c = c + 1;
        } while (n < 5);
        c;
    "#;
    assert_eq!(eval_str(script), "3");
}

#[test]
fn for_loop() {
    assert_eq!(
        eval_str("var s = 0; for (var i = 0; i < 5; i++) s = s + i; s;"),
        "10"
    );
}

#[test]
fn for_with_empty_clauses() {
    let script = r#"
        var n = 0;
        for (;;) {
            n = n + 1;
            if (n == 4) break;
        }
        n;
    "#;
    assert_eq!(eval_str(script), "4");
}

#[test]
fn for_in_object_keys() {
    let script = r#"
        var o = { a: 1, b: 2, c: 3 };
        var keys = "";
        var total = 0;
        for (var k in o) {
            keys = keys + k;
            total = total + o[k];
        }
        keys + ":" + total;
    "#;
    assert_eq!(eval_str(script), "\"abc:6\"");
}

#[test]
fn for_in_array_indices() {
    let script = r#"
        var a = [10, 20, 30];
        var s = 0;
        for (var k in a) s = s + a[k];
        s;
    "#;
    assert_eq!(eval_str(script), "60");
}

#[test]
fn nested_loops_with_break() {
    let script = r#"
        var hits = 0;
        for (var i = 0; i < 3; i++) {
            for (var j = 0; j < 3; j++) {
                if (j > i) break;
                hits = hits + 1;
            }
        }
        hits;
    "#;
    assert_eq!(eval_str(script), "6");
}

#[test]
fn switch_matches_and_breaks() {
    let script = r#"
        var r;
        switch (2) {
            case 1: r = "one"; break;
            case 2: r = "two"; break;
            case 3: r = "three"; break;
            default: r = "other";
        }
        r;
    "#;
    assert_eq!(eval_str(script), "\"two\"");
}

#[test]
fn switch_falls_through_without_break() {
    let script = r#"
        var r = "";
        switch (2) {
            case 1: r = r + "a";
            case 2: r = r + "b";
            case 3: r = r + "c"; break;
            case 4: r = r + "d";
        }
        r;
    "#;
    assert_eq!(eval_str(script), "\"bc\"");
}

#[test]
fn switch_default_when_nothing_matches() {
    let script = r#"
        var r = "";
        switch (9) {
            case 1: r = "one"; break;
            default: r = "other";
        }
        r;
    "#;
    assert_eq!(eval_str(script), "\"other\"");
}

#[test]
fn switch_uses_strict_matching() {
    let script = r#"
        var r = "miss";
        switch ("2") {
            case 2: r = "number"; break;
            case "2": r = "string"; break;
        }
        r;
    "#;
    assert_eq!(eval_str(script), "\"string\"");
}

#[test]
fn block_scoping_is_function_level() {
    // `var` inside a block still lands in the enclosing scope.
    assert_eq!(eval_str("{ var x = 3; } x;"), "3");
}
