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
fn new_binds_this_to_a_fresh_object() {
    let script = r#"
        function Point(x, y) { this.x = x; this.y = y; }
        var p = new Point(3, 4);
        p.x * p.x + p.y * p.y;
    "#;
    assert_eq!(eval_str(script), "25");
}

#[test]
fn methods_come_from_the_prototype() {
    let script = r#"
        function Point(x, y) { this.x = x; this.y = y; }
        Point.prototype.normSq = function() { return this.x * this.x + this.y * this.y; };
        var p = new Point(3, 4);
        p.normSq();
    "#;
    assert_eq!(eval_str(script), "25");
}

#[test]
fn prototype_is_shared_between_instances() {
    let script = r#"
        function Thing() {}
        Thing.prototype.kind = "thing";
        var a = new Thing();
        var b = new Thing();
        a.kind + ":" + b.kind;
    "#;
    assert_eq!(eval_str(script), "\"thing:thing\"");
}

#[test]
fn instance_properties_shadow_the_prototype() {
    let script = r#"
        function Thing() {}
        Thing.prototype.kind = "generic";
        var a = new Thing();
        a.kind = "special";
        var b = new Thing();
        a.kind + ":" + b.kind;
    "#;
    assert_eq!(eval_str(script), "\"special:generic\"");
}

#[test]
fn prototype_updates_are_visible_to_existing_instances() {
    let script = r#"
        function Thing() {}
        var t = new Thing();
        Thing.prototype.late = function() { return "added later"; };
        t.late();
    "#;
    assert_eq!(eval_str(script), "\"added later\"");
}

#[test]
fn constructor_returning_an_object_overrides_this() {
    let script = r#"
        function Weird() { this.x = 1; return { x: 99 }; }
        var w = new Weird();
        w.x;
    "#;
    assert_eq!(eval_str(script), "99");
}

#[test]
fn constructor_returning_a_primitive_keeps_this() {
    let script = r#"
        function Normal() { this.x = 1; return 7; }
        var n = new Normal();
        n.x;
    "#;
    assert_eq!(eval_str(script), "1");
}

#[test]
fn two_level_prototype_chain() {
    let script = r#"
        function Base() {}
        Base.prototype.greet = function() { return "hello"; };
        function Derived() {}
        Derived.prototype = new Base();
        var d = new Derived();
        d.greet();
    "#;
    assert_eq!(eval_str(script), "\"hello\"");
}

#[test]
fn object_constructor_builds_a_plain_object() {
    assert_eq!(eval_str("var o = new Object(); o.a = 1; o.a;"), "1");
    assert_eq!(eval_str("var o = Object(); o;"), "{  }");
}

#[test]
fn builtin_to_string() {
    assert_eq!(eval_str("var n = 255; n.toString(16);"), "\"ff\"");
    assert_eq!(eval_str("var n = 8; n.toString(2);"), "\"1000\"");
    assert_eq!(eval_str("var n = 42; n.toString();"), "\"42\"");
    assert_eq!(eval_str(r#"var s = "x"; s.toString();"#), "\"x\"");
}

#[test]
fn object_literal_with_prototype_key() {
    let script = r#"
        var base = { prototype: { greet: function() { return "hi"; } } };
        var o = { prototype: base.prototype };
        o.greet();
    "#;
    assert_eq!(eval_str(script), "\"hi\"");
}
