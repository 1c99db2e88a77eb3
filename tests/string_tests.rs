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
fn indexing_yields_single_characters() {
    assert_eq!(eval_str(r#""abc"[1];"#), "\"b\"");
    assert_eq!(eval_str(r#""abc"[5];"#), "undefined");
}

#[test]
fn split_on_a_separator() {
    assert_eq!(eval_str(r#""a,b,c".split(",");"#), r#"[ "a", "b", "c" ]"#);
    assert_eq!(eval_str(r#""a,b,c".split(",").length;"#), "3");
}

#[test]
fn split_keeps_interior_empty_segments() {
    assert_eq!(eval_str(r#""a,,b".split(",");"#), r#"[ "a", "", "b" ]"#);
}

#[test]
fn split_drops_a_trailing_empty_segment() {
    assert_eq!(eval_str(r#""a,b,".split(",").length;"#), "2");
}

#[test]
fn split_without_a_match() {
    assert_eq!(eval_str(r#""abc".split("-");"#), r#"[ "abc" ]"#);
    assert_eq!(eval_str(r#""abc".split();"#), r#"[ "abc" ]"#);
}

#[test]
fn split_on_a_multichar_separator() {
    assert_eq!(eval_str(r#""one::two::three".split("::").length;"#), "3");
    assert_eq!(eval_str(r#""one::two".split("::")[1];"#), "\"two\"");
}

#[test]
fn index_of() {
    assert_eq!(eval_str(r#""hello world".indexOf("world");"#), "6");
    assert_eq!(eval_str(r#""hello".indexOf("z");"#), "-1");
    assert_eq!(eval_str(r#""aaa".indexOf("a");"#), "0");
}

#[test]
fn substring() {
    assert_eq!(eval_str(r#""hello".substring(1, 3);"#), "\"el\"");
    assert_eq!(eval_str(r#""hello".substring(2);"#), "\"llo\"");
    assert_eq!(eval_str(r#""hello".substring(0, 0);"#), "\"\"");
}

#[test]
fn substring_out_of_range_throws() {
    assert_eq!(
        eval_err(r#""abc".substring(1, 9);"#),
        "uncaught exception: Exception: Invalid range"
    );
    assert_eq!(
        eval_err(r#""abc".substring(-1);"#),
        "uncaught exception: Exception: Invalid range"
    );
}

#[test]
fn char_at() {
    assert_eq!(eval_str(r#""abc".charAt(0);"#), "\"a\"");
    assert_eq!(eval_str(r#""abc".charAt(2);"#), "\"c\"");
    assert_eq!(eval_str(r#""abc".charAt(9);"#), "\"\"");
    assert_eq!(eval_str(r#""abc".charAt();"#), "\"a\"");
}

#[test]
fn char_code_at() {
    assert_eq!(eval_str(r#""A".charCodeAt(0);"#), "65");
    assert_eq!(eval_str(r#""abc".charCodeAt(1);"#), "98");
    assert_eq!(eval_str(r#""abc".charCodeAt(9);"#), "NaN");
}

#[test]
fn string_constructor() {
    assert_eq!(eval_str("String(42);"), "\"42\"");
    assert_eq!(eval_str("String();"), "\"\"");
    assert_eq!(eval_str("String(true);"), "\"true\"");
}

#[test]
fn concatenation_coerces_numbers() {
    assert_eq!(eval_str(r#"var s = ""; s + 1 + 2;"#), "\"12\"");
    assert_eq!(eval_str(r#"1 + 2 + "";"#), "\"3\"");
}

#[test]
fn string_comparison() {
    assert_eq!(eval_str(r#""abc" == "abc";"#), "true");
    assert_eq!(eval_str(r#""abc" == "abd";"#), "false");
}

#[test]
fn escapes_in_literals() {
    assert_eq!(eval_str(r#""a\nb".charCodeAt(1);"#), "10");
    assert_eq!(eval_str(r#""tab\there".indexOf("\t");"#), "3");
}

#[test]
fn method_chaining() {
    assert_eq!(
        eval_str(r#""a-b-c".split("-").join("+");"#),
        "\"a+b+c\""
    );
}
