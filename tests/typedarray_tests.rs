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
fn array_buffer_byte_length() {
    assert_eq!(eval_str("new ArrayBuffer(16).byteLength;"), "16");
    assert_eq!(eval_str("new ArrayBuffer(0).byteLength;"), "0");
}

#[test]
fn array_buffer_negative_length_throws() {
    assert_eq!(
        eval_err("new ArrayBuffer(-1);"),
        "uncaught exception: Exception: Invalid range"
    );
}

#[test]
fn view_over_a_fresh_buffer() {
    assert_eq!(eval_str("new Uint8Array(4).length;"), "4");
    assert_eq!(eval_str("new Uint32Array(4).length;"), "4");
    assert_eq!(eval_str("new Uint32Array(4).buffer.byteLength;"), "16");
}

#[test]
fn element_store_and_load() {
    assert_eq!(eval_str("var v = new Uint8Array(4); v[2] = 7; v[2];"), "7");
    assert_eq!(eval_str("var v = new Int32Array(2); v[0] = -123456; v[0];"), "-123456");
}

#[test]
fn stores_wrap_to_the_element_width() {
    assert_eq!(eval_str("var v = new Uint8Array(1); v[0] = 258; v[0];"), "2");
    assert_eq!(eval_str("var v = new Int8Array(1); v[0] = 200; v[0];"), "-56");
    assert_eq!(eval_str("var v = new Uint16Array(1); v[0] = 65537; v[0];"), "1");
    assert_eq!(eval_str("var v = new Int16Array(1); v[0] = 40000; v[0];"), "-25536");
}

#[test]
fn out_of_range_stores_are_dropped() {
    assert_eq!(eval_str("var v = new Uint8Array(2); v[5] = 1; v.length;"), "2");
    assert_eq!(eval_str("var v = new Uint8Array(2); v[5];"), "undefined");
}

#[test]
fn views_share_their_buffer() {
    let script = r#"
        var b = new ArrayBuffer(4);
        var v8 = new Uint8Array(b);
        var v32 = new Uint32Array(b);
        v32[0] = 0x01020304;
        v8[0];
    "#;
    // Little-endian element storage.
    assert_eq!(eval_str(script), "4");
}

#[test]
fn view_length_derives_from_the_buffer() {
    assert_eq!(eval_str("new Uint16Array(new ArrayBuffer(8)).length;"), "4");
    assert_eq!(eval_str("new Uint32Array(new ArrayBuffer(8)).length;"), "2");
}

#[test]
fn view_with_offset_and_length() {
    let script = r#"
        var b = new ArrayBuffer(8);
        var whole = new Uint8Array(b);
        whole[3] = 42;
        var part = new Uint8Array(b, 3, 2);
        part[0];
    "#;
    assert_eq!(eval_str(script), "42");
    assert_eq!(eval_str("new Uint8Array(new ArrayBuffer(8), 3, 2).length;"), "2");
}

#[test]
fn bytes_per_element() {
    assert_eq!(eval_str("new Uint8Array(1).BYTES_PER_ELEMENT;"), "1");
    assert_eq!(eval_str("new Int16Array(1).BYTES_PER_ELEMENT;"), "2");
    assert_eq!(eval_str("new Uint32Array(1).BYTES_PER_ELEMENT;"), "4");
}

#[test]
fn subarray_is_a_window() {
    let script = r#"
        var v = new Uint8Array(8);
        v[5] = 9;
        var s = v.subarray(4, 7);
        s[1];
    "#;
    assert_eq!(eval_str(script), "9");
    assert_eq!(eval_str("new Uint8Array(8).subarray(4, 7).length;"), "3");
}

#[test]
fn subarray_writes_are_visible_through_the_parent() {
    let script = r#"
        var v = new Uint8Array(8);
        var s = v.subarray(2);
        s[0] = 11;
        v[2];
    "#;
    assert_eq!(eval_str(script), "11");
}

#[test]
fn subarray_negative_indices_count_from_the_end() {
    assert_eq!(eval_str("new Uint8Array(8).subarray(-3).length;"), "3");
    assert_eq!(eval_str("new Uint8Array(8).subarray(-4, -2).length;"), "2");
}

#[test]
fn subarray_nonsense_range_is_empty() {
    assert_eq!(eval_str("new Uint8Array(8).subarray(6, 2).length;"), "0");
    assert_eq!(eval_str("new Uint8Array(8).subarray(2, 99).length;"), "0");
}

#[test]
fn view_constructor_without_arguments_throws() {
    assert_eq!(
        eval_err("new Uint8Array();"),
        "uncaught exception: Wrong number of arguments"
    );
}

#[test]
fn view_constructor_rejects_silly_arguments() {
    assert_eq!(
        eval_err("new Uint8Array([1, 2]);"),
        "uncaught exception: Exception: Invalid arguments"
    );
}

#[test]
fn offset_out_of_range_throws() {
    assert_eq!(
        eval_err("new Uint8Array(new ArrayBuffer(4), 3, 4);"),
        "uncaught exception: Exception: Invalid range"
    );
}
