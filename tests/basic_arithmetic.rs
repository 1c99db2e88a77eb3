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
fn integer_arithmetic() {
    assert_eq!(eval_str("1 + 2 * 3;"), "7");
    assert_eq!(eval_str("(1 + 2) * 3;"), "9");
    assert_eq!(eval_str("17 % 5;"), "2");
    assert_eq!(eval_str("-4 + 10;"), "6");
}

#[test]
fn division_leaves_integers_when_exact() {
    assert_eq!(eval_str("10 / 2;"), "5");
    assert_eq!(eval_str("7 / 2;"), "3.5");
}

#[test]
fn floating_point() {
    assert_eq!(eval_str("1.5 + 2.25;"), "3.75");
    assert_eq!(eval_str("0 / 0;"), "NaN");
    assert_eq!(eval_str("1 / 0;"), "Infinity");
}

#[test]
fn bitwise_and_shifts() {
    assert_eq!(eval_str("6 & 3;"), "2");
    assert_eq!(eval_str("6 | 3;"), "7");
    assert_eq!(eval_str("6 ^ 3;"), "5");
    assert_eq!(eval_str("~0;"), "-1");
    assert_eq!(eval_str("1 << 4;"), "16");
    assert_eq!(eval_str("-8 >> 1;"), "-4");
    assert_eq!(eval_str("-1 >>> 28;"), "15");
    // Fractional operands coerce through ToInt32/ToUint32 first.
    assert_eq!(eval_str("5.5 >> 1;"), "2");
    assert_eq!(eval_str("2.9 << 2;"), "8");
    assert_eq!(eval_str("-1.5 >>> 28;"), "15");
}

#[test]
fn comparisons() {
    assert_eq!(eval_str("1 < 2;"), "true");
    assert_eq!(eval_str("2 <= 2;"), "true");
    assert_eq!(eval_str("3 > 4;"), "false");
    assert_eq!(eval_str("5 >= 6;"), "false");
}

#[test]
fn equality_and_strictness() {
    assert_eq!(eval_str("1 == 1;"), "true");
    assert_eq!(eval_str("1 != 2;"), "true");
    assert_eq!(eval_str(r#""5" == 5;"#), "true");
    assert_eq!(eval_str(r#""5" === 5;"#), "false");
    assert_eq!(eval_str(r#""5" !== 5;"#), "true");
}

#[test]
fn string_concatenation() {
    assert_eq!(eval_str(r#""foo" + "bar";"#), "\"foobar\"");
    assert_eq!(eval_str(r#""n = " + 4;"#), "\"n = 4\"");
}

#[test]
fn logical_operators_short_circuit() {
    // A fully evaluated chain yields a boolean; only the short-circuited
    // form hands back the raw left operand.
    assert_eq!(eval_str("1 && 2;"), "true");
    assert_eq!(eval_str("0 && nosuchthing();"), "0");
    assert_eq!(eval_str("0 || 3;"), "true");
    assert_eq!(eval_str("4 || nosuchthing();"), "4");
    assert_eq!(eval_str("!0;"), "true");
}

#[test]
fn ternary() {
    assert_eq!(eval_str("1 ? 10 : 20;"), "10");
    assert_eq!(eval_str("0 ? 10 : 20;"), "20");
    assert_eq!(eval_str("1 ? 0 ? 1 : 2 : 3;"), "2");
}

#[test]
fn assignment_forms() {
    assert_eq!(eval_str("var x = 5; x += 2; x;"), "7");
    assert_eq!(eval_str("var x = 5; x *= 3; x;"), "15");
    assert_eq!(eval_str("var x = 8; x >>= 2; x;"), "2");
}

#[test]
fn compound_assignment_expression_yields_prior_value() {
    // The expression value of `x += n` is x before the update.
    assert_eq!(eval_str("var x = 5; var y = (x += 2); y;"), "5");
    assert_eq!(eval_str("var x = 5; var y = (x += 2); x;"), "7");
}

#[test]
fn increment_decrement() {
    assert_eq!(eval_str("var x = 5; x++;"), "5");
    assert_eq!(eval_str("var x = 5; x++; x;"), "6");
    assert_eq!(eval_str("var x = 5; ++x;"), "6");
    assert_eq!(eval_str("var x = 5; --x; x;"), "4");
}

#[test]
fn numeric_literal_radixes() {
    assert_eq!(eval_str("0x1f;"), "31");
    assert_eq!(eval_str("0b101;"), "5");
    assert_eq!(eval_str("0o17;"), "15");
    assert_eq!(eval_str("2e3;"), "2000");
}
