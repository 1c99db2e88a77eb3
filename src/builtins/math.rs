//! The `Math` object: floating-point unary/binary wrappers plus the two
//! constants.

use crate::builtins::{js_invalid_args, register_fn};
use crate::core::eval::Ev;
use crate::core::value::ObjRef;
use crate::core::Interp;

pub(crate) fn register(interp: &mut Interp) {
    let math = interp.heap.new_object();

    register_fn(interp, math, "sin", |i, t, a| fp1(i, t, a, f64::sin));
    register_fn(interp, math, "asin", |i, t, a| fp1(i, t, a, f64::asin));
    register_fn(interp, math, "cos", |i, t, a| fp1(i, t, a, f64::cos));
    register_fn(interp, math, "acos", |i, t, a| fp1(i, t, a, f64::acos));
    register_fn(interp, math, "tan", |i, t, a| fp1(i, t, a, f64::tan));
    register_fn(interp, math, "atan", |i, t, a| fp1(i, t, a, f64::atan));
    register_fn(interp, math, "sqrt", |i, t, a| fp1(i, t, a, f64::sqrt));
    register_fn(interp, math, "log", |i, t, a| fp1(i, t, a, f64::ln));
    register_fn(interp, math, "exp", |i, t, a| fp1(i, t, a, f64::exp));
    register_fn(interp, math, "floor", |i, t, a| fp1(i, t, a, f64::floor));
    register_fn(interp, math, "ceil", |i, t, a| fp1(i, t, a, f64::ceil));
    register_fn(interp, math, "round", |i, t, a| fp1(i, t, a, f64::round));
    register_fn(interp, math, "atan2", |i, t, a| fp2(i, t, a, f64::atan2));
    register_fn(interp, math, "pow", |i, t, a| fp2(i, t, a, f64::powf));
    register_fn(interp, math, "abs", do_abs);

    let pi = interp.heap.new_fp(std::f64::consts::PI);
    interp.heap.set_property(math, "PI", pi);
    let e = interp.heap.new_fp(std::f64::consts::E);
    interp.heap.set_property(math, "E", e);

    let env = interp.global_env;
    interp.heap.set_property(env, "Math", math);
}

fn fp1(interp: &mut Interp, _this: ObjRef, argv: &[ObjRef], f: fn(f64) -> f64) -> Ev {
    if argv.len() != 2 {
        return Err(js_invalid_args(interp));
    }
    let x = interp.heap.get_fp(argv[1]);
    Ok(interp.heap.new_fp(f(x)))
}

fn fp2(interp: &mut Interp, _this: ObjRef, argv: &[ObjRef], f: fn(f64, f64) -> f64) -> Ev {
    if argv.len() != 3 {
        return Err(js_invalid_args(interp));
    }
    let x = interp.heap.get_fp(argv[1]);
    let y = interp.heap.get_fp(argv[2]);
    Ok(interp.heap.new_fp(f(x, y)))
}

/// Integer absolute value; `i32::MIN` wraps.
fn do_abs(interp: &mut Interp, _this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() != 2 {
        return Err(js_invalid_args(interp));
    }
    let x = interp.heap.get_int(argv[1]);
    Ok(ObjRef::Int(x.wrapping_abs()))
}
