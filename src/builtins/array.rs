//! `Array` constructor and prototype methods.

use crate::builtins::{js_invalid_args, register_constructor, register_fn};
use crate::core::eval::Ev;
use crate::core::value::{ObjRef, UNDEF};
use crate::core::Interp;

pub(crate) fn register(interp: &mut Interp, proto: ObjRef) {
    register_fn(interp, proto, "push", do_push);
    register_fn(interp, proto, "pop", do_pop);
    register_fn(interp, proto, "forEach", do_for_each);
    register_fn(interp, proto, "indexOf", do_index_of);
    register_fn(interp, proto, "join", do_join);
    register_fn(interp, proto, "map", do_map);
    register_constructor(interp, "Array", do_array_constructor, proto);
}

/// `Array()`, `Array(len)`, `Array(item)` and `Array(a, b, ...)`.
fn do_array_constructor(interp: &mut Interp, _this: ObjRef, argv: &[ObjRef]) -> Ev {
    let arr = interp.heap.new_array();
    match argv.len() {
        1 => Ok(arr),
        2 if interp.heap.num_value(argv[1]).is_some() => {
            let len = interp.heap.get_int(argv[1]);
            if len < 0 {
                interp.heap.put(arr);
                return Err(interp.throw_str("Exception: Invalid range"));
            }
            interp.heap.array_set_length(arr, len);
            Ok(arr)
        }
        _ => {
            for &item in &argv[1..] {
                interp.heap.get(item);
                interp.heap.array_push(arr, item);
            }
            Ok(arr)
        }
    }
}

/// Append the arguments; yields the last item pushed.
fn do_push(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    let mut last = UNDEF;
    for &item in &argv[1..] {
        interp.heap.get(item);
        interp.heap.array_push(this, item);
        last = item;
    }
    Ok(interp.heap.get(last))
}

fn do_pop(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() != 1 {
        return Err(js_invalid_args(interp));
    }
    Ok(interp.heap.array_pop(this))
}

/// Call `cb(item, index, array)` for each element that exists. Holes
/// are skipped.
fn do_for_each(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() < 2 {
        return Err(js_invalid_args(interp));
    }
    let cb = argv[1];
    let cb_this = argv.get(2).copied().unwrap_or(UNDEF);
    let len = interp.heap.array_length(this);
    for k in 0..len {
        let Some(item) = interp.heap.array_lookup(this, k) else {
            continue;
        };
        let rc = interp.call_function(cb_this, &[cb, item, ObjRef::Int(k), this]);
        interp.heap.put(item);
        let v = rc?;
        interp.heap.put(v);
    }
    Ok(UNDEF)
}

fn do_index_of(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() < 2 {
        return Err(js_invalid_args(interp));
    }
    let item = argv[1];
    let start = match argv.get(2) {
        Some(&s) => interp.heap.get_int(s).max(0),
        None => 0,
    };
    let len = interp.heap.array_length(this);
    for k in start..len {
        let Some(v) = interp.heap.array_lookup(this, k) else {
            continue;
        };
        let eq = interp.obj_eq(v, item);
        interp.heap.put(v);
        if eq {
            return Ok(ObjRef::Int(k));
        }
    }
    Ok(ObjRef::Int(-1))
}

fn do_join(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    let sep = match argv.get(1) {
        Some(&s) => interp.heap.get_str(s),
        None => ",".into(),
    };
    let joined = interp.heap.array_join(this, &sep);
    Ok(interp.heap.new_string(joined.into()))
}

fn do_map(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() < 2 {
        return Err(js_invalid_args(interp));
    }
    let cb = argv[1];
    let cb_this = argv.get(2).copied().unwrap_or(UNDEF);
    let out = interp.heap.new_array();
    let len = interp.heap.array_length(this);
    for k in 0..len {
        let Some(item) = interp.heap.array_lookup(this, k) else {
            continue;
        };
        let rc = interp.call_function(cb_this, &[cb, item, ObjRef::Int(k), this]);
        interp.heap.put(item);
        match rc {
            Ok(v) => interp.heap.set_property(out, &k.to_string(), v),
            Err(sig) => {
                interp.heap.put(out);
                return Err(sig);
            }
        }
    }
    Ok(out)
}
