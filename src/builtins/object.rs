//! `Object` constructor and the base prototype.

use crate::builtins::{js_invalid_args, register_constructor, register_fn};
use crate::core::eval::Ev;
use crate::core::number::Num;
use crate::core::value::{Class, ObjRef, UNDEF};
use crate::core::Interp;

/// Listener table, an internal property on any object used as an
/// emitter. Its keys are event names, each holding an array of handlers.
const ON_EVENTS: &str = "___on_events___";

pub(crate) fn register(interp: &mut Interp, proto: ObjRef) {
    register_fn(interp, proto, "toString", do_to_string);
    register_fn(interp, proto, "on", do_on);
    register_fn(interp, proto, "emit", do_emit);
    register_fn(interp, proto, "listeners", do_listeners);
    register_fn(interp, proto, "removeAllListeners", do_remove_all_listeners);
    register_constructor(interp, "Object", do_object_constructor, proto);
}

fn do_object_constructor(interp: &mut Interp, _this: ObjRef, _argv: &[ObjRef]) -> Ev {
    Ok(interp.heap.new_object())
}

/// Stringify `this`. Numbers take an optional radix argument; only
/// integers support it.
fn do_to_string(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() == 2 && interp.heap.class_of(this) == Class::Num {
        let radix = interp.heap.get_int(argv[1]);
        if !(2..=36).contains(&radix) {
            return Err(js_invalid_args(interp));
        }
        return match interp.heap.num_value(this) {
            Some(Num::Int(i)) => {
                let s = format_radix(i, radix as u32);
                Ok(interp.heap.new_string(s.into()))
            }
            _ => Err(interp.throw_str("Not supported yet")),
        };
    }
    Ok(interp.heap.cast(this, Class::String))
}

/// The listener table for `o`, created on first use (acquired).
fn events_root(interp: &mut Interp, o: ObjRef) -> ObjRef {
    if let Some((root, _)) = interp.heap.get_own_property(o, ON_EVENTS) {
        if root != UNDEF {
            return root;
        }
    }
    let root = interp.heap.new_object();
    interp.heap.get(root);
    interp.heap.set_internal_property(o, ON_EVENTS, root);
    root
}

/// `o.on(event, handler)`: append a handler to the event's list.
fn do_on(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() != 3 || interp.heap.class_of(argv[2]) != Class::Function {
        return Err(js_invalid_args(interp));
    }
    let event = interp.heap.get_str(argv[1]);
    let root = events_root(interp, this);

    let listeners = match interp.heap.get_own_property(root, &event) {
        Some((l, _)) if l != UNDEF => l,
        _ => {
            // A removed event leaves an undefined entry behind; both it
            // and a missing one get a fresh array.
            let l = interp.heap.new_array();
            interp.heap.get(l);
            interp.heap.set_property(root, &event, l);
            l
        }
    };
    interp.heap.get(argv[2]);
    interp.heap.array_push(listeners, argv[2]);

    interp.heap.put(listeners);
    interp.heap.put(root);
    Ok(UNDEF)
}

/// `o.emit(event, ...)`: call every handler with `o` as `this` and the
/// trailing arguments. A throwing handler stops the run.
fn do_emit(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() < 2 {
        return Err(js_invalid_args(interp));
    }
    let event = interp.heap.get_str(argv[1]);
    let root = events_root(interp, this);
    let listeners = interp.heap.get_own_property(root, &event).map(|(l, _)| l);
    interp.heap.put(root);
    let Some(listeners) = listeners else {
        return Ok(UNDEF);
    };

    let len = interp.heap.array_length(listeners);
    for k in 0..len {
        let Some(func) = interp.heap.array_lookup(listeners, k) else {
            continue;
        };
        let mut call_argv = vec![func];
        call_argv.extend_from_slice(&argv[2..]);
        let rc = interp.call_function(this, &call_argv);
        interp.heap.put(func);
        match rc {
            Ok(v) => interp.heap.put(v),
            Err(sig) => {
                interp.heap.put(listeners);
                return Err(sig);
            }
        }
    }
    interp.heap.put(listeners);
    Ok(UNDEF)
}

/// `o.listeners(event)`: the handler array, or undefined.
fn do_listeners(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() != 2 {
        return Err(js_invalid_args(interp));
    }
    let event = interp.heap.get_str(argv[1]);
    let root = events_root(interp, this);
    let ret = match interp.heap.get_own_property(root, &event) {
        Some((l, _)) => l,
        None => UNDEF,
    };
    interp.heap.put(root);
    Ok(ret)
}

/// `o.removeAllListeners()` drops the whole table;
/// `o.removeAllListeners(event)` clears one event's list.
fn do_remove_all_listeners(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    match argv.len() {
        1 => {
            if let Some((root, _)) = interp.heap.get_own_property(this, ON_EVENTS) {
                interp.heap.put(root);
                interp.heap.set_internal_property(this, ON_EVENTS, UNDEF);
            }
        }
        2 => {
            let event = interp.heap.get_str(argv[1]);
            let root = events_root(interp, this);
            if let Some((old, _)) = interp.heap.get_own_property(root, &event) {
                interp.heap.put(old);
                interp.heap.set_property(root, &event, UNDEF);
            }
            interp.heap.put(root);
        }
        _ => return Err(js_invalid_args(interp)),
    }
    Ok(UNDEF)
}

fn format_radix(v: i32, radix: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut n = (v as i64).unsigned_abs();
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(n % radix as u64) as usize]);
        n /= radix as u64;
        if n == 0 {
            break;
        }
    }
    if v < 0 {
        out.push(b'-');
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

#[cfg(test)]
mod tests {
    use super::format_radix;

    #[test]
    fn radix_formatting() {
        assert_eq!(format_radix(255, 16), "ff");
        assert_eq!(format_radix(8, 2), "1000");
        assert_eq!(format_radix(-255, 16), "-ff");
        assert_eq!(format_radix(0, 8), "0");
        assert_eq!(format_radix(i32::MIN, 16), "-80000000");
    }
}
