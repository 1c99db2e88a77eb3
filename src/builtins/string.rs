//! `String` constructor and prototype methods. Indexing is by
//! character, not byte.

use crate::builtins::{js_invalid_args, register_constructor, register_fn};
use crate::core::eval::Ev;
use crate::core::value::{ObjRef, NAN};
use crate::core::Interp;

pub(crate) fn register(interp: &mut Interp, proto: ObjRef) {
    register_fn(interp, proto, "split", do_split);
    register_fn(interp, proto, "indexOf", do_index_of);
    register_fn(interp, proto, "substring", do_substring);
    register_fn(interp, proto, "charAt", do_char_at);
    register_fn(interp, proto, "charCodeAt", do_char_code_at);
    register_constructor(interp, "String", do_string_constructor, proto);
}

fn do_string_constructor(interp: &mut Interp, _this: ObjRef, argv: &[ObjRef]) -> Ev {
    let s = match argv.get(1) {
        Some(&v) => interp.heap.get_str(v),
        None => "".into(),
    };
    Ok(interp.heap.new_string(s))
}

/// Split on a separator. Interior empty segments are kept; a trailing
/// empty remainder is dropped. No separator (or an empty one) yields
/// the whole string as a single element.
fn do_split(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    let s = interp.heap.get_str(this);
    let sep = argv.get(1).map(|&v| interp.heap.get_str(v));
    let arr = interp.heap.new_array();

    let push = |interp: &mut Interp, seg: &str| {
        let v = interp.heap.new_string(seg.into());
        interp.heap.array_push(arr, v);
    };

    match sep.as_deref() {
        None | Some("") => push(interp, &s),
        Some(sep) => {
            let mut rest = &*s;
            while let Some(pos) = rest.find(sep) {
                push(interp, &rest[..pos]);
                rest = &rest[pos + sep.len()..];
            }
            if !rest.is_empty() {
                push(interp, rest);
            }
        }
    }
    Ok(arr)
}

fn do_index_of(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() != 2 {
        return Err(js_invalid_args(interp));
    }
    let s = interp.heap.get_str(this);
    let needle = interp.heap.get_str(argv[1]);
    match s.find(&*needle) {
        Some(byte_pos) => Ok(ObjRef::Int(s[..byte_pos].chars().count() as i32)),
        None => Ok(ObjRef::Int(-1)),
    }
}

fn do_substring(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() < 2 {
        return Err(js_invalid_args(interp));
    }
    let s = interp.heap.get_str(this);
    let chars: Vec<char> = s.chars().collect();
    let start = interp.heap.get_int(argv[1]);
    let end = match argv.get(2) {
        Some(&e) => interp.heap.get_int(e),
        None => chars.len() as i32,
    };
    if start < 0 || end < start || end > chars.len() as i32 {
        return Err(interp.throw_str("Exception: Invalid range"));
    }
    let out: String = chars[start as usize..end as usize].iter().collect();
    Ok(interp.heap.new_string(out.into()))
}

fn do_char_at(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    let s = interp.heap.get_str(this);
    let idx = match argv.get(1) {
        Some(&v) => interp.heap.get_int(v),
        None => 0,
    };
    let out: String = match usize::try_from(idx).ok().and_then(|i| s.chars().nth(i)) {
        Some(c) => c.to_string(),
        None => String::new(),
    };
    Ok(interp.heap.new_string(out.into()))
}

/// Character code at an index; out of range yields NaN.
fn do_char_code_at(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    let s = interp.heap.get_str(this);
    let idx = match argv.get(1) {
        Some(&v) => interp.heap.get_int(v),
        None => 0,
    };
    match usize::try_from(idx).ok().and_then(|i| s.chars().nth(i)) {
        Some(c) => Ok(ObjRef::Int(c as i32)),
        None => Ok(NAN),
    }
}
