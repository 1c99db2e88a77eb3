//! `ArrayBuffer` and the fixed-width view constructors.

use crate::builtins::{js_invalid_args, register_constructor, register_fn};
use crate::core::eval::Ev;
use crate::core::value::{Class, ObjRef, Payload};
use crate::core::Interp;

pub(crate) fn register(interp: &mut Interp, view_proto: ObjRef, buffer_proto: ObjRef) {
    register_fn(interp, view_proto, "subarray", do_subarray);

    register_constructor(interp, "ArrayBuffer", do_array_buffer, buffer_proto);
    register_constructor(interp, "Int8Array", |i, t, a| view_ctor(i, t, a, 0, false), view_proto);
    register_constructor(interp, "Uint8Array", |i, t, a| view_ctor(i, t, a, 0, true), view_proto);
    register_constructor(interp, "Int16Array", |i, t, a| view_ctor(i, t, a, 1, false), view_proto);
    register_constructor(interp, "Uint16Array", |i, t, a| view_ctor(i, t, a, 1, true), view_proto);
    register_constructor(interp, "Int32Array", |i, t, a| view_ctor(i, t, a, 2, false), view_proto);
    register_constructor(interp, "Uint32Array", |i, t, a| view_ctor(i, t, a, 2, true), view_proto);
}

fn do_array_buffer(interp: &mut Interp, _this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() != 2 {
        return Err(js_invalid_args(interp));
    }
    let len = interp.heap.get_int(argv[1]);
    if len < 0 {
        return Err(interp.throw_str("Exception: Invalid range"));
    }
    Ok(interp.heap.new_array_buffer(len as usize))
}

fn buffer_byte_len(interp: &Interp, buf: ObjRef) -> Option<usize> {
    let ObjRef::Slot(id) = buf else { return None };
    match &interp.heap.slot(id).payload {
        Payload::Buffer(b) => Some(b.borrow().len()),
        _ => None,
    }
}

/// Shared view constructor: over an existing buffer (with optional
/// element offset and length), or over a fresh buffer of `n` elements.
fn view_ctor(interp: &mut Interp, _this: ObjRef, argv: &[ObjRef], shift: u8, unsigned: bool) -> Ev {
    if argv.len() < 2 {
        return Err(interp.throw_str("Wrong number of arguments"));
    }
    let arg = argv[1];

    if interp.heap.class_of(arg) == Class::ArrayBuffer {
        let cap = (buffer_byte_len(interp, arg).unwrap_or(0) >> shift) as i32;
        let offset = match argv.get(2) {
            Some(&o) => interp.heap.get_int(o),
            None => 0,
        };
        let length = match argv.get(3) {
            Some(&l) => interp.heap.get_int(l),
            None => cap - offset,
        };
        if offset < 0 || length < 0 || offset + length > cap {
            return Err(interp.throw_str("Exception: Invalid range"));
        }
        return Ok(interp.heap.new_array_buffer_view(
            arg,
            shift,
            unsigned,
            offset as usize,
            length as usize,
        ));
    }

    if interp.heap.num_value(arg).is_some() {
        let len = interp.heap.get_int(arg);
        if len < 0 {
            return Err(interp.throw_str("Exception: Invalid range"));
        }
        let buf = interp.heap.new_array_buffer((len as usize) << shift);
        let view = interp.heap.new_array_buffer_view(buf, shift, unsigned, 0, len as usize);
        interp.heap.put(buf);
        return Ok(view);
    }

    Err(js_invalid_args(interp))
}

/// A narrower view of the same buffer. Negative indices count from the
/// end; a nonsensical range degenerates to an empty view.
fn do_subarray(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    let ObjRef::Slot(id) = this else {
        return Err(js_invalid_args(interp));
    };
    let (buffer, shift, unsigned, offset, length) = match &interp.heap.slot(id).payload {
        Payload::View(v) => (v.buffer, v.shift, v.unsigned, v.offset as i32, v.length as i32),
        _ => return Err(js_invalid_args(interp)),
    };

    let mut begin = match argv.get(1) {
        Some(&b) => interp.heap.get_int(b),
        None => 0,
    };
    let mut end = match argv.get(2) {
        Some(&e) => interp.heap.get_int(e),
        None => length,
    };
    if begin < 0 {
        begin += length;
    }
    if end < 0 {
        end += length;
    }
    begin += offset;
    end += offset;
    if begin < 0 || end < begin || end > offset + length {
        begin = 0;
        end = 0;
    }

    Ok(interp.heap.new_array_buffer_view(
        buffer,
        shift,
        unsigned,
        begin as usize,
        (end - begin) as usize,
    ))
}
