//! Population of the global environment: class prototypes, constructors
//! and the free-standing host functions.

pub(crate) mod array;
pub(crate) mod function;
pub(crate) mod globals;
pub(crate) mod math;
pub(crate) mod module;
pub(crate) mod object;
pub(crate) mod string;
pub(crate) mod timers;
pub(crate) mod typed_array;

use crate::core::eval::Signal;
use crate::core::value::{Class, FuncCode, NativeFn, ObjRef, F_CONSTRUCTOR, PROTOTYPE, UNDEF};
use crate::core::Interp;

pub(crate) fn js_invalid_args(interp: &mut Interp) -> Signal {
    interp.throw_str("Exception: Invalid arguments")
}

fn new_native(interp: &mut Interp, name: &str, f: NativeFn) -> ObjRef {
    interp
        .heap
        .new_function(vec![name.into()], FuncCode::Native(f), UNDEF)
}

/// Bind a native function as a property of `target`. The function object
/// gets one reference, owned by the binding.
pub(crate) fn register_fn(interp: &mut Interp, target: ObjRef, name: &str, f: NativeFn) {
    let func = new_native(interp, name, f);
    interp.heap.set_property(target, name, func);
}

/// Bind a constructor in the global scope. The function runs its own
/// construction logic under `new`, and its `prototype` property is the
/// shared class prototype rather than a per-function object.
pub(crate) fn register_constructor(interp: &mut Interp, name: &str, f: NativeFn, proto: ObjRef) {
    let func = new_native(interp, name, f);
    if let ObjRef::Slot(id) = func {
        interp.heap.slot_mut(id).flags |= F_CONSTRUCTOR;
    }
    let p = interp.heap.get(proto);
    interp.heap.set_internal_property(func, PROTOTYPE, p);
    let env = interp.global_env;
    interp.heap.set_property(env, name, func);
}

fn child_proto(interp: &mut Interp, parent: ObjRef) -> ObjRef {
    let p = interp.heap.new_object();
    let parent = interp.heap.get(parent);
    interp.heap.set_internal_property(p, PROTOTYPE, parent);
    p
}

pub(crate) fn register(interp: &mut Interp) {
    let object_proto = interp.heap.new_object();
    let function_proto = child_proto(interp, object_proto);
    let array_proto = child_proto(interp, object_proto);
    let string_proto = child_proto(interp, object_proto);
    let typed_array_proto = child_proto(interp, object_proto);

    let assignments = [
        (Class::Object, object_proto),
        (Class::Num, object_proto),
        (Class::Bool, object_proto),
        (Class::ArrayBuffer, object_proto),
        (Class::Arguments, object_proto),
        (Class::Pointer, object_proto),
        (Class::Function, function_proto),
        (Class::Array, array_proto),
        (Class::String, string_proto),
        (Class::ArrayBufferView, typed_array_proto),
    ];
    for (class, proto) in assignments {
        interp.heap.get(proto);
        interp.heap.class_protos[class.index()] = proto;
    }

    object::register(interp, object_proto);
    function::register(interp, function_proto);
    array::register(interp, array_proto);
    string::register(interp, string_proto);
    typed_array::register(interp, typed_array_proto, object_proto);
    math::register(interp);
    globals::register(interp);
    module::register(interp);
    timers::register(interp);

    // Creation references; the class_protos table keeps them alive.
    for proto in [object_proto, function_proto, array_proto, string_proto, typed_array_proto] {
        interp.heap.put(proto);
    }
}
