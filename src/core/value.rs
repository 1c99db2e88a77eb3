//! The object heap: tagged slots addressed by generational handles, with
//! per-class dispatch for formatting, coercion, operators and property
//! hooks.
//!
//! Lifetimes are reference counted through [`Heap::get`] / [`Heap::put`];
//! release-to-zero frees immediately. The mark-sweep collector (gc.rs)
//! backs this up for cycles. Small integers never touch the heap: they
//! ride in the handle itself as `ObjRef::Int`.

use std::rc::Rc;

use crate::core::eval::Ev;
use crate::core::number::{self, fp_is_eq, Num};
use crate::core::scan::{Scanner, Tok};
use crate::core::Interp;
use crate::mem::{Allocator, Slab};

pub(crate) const PROTOTYPE: &str = "prototype";
pub(crate) const LENGTH: &str = "length";

// Slot flags.
pub(crate) const F_STATIC: u8 = 0x01;
/// Function runs its own construction logic when invoked via `new`.
pub(crate) const F_CONSTRUCTOR: u8 = 0x02;
pub(crate) const F_MARK0: u8 = 0x04;
pub(crate) const F_MARK1: u8 = 0x08;
/// Scheduled for release by the active sweep; `put` must not free it.
pub(crate) const F_DOOMED: u8 = 0x10;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct SlotId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// A value handle: either an immediate small integer or a heap slot
/// address. Stale slot handles are detected by generation mismatch
/// instead of dereferencing recycled memory.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ObjRef {
    Int(i32),
    Slot(SlotId),
}

const fn static_ref(index: u32) -> ObjRef {
    ObjRef::Slot(SlotId { index, generation: 0 })
}

/// The shared singletons, created by [`Heap::new`] in this exact order.
pub const UNDEF: ObjRef = static_ref(0);
pub const NULL: ObjRef = static_ref(1);
pub const TRUE: ObjRef = static_ref(2);
pub const FALSE: ObjRef = static_ref(3);
/// Distinct from `ObjRef::Int(0)`: the evaluator passes this slot as the
/// left operand to mark unary operations, and the operator table keys the
/// string-concatenation exception off that identity.
pub const ZERO: ObjRef = static_ref(4);
pub const NAN: ObjRef = static_ref(5);

const STATIC_COUNT: usize = 6;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Class {
    Undefined,
    Null,
    Bool,
    Num,
    String,
    Function,
    Object,
    Array,
    Env,
    ArrayBuffer,
    ArrayBufferView,
    Arguments,
    Pointer,
}

pub(crate) const CLASS_COUNT: usize = 13;

impl Class {
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Native builtin entry point. `argv[0]` is the called function object;
/// user arguments follow.
pub type NativeFn = fn(&mut Interp, ObjRef, &[ObjRef]) -> Ev;

#[derive(Clone)]
pub(crate) enum FuncCode {
    Native(NativeFn),
    /// Scan state positioned at the body: the `{` of a block, or the
    /// first token of a bare statement list.
    Scripted(Box<Scanner>),
}

pub(crate) struct FuncData {
    /// Formal parameter names. Slot 0 holds the function's own name
    /// (internal), so function expressions can recurse by name.
    pub(crate) params: Vec<Rc<str>>,
    pub(crate) code: FuncCode,
    /// Captured scope (counted). UNDEF for natives.
    pub(crate) scope: ObjRef,
}

pub(crate) struct ViewData {
    /// Underlying ArrayBuffer (counted).
    pub(crate) buffer: ObjRef,
    /// log2 of the element width in bytes.
    pub(crate) shift: u8,
    pub(crate) unsigned: bool,
    /// Offset into the buffer, in elements.
    pub(crate) offset: usize,
    pub(crate) length: usize,
}

pub(crate) enum Payload {
    Plain,
    Bool(bool),
    Num(Num),
    Str(Rc<str>),
    Func(FuncData),
    Buffer(std::cell::RefCell<Vec<u8>>),
    View(ViewData),
    /// Call arguments snapshot (each counted), without the function slot.
    Args(Vec<ObjRef>),
    Pointer(Rc<dyn std::any::Any>),
}

pub(crate) struct Prop {
    pub(crate) key: Rc<str>,
    /// Internal properties are invisible to enumeration and dumping.
    pub(crate) internal: bool,
    pub(crate) value: ObjRef,
}

pub(crate) struct Slot {
    pub(crate) class: Class,
    pub(crate) flags: u8,
    pub(crate) refcount: u32,
    pub(crate) props: Vec<Prop>,
    pub(crate) payload: Payload,
}

/// A writable property location: the owner slot plus the key. Only
/// handed out for stored own properties and for bindings found through
/// an env's outer chain; lookups that fall back to a class prototype are
/// read-only.
#[derive(Clone)]
pub(crate) struct PropRef {
    pub(crate) owner: SlotId,
    pub(crate) key: Rc<str>,
}

pub struct Heap {
    pub(crate) slab: Slab<Slot>,
    pub(crate) alloc: Allocator<Slot>,
    pub(crate) generations: Vec<u32>,
    pub(crate) class_protos: [ObjRef; CLASS_COUNT],
    /// The mark bit the active GC cycle considers "live".
    pub(crate) mark: u8,
}

impl Heap {
    pub(crate) fn new(mem_limit: usize, block_capacity: usize) -> Self {
        let mut heap = Heap {
            slab: Slab::new(block_capacity),
            alloc: Allocator::new(mem_limit),
            generations: Vec::new(),
            class_protos: [UNDEF; CLASS_COUNT],
            mark: F_MARK0,
        };
        heap.alloc.register_squeezer(Slab::squeeze);

        let statics = [
            (Class::Undefined, Payload::Plain),
            (Class::Null, Payload::Plain),
            (Class::Bool, Payload::Bool(true)),
            (Class::Bool, Payload::Bool(false)),
            (Class::Num, Payload::Num(Num::Int(0))),
            (Class::Num, Payload::Num(Num::Fp(f64::NAN))),
        ];
        for (i, (class, payload)) in statics.into_iter().enumerate() {
            let r = heap.alloc_slot(Slot {
                class,
                flags: F_STATIC,
                refcount: 1,
                props: Vec::new(),
                payload,
            });
            debug_assert_eq!(r, static_ref(i as u32));
        }
        heap
    }

    fn alloc_slot(&mut self, slot: Slot) -> ObjRef {
        let index = match self.slab.try_insert(slot) {
            Ok(i) => i,
            Err(slot) => {
                let bytes = self.slab.block_bytes();
                self.alloc.reserve(&mut self.slab, bytes);
                self.slab.grow();
                match self.slab.try_insert(slot) {
                    Ok(i) => i,
                    Err(_) => unreachable!("fresh block has no free slots"),
                }
            }
        };
        if self.generations.len() <= index {
            self.generations.resize(index + 1, 0);
        }
        ObjRef::Slot(SlotId {
            index: index as u32,
            generation: self.generations[index],
        })
    }

    fn alloc(&mut self, class: Class, payload: Payload) -> ObjRef {
        self.alloc_slot(Slot {
            class,
            flags: 0,
            refcount: 1,
            props: Vec::new(),
            payload,
        })
    }

    pub(crate) fn slot(&self, id: SlotId) -> &Slot {
        assert_eq!(
            self.generations[id.index as usize], id.generation,
            "stale object handle"
        );
        self.slab.get(id.index as usize).expect("dangling object handle")
    }

    pub(crate) fn slot_mut(&mut self, id: SlotId) -> &mut Slot {
        assert_eq!(
            self.generations[id.index as usize], id.generation,
            "stale object handle"
        );
        self.slab.get_mut(id.index as usize).expect("dangling object handle")
    }

    /// Number of live heap slots, statics included.
    pub fn live_count(&self) -> usize {
        self.slab.len()
    }

    pub(crate) fn refcount(&self, r: ObjRef) -> u32 {
        match r {
            ObjRef::Int(_) => 1,
            ObjRef::Slot(id) => self.slot(id).refcount,
        }
    }

    /// Acquire a reference. Immediates and statics are exempt.
    pub fn get(&mut self, r: ObjRef) -> ObjRef {
        if let ObjRef::Slot(id) = r {
            let slot = self.slot_mut(id);
            if slot.flags & F_STATIC == 0 {
                slot.refcount += 1;
            }
        }
        r
    }

    /// Release a reference; frees at zero unless the sweep already owns
    /// the slot.
    pub fn put(&mut self, r: ObjRef) {
        let ObjRef::Slot(id) = r else { return };
        let slot = self.slot_mut(id);
        if slot.flags & F_STATIC != 0 {
            return;
        }
        debug_assert!(slot.refcount > 0, "release of a dead reference");
        slot.refcount -= 1;
        if slot.refcount == 0 && slot.flags & F_DOOMED == 0 {
            self.free_slot(id);
        }
    }

    pub(crate) fn free_slot(&mut self, id: SlotId) {
        log::trace!("freeing slot {}", id.index);
        let slot = self.slab.remove(id.index as usize);
        self.generations[id.index as usize] += 1;
        self.release_guts(slot);
    }

    /// Release everything a slot holds references to. Split from
    /// `free_slot` so the sweep can run it on doomed slots before the
    /// storage goes away.
    pub(crate) fn release_guts(&mut self, slot: Slot) {
        for p in slot.props {
            self.put(p.value);
        }
        match slot.payload {
            Payload::Func(f) => self.put(f.scope),
            Payload::View(v) => self.put(v.buffer),
            Payload::Args(items) => {
                for item in items {
                    self.put(item);
                }
            }
            _ => {}
        }
    }

    pub fn class_of(&self, r: ObjRef) -> Class {
        match r {
            ObjRef::Int(_) => Class::Num,
            ObjRef::Slot(id) => self.slot(id).class,
        }
    }

    pub(crate) fn is_string(&self, r: ObjRef) -> bool {
        self.class_of(r) == Class::String
    }

    pub(crate) fn num_value(&self, r: ObjRef) -> Option<Num> {
        match r {
            ObjRef::Int(i) => Some(Num::Int(i)),
            ObjRef::Slot(id) => match &self.slot(id).payload {
                Payload::Num(n) => Some(*n),
                _ => None,
            },
        }
    }

    pub(crate) fn str_value(&self, r: ObjRef) -> Option<Rc<str>> {
        match r {
            ObjRef::Slot(id) => match &self.slot(id).payload {
                Payload::Str(s) => Some(s.clone()),
                _ => None,
            },
            ObjRef::Int(_) => None,
        }
    }

    /*** Constructors ***/

    pub(crate) fn new_num(&mut self, n: Num) -> ObjRef {
        match n.normalized() {
            Num::Int(i) => ObjRef::Int(i),
            fp => self.alloc(Class::Num, Payload::Num(fp)),
        }
    }

    pub(crate) fn new_fp(&mut self, v: f64) -> ObjRef {
        self.new_num(Num::Fp(v))
    }

    pub(crate) fn new_string(&mut self, s: Rc<str>) -> ObjRef {
        let len = s.chars().count() as i32;
        let r = self.alloc(Class::String, Payload::Str(s));
        self.insert_prop(r, LENGTH, true, ObjRef::Int(len));
        r
    }

    pub(crate) fn new_object(&mut self) -> ObjRef {
        self.alloc(Class::Object, Payload::Plain)
    }

    pub(crate) fn new_array(&mut self) -> ObjRef {
        let r = self.alloc(Class::Array, Payload::Plain);
        self.insert_prop(r, LENGTH, true, ObjRef::Int(0));
        r
    }

    /// A scope object. `outer` (if any) becomes the internal prototype,
    /// which is how closures see enclosing bindings.
    pub(crate) fn new_env(&mut self, outer: Option<ObjRef>) -> ObjRef {
        let r = self.alloc(Class::Env, Payload::Plain);
        if let Some(outer) = outer {
            self.get(outer);
            self.insert_prop(r, PROTOTYPE, true, outer);
        }
        r
    }

    /// Functions are born with a fresh `prototype` object for their
    /// instances to inherit from.
    pub(crate) fn new_function(
        &mut self,
        params: Vec<Rc<str>>,
        code: FuncCode,
        scope: ObjRef,
    ) -> ObjRef {
        self.get(scope);
        let r = self.alloc(Class::Function, Payload::Func(FuncData { params, code, scope }));
        let proto = self.new_object();
        self.insert_prop(r, PROTOTYPE, true, proto);
        r
    }

    pub(crate) fn new_array_buffer(&mut self, length: usize) -> ObjRef {
        self.alloc(
            Class::ArrayBuffer,
            Payload::Buffer(std::cell::RefCell::new(vec![0; length])),
        )
    }

    pub(crate) fn new_array_buffer_view(
        &mut self,
        buffer: ObjRef,
        shift: u8,
        unsigned: bool,
        offset: usize,
        length: usize,
    ) -> ObjRef {
        self.get(buffer);
        self.alloc(
            Class::ArrayBufferView,
            Payload::View(ViewData { buffer, shift, unsigned, offset, length }),
        )
    }

    /// Snapshot of a call's user arguments (`argv[0]` is the function and
    /// is not included).
    pub(crate) fn new_arguments(&mut self, argv: &[ObjRef]) -> ObjRef {
        let items: Vec<ObjRef> = argv[1..].iter().map(|&a| self.get(a)).collect();
        self.alloc(Class::Arguments, Payload::Args(items))
    }

    pub(crate) fn new_pointer(&mut self, ptr: Rc<dyn std::any::Any>) -> ObjRef {
        self.alloc(Class::Pointer, Payload::Pointer(ptr))
    }

    /*** Properties ***/

    fn insert_prop(&mut self, o: ObjRef, key: &str, internal: bool, value: ObjRef) {
        let ObjRef::Slot(id) = o else { unreachable!("property on an immediate") };
        self.slot_mut(id).props.push(Prop { key: key.into(), internal, value });
    }

    fn stored_prop_pos(&self, id: SlotId, key: &str) -> Option<usize> {
        self.slot(id).props.iter().position(|p| &*p.key == key)
    }

    /// Read a stored own property without hooks (acquired), e.g. the
    /// internal `prototype` link.
    pub(crate) fn stored_own_property(&mut self, o: ObjRef, key: &str) -> Option<ObjRef> {
        let ObjRef::Slot(id) = o else { return None };
        let pos = self.stored_prop_pos(id, key)?;
        let v = self.slot(id).props[pos].value;
        Some(self.get(v))
    }

    /// Own-property lookup: stored properties first, then the class hook
    /// (string indexing, typed-array elements, arguments, buffer
    /// byteLength). Returns the acquired value plus a writable location
    /// when one exists.
    pub(crate) fn get_own_property(
        &mut self,
        o: ObjRef,
        key: &str,
    ) -> Option<(ObjRef, Option<PropRef>)> {
        let ObjRef::Slot(id) = o else { return None };
        if let Some(pos) = self.stored_prop_pos(id, key) {
            let p = &self.slot(id).props[pos];
            let (v, k) = (p.value, p.key.clone());
            self.get(v);
            return Some((v, Some(PropRef { owner: id, key: k })));
        }
        self.class_own_property(id, key).map(|v| (v, None))
    }

    fn class_own_property(&mut self, id: SlotId, key: &str) -> Option<ObjRef> {
        match self.slot(id).class {
            Class::String => {
                let Payload::Str(s) = &self.slot(id).payload else { unreachable!() };
                let idx: usize = key.parse().ok()?;
                let c = s.chars().nth(idx)?;
                Some(self.new_string(c.to_string().into()))
            }
            Class::ArrayBuffer => {
                if key != "byteLength" {
                    return None;
                }
                let Payload::Buffer(b) = &self.slot(id).payload else { unreachable!() };
                Some(ObjRef::Int(b.borrow().len() as i32))
            }
            Class::ArrayBufferView => {
                let Payload::View(v) = &self.slot(id).payload else { unreachable!() };
                match key {
                    LENGTH => return Some(ObjRef::Int(v.length as i32)),
                    "BYTES_PER_ELEMENT" => return Some(ObjRef::Int(1 << v.shift)),
                    "buffer" => {
                        let buf = v.buffer;
                        return Some(self.get(buf));
                    }
                    _ => {}
                }
                let idx: usize = key.parse().ok()?;
                if idx >= v.length {
                    return None;
                }
                Some(ObjRef::Int(self.view_get(id, idx)))
            }
            Class::Arguments => {
                let Payload::Args(items) = &self.slot(id).payload else { unreachable!() };
                if key == LENGTH {
                    return Some(ObjRef::Int(items.len() as i32));
                }
                let idx: usize = key.parse().ok()?;
                let item = *items.get(idx)?;
                Some(self.get(item))
            }
            _ => None,
        }
    }

    /// Full lookup: own, then the prototype chain, then the class-shared
    /// prototype. Env objects stop after the prototype chain (their
    /// prototype is the outer scope, and unbound names must stay
    /// unbound). Writable locations survive the chain walk only for env
    /// objects; class prototypes are never writable through an instance.
    pub(crate) fn get_property(
        &mut self,
        o: ObjRef,
        key: &str,
    ) -> (Option<ObjRef>, Option<PropRef>) {
        if let Some((v, pr)) = self.get_own_property(o, key) {
            return (Some(v), pr);
        }

        let mut val = None;
        let mut prop_ref = None;
        if let Some(proto) = self.stored_own_property(o, PROTOTYPE) {
            if proto != UNDEF {
                let (v, pr) = self.get_property(proto, key);
                val = v;
                prop_ref = pr;
            }
            self.put(proto);
        }

        if self.class_of(o) == Class::Env {
            return (val, prop_ref);
        }

        if val.is_none() {
            let cp = self.class_protos[self.class_of(o).index()];
            if cp != UNDEF && cp != o {
                let (v, _) = self.get_property(cp, key);
                val = v;
            }
        }
        (val, None)
    }

    pub(crate) fn has_property(&mut self, o: ObjRef, key: &str) -> bool {
        let (v, _) = self.get_property(o, key);
        match v {
            Some(v) => {
                self.put(v);
                true
            }
            None => false,
        }
    }

    /// Store through a writable location, bypassing hooks. Takes
    /// ownership of `value`'s reference and releases the old value.
    pub(crate) fn write_prop_ref(&mut self, pr: &PropRef, value: ObjRef) {
        let key = pr.key.clone();
        let pos = self
            .stored_prop_pos(pr.owner, &key)
            .expect("writable property vanished");
        let old = std::mem::replace(&mut self.slot_mut(pr.owner).props[pos].value, value);
        self.put(old);
    }

    /// Generic property store. Takes ownership of `value`'s reference.
    /// Class hooks may intercept (typed-array element writes); the Array
    /// pre-creation hook keeps `length` at highest index + 1.
    pub(crate) fn set_property(&mut self, o: ObjRef, key: &str, value: ObjRef) {
        let ObjRef::Slot(id) = o else {
            self.put(value);
            return;
        };

        if self.slot(id).class == Class::ArrayBufferView {
            if let Ok(idx) = key.parse::<usize>() {
                let val = self.get_int(value);
                self.put(value);
                let Payload::View(v) = &self.slot(id).payload else { unreachable!() };
                if idx < v.length {
                    self.view_set(id, idx, val);
                }
                // Out of range stores are dropped.
                return;
            }
        }

        if self.slot(id).class == Class::Array {
            if let Ok(idx) = key.parse::<i32>() {
                let len = self.array_length(o);
                if idx >= len {
                    self.array_set_length(o, idx + 1);
                }
            }
        }

        match self.stored_prop_pos(id, key) {
            Some(pos) => {
                let old = std::mem::replace(&mut self.slot_mut(id).props[pos].value, value);
                self.put(old);
            }
            None => self.insert_prop(o, key, false, value),
        }
    }

    /// Like [`set_property`](Self::set_property) but the key stays hidden
    /// from enumeration.
    pub(crate) fn set_internal_property(&mut self, o: ObjRef, key: &str, value: ObjRef) {
        let ObjRef::Slot(id) = o else {
            self.put(value);
            return;
        };
        match self.stored_prop_pos(id, key) {
            Some(pos) => {
                let old = std::mem::replace(&mut self.slot_mut(id).props[pos].value, value);
                self.put(old);
            }
            None => self.insert_prop(o, key, true, value),
        }
    }

    /// Point `child`'s prototype at `parent`'s own `prototype` object
    /// (the `new` relationship).
    pub(crate) fn inherit(&mut self, child: ObjRef, parent: ObjRef) {
        let proto = self.stored_own_property(parent, PROTOTYPE).unwrap_or(UNDEF);
        self.set_internal_property(child, PROTOTYPE, proto);
    }

    /// Enumerable key list for `for`-`in`: own non-internal keys, then
    /// the prototype chain's.
    pub(crate) fn enum_keys(&self, o: ObjRef) -> Vec<Rc<str>> {
        let mut keys = Vec::new();
        let mut cur = o;
        loop {
            let ObjRef::Slot(id) = cur else { break };
            let slot = self.slot(id);
            for p in &slot.props {
                if !p.internal {
                    keys.push(p.key.clone());
                }
            }
            match slot.props.iter().find(|p| &*p.key == PROTOTYPE) {
                Some(p) if p.value != UNDEF => cur = p.value,
                _ => break,
            }
        }
        keys
    }

    /*** Arrays ***/

    pub(crate) fn array_length(&mut self, arr: ObjRef) -> i32 {
        let (v, _) = self.get_property(arr, LENGTH);
        match v {
            Some(v) => {
                let n = self.get_int(v);
                self.put(v);
                n
            }
            None => 0,
        }
    }

    pub(crate) fn array_set_length(&mut self, arr: ObjRef, length: i32) {
        self.set_internal_property(arr, LENGTH, ObjRef::Int(length));
    }

    /// Append, returning the new length. Takes ownership of `item`'s
    /// reference.
    pub(crate) fn array_push(&mut self, arr: ObjRef, item: ObjRef) -> i32 {
        let len = self.array_length(arr);
        // Store directly so the length hook is not re-triggered.
        let key = len.to_string();
        let ObjRef::Slot(id) = arr else {
            self.put(item);
            return 0;
        };
        match self.stored_prop_pos(id, &key) {
            Some(pos) => {
                let old = std::mem::replace(&mut self.slot_mut(id).props[pos].value, item);
                self.put(old);
            }
            None => self.insert_prop(arr, &key, false, item),
        }
        self.array_set_length(arr, len + 1);
        len + 1
    }

    /// Remove and return the last element (acquired), or undefined.
    pub(crate) fn array_pop(&mut self, arr: ObjRef) -> ObjRef {
        let len = self.array_length(arr);
        if len == 0 {
            return UNDEF;
        }
        let key = (len - 1).to_string();
        let ObjRef::Slot(id) = arr else { return UNDEF };
        let ret = match self.stored_prop_pos(id, &key) {
            Some(pos) => self.slot_mut(id).props.remove(pos).value,
            None => UNDEF,
        };
        self.array_set_length(arr, len - 1);
        ret
    }

    /// Element at `index` (acquired), or None for a hole.
    pub(crate) fn array_lookup(&mut self, arr: ObjRef, index: i32) -> Option<ObjRef> {
        self.get_own_property(arr, &index.to_string()).map(|(v, _)| v)
    }

    pub(crate) fn array_join(&mut self, arr: ObjRef, sep: &str) -> String {
        let len = self.array_length(arr);
        let mut out = String::new();
        for k in 0..len {
            if k > 0 {
                out.push_str(sep);
            }
            if let Some(item) = self.array_lookup(arr, k) {
                if item != UNDEF && item != NULL {
                    out.push_str(&self.get_str(item));
                }
                self.put(item);
            }
        }
        out
    }

    /*** Typed array element access ***/

    fn view_get(&self, id: SlotId, idx: usize) -> i32 {
        let Payload::View(v) = &self.slot(id).payload else { unreachable!() };
        let (shift, unsigned, byte) = (v.shift, v.unsigned, (v.offset + idx) << v.shift);
        let ObjRef::Slot(buf_id) = v.buffer else { unreachable!() };
        let Payload::Buffer(buf) = &self.slot(buf_id).payload else { unreachable!() };
        let buf = buf.borrow();
        match (shift, unsigned) {
            (0, true) => buf[byte] as i32,
            (0, false) => buf[byte] as i8 as i32,
            (1, true) => u16::from_le_bytes([buf[byte], buf[byte + 1]]) as i32,
            (1, false) => i16::from_le_bytes([buf[byte], buf[byte + 1]]) as i32,
            (2, _) => i32::from_le_bytes([
                buf[byte],
                buf[byte + 1],
                buf[byte + 2],
                buf[byte + 3],
            ]),
            _ => 0,
        }
    }

    fn view_set(&mut self, id: SlotId, idx: usize, val: i32) {
        let Payload::View(v) = &self.slot(id).payload else { unreachable!() };
        let (shift, byte) = (v.shift, (v.offset + idx) << v.shift);
        let ObjRef::Slot(buf_id) = v.buffer else { unreachable!() };
        let Payload::Buffer(buf) = &self.slot(buf_id).payload else { unreachable!() };
        let mut buf = buf.borrow_mut();
        match shift {
            0 => buf[byte] = val as u8,
            1 => buf[byte..byte + 2].copy_from_slice(&(val as u16).to_le_bytes()),
            2 => buf[byte..byte + 4].copy_from_slice(&val.to_le_bytes()),
            _ => {}
        }
    }

    /*** Truthiness, casts, extraction ***/

    pub(crate) fn is_true(&self, r: ObjRef) -> bool {
        match r {
            ObjRef::Int(i) => i != 0,
            ObjRef::Slot(id) => match &self.slot(id).payload {
                Payload::Bool(b) => *b,
                Payload::Num(n) => n.to_f64() != 0.0,
                Payload::Str(s) => !s.is_empty(),
                _ => !matches!(self.slot(id).class, Class::Undefined | Class::Null),
            },
        }
    }

    /// Class-dispatched conversion. Returns an acquired reference;
    /// unsupported conversions yield undefined.
    pub(crate) fn cast(&mut self, o: ObjRef, class: Class) -> ObjRef {
        if class == self.class_of(o) && !matches!(class, Class::Undefined | Class::Object) {
            return self.get(o);
        }
        match (self.class_of(o), class) {
            (Class::Num, Class::String) => {
                let n = self.num_value(o).unwrap_or(Num::Fp(f64::NAN));
                self.new_string(n.to_string().into())
            }
            (Class::Undefined, Class::String) => self.new_string("undefined".into()),
            (Class::Undefined, Class::Num) => NAN,
            (Class::Null, Class::String) => self.new_string("null".into()),
            (Class::Null, Class::Num) => ObjRef::Int(0),
            (Class::Bool, Class::String) => {
                self.new_string(if self.is_true(o) { "true" } else { "false" }.into())
            }
            (Class::Bool, Class::Num) => ObjRef::Int(self.is_true(o) as i32),
            (Class::String, Class::Num) => {
                let s = self.str_value(o).unwrap();
                match number::parse_num(s.trim()) {
                    Some(n) => self.new_num(n),
                    None => NAN,
                }
            }
            (Class::String, Class::Bool) => {
                if self.is_true(o) { TRUE } else { FALSE }
            }
            (Class::Function, Class::String) => self.new_string("function".into()),
            (Class::Object | Class::Env, Class::String) => self.new_string("Object".into()),
            (Class::Object, Class::Num) => NAN,
            (Class::Array, Class::String) => {
                let s = self.array_join(o, ",");
                self.new_string(s.into())
            }
            (Class::ArrayBuffer, Class::String) => {
                self.new_string("[object ArrayBuffer]".into())
            }
            (Class::ArrayBufferView, Class::String) => {
                let ObjRef::Slot(id) = o else { unreachable!() };
                let Payload::View(v) = &self.slot(id).payload else { unreachable!() };
                let name = match (v.shift, v.unsigned) {
                    (0, true) => "[object Uint8Array]",
                    (0, false) => "[object Int8Array]",
                    (1, true) => "[object Uint16Array]",
                    (1, false) => "[object Int16Array]",
                    (2, true) => "[object Uint32Array]",
                    (2, false) => "[object Int32Array]",
                    _ => "ArrayBufferView",
                };
                self.new_string(name.into())
            }
            _ => UNDEF,
        }
    }

    pub(crate) fn get_int(&mut self, o: ObjRef) -> i32 {
        if let ObjRef::Int(i) = o {
            return i;
        }
        let n = self.cast(o, Class::Num);
        let ret = match self.num_value(n) {
            Some(Num::Int(i)) => i,
            Some(Num::Fp(f)) => f as i32,
            None => 0,
        };
        self.put(n);
        ret
    }

    pub(crate) fn get_fp(&mut self, o: ObjRef) -> f64 {
        let n = self.cast(o, Class::Num);
        let ret = self.num_value(n).map(Num::to_f64).unwrap_or(f64::NAN);
        self.put(n);
        ret
    }

    pub(crate) fn get_str(&mut self, o: ObjRef) -> Rc<str> {
        let s = self.cast(o, Class::String);
        let ret = self.str_value(s).unwrap_or_else(|| "undefined".into());
        self.put(s);
        ret
    }

    /*** Operators ***/

    /// Binary (and marker-encoded unary) operator dispatch. Consumes both
    /// operand references and returns an acquired result.
    pub(crate) fn do_op(&mut self, op: Tok, mut oa: ObjRef, mut ob: ObjRef) -> ObjRef {
        let ret = 'result: {
            match op {
                Tok::NOT => {
                    break 'result if self.is_true(ob) { FALSE } else { TRUE };
                }
                Tok::LOG_AND => {
                    break 'result if self.is_true(oa) && self.is_true(ob) { TRUE } else { FALSE };
                }
                Tok::LOG_OR => {
                    break 'result if self.is_true(oa) || self.is_true(ob) { TRUE } else { FALSE };
                }
                Tok::IN => {
                    let key = self.get_str(oa);
                    break 'result if self.has_property(ob, &key) { TRUE } else { FALSE };
                }
                Tok::MULT | Tok::DIV | Tok::MOD | Tok::MINUS => {
                    oa = self.coerce_num(oa);
                    ob = self.coerce_num(ob);
                }
                Tok::GT | Tok::GE => {
                    if oa == UNDEF {
                        break 'result FALSE;
                    }
                }
                Tok::LT | Tok::LE => {
                    if ob == UNDEF {
                        break 'result FALSE;
                    }
                }
                Tok::IS_EQ_STRICT | Tok::NOT_EQ_STRICT => {
                    if self.class_of(oa) != self.class_of(ob) {
                        break 'result if op == Tok::NOT_EQ_STRICT { TRUE } else { FALSE };
                    }
                }
                _ => {}
            }
            let base = op.without_strict();
            self.class_do_op(base, oa, ob)
        };
        self.put(oa);
        self.put(ob);
        ret
    }

    fn coerce_num(&mut self, o: ObjRef) -> ObjRef {
        if self.class_of(o) == Class::Num {
            return o;
        }
        let n = self.cast(o, Class::Num);
        self.put(o);
        n
    }

    fn class_do_op(&mut self, op: Tok, oa: ObjRef, ob: ObjRef) -> ObjRef {
        match self.class_of(oa) {
            Class::Num => self.num_do_op(op, oa, ob),
            Class::Undefined => self.undefined_do_op(op, oa, ob),
            Class::Null => self.null_do_op(op, ob),
            Class::Bool => self.bool_do_op(op, oa, ob),
            Class::String => self.string_do_op(op, oa, ob),
            Class::Array if op == Tok::PLUS => {
                let sa = self.cast(oa, Class::String);
                let ob2 = self.get(ob);
                self.do_op(op, sa, ob2)
            }
            _ => self.identity_do_op(op, oa, ob),
        }
    }

    fn identity_do_op(&mut self, op: Tok, oa: ObjRef, ob: ObjRef) -> ObjRef {
        match op {
            Tok::IS_EQ => {
                if oa == ob { TRUE } else { FALSE }
            }
            Tok::NOT_EQ => {
                if oa != ob { TRUE } else { FALSE }
            }
            _ => {
                log::error!("operator {} not defined for this class", op);
                UNDEF
            }
        }
    }

    fn num_do_op(&mut self, op: Tok, oa: ObjRef, ob: ObjRef) -> ObjRef {
        // If the rvalue is a string this becomes a string operation,
        // unless the lvalue is the unary marker, which takes precedence.
        if oa != ZERO && self.is_string(ob) {
            let sa = self.cast(oa, Class::String);
            let ob2 = self.get(ob);
            return self.do_op(op, sa, ob2);
        }

        let obn = self.cast(ob, Class::Num);
        let nan = oa == NAN || obn == NAN;
        let a = self.num_value(oa).unwrap_or(Num::Fp(f64::NAN));
        let b = self.num_value(obn).unwrap_or(Num::Fp(f64::NAN));
        log::trace!("num op {} on {:?} {:?}", op, a, b);

        let ret = if a.is_fp() || b.is_fp() {
            let (va, vb) = (a.to_f64(), b.to_f64());
            match op {
                _ if nan && !matches!(op, Tok::NOT_EQ) => match op {
                    Tok::GT | Tok::GE | Tok::LT | Tok::LE | Tok::IS_EQ => FALSE,
                    _ => NAN,
                },
                Tok::PLUS => self.new_fp(va + vb),
                Tok::PLUS_PLUS => self.new_fp(va + 1.0),
                Tok::MINUS => self.new_fp(va - vb),
                Tok::MINUS_MINUS => self.new_fp(va - 1.0),
                Tok::MULT => self.new_fp(va * vb),
                Tok::DIV => self.new_fp(va / vb),
                Tok::MOD => self.new_fp(va % vb),
                Tok::TILDE => ObjRef::Int(!number::to_int32(vb)),
                Tok::AND => ObjRef::Int(number::to_int32(va) & number::to_int32(vb)),
                Tok::OR => ObjRef::Int(number::to_int32(va) | number::to_int32(vb)),
                Tok::XOR => ObjRef::Int(number::to_int32(va) ^ number::to_int32(vb)),
                Tok::GT => bool_obj(va > vb),
                Tok::GE => bool_obj(va > vb || fp_is_eq(va, vb)),
                Tok::LT => bool_obj(va < vb),
                Tok::LE => bool_obj(va < vb || fp_is_eq(va, vb)),
                Tok::IS_EQ => bool_obj(fp_is_eq(va, vb)),
                Tok::NOT_EQ => bool_obj(nan || !fp_is_eq(va, vb)),
                Tok::SHR => {
                    ObjRef::Int(number::to_int32(va) >> (number::to_int32(vb) & 31))
                }
                Tok::SHRZ => ObjRef::Int(
                    (number::to_uint32(va) >> (number::to_int32(vb) & 31)) as i32,
                ),
                Tok::SHL => {
                    ObjRef::Int(number::to_int32(va) << (number::to_int32(vb) & 31))
                }
                _ => {
                    log::error!("operator {} not defined for numbers", op);
                    UNDEF
                }
            }
        } else {
            let (va, vb) = match (a, b) {
                (Num::Int(va), Num::Int(vb)) => (va, vb),
                _ => unreachable!(),
            };
            match op {
                _ if nan && !matches!(op, Tok::NOT_EQ) => match op {
                    Tok::GT | Tok::GE | Tok::LT | Tok::LE | Tok::IS_EQ => FALSE,
                    _ => NAN,
                },
                Tok::PLUS => ObjRef::Int(va.wrapping_add(vb)),
                Tok::PLUS_PLUS => ObjRef::Int(va.wrapping_add(1)),
                Tok::MINUS => ObjRef::Int(va.wrapping_sub(vb)),
                Tok::MINUS_MINUS => ObjRef::Int(va.wrapping_sub(1)),
                Tok::TILDE => ObjRef::Int(!vb),
                Tok::MULT => ObjRef::Int(va.wrapping_mul(vb)),
                // Integer division promotes, like every division does.
                Tok::DIV => self.new_fp(va as f64 / vb as f64),
                Tok::MOD => {
                    if vb == 0 {
                        NAN
                    } else {
                        ObjRef::Int(va.wrapping_rem(vb))
                    }
                }
                Tok::AND => ObjRef::Int(va & vb),
                Tok::OR => ObjRef::Int(va | vb),
                Tok::XOR => ObjRef::Int(va ^ vb),
                Tok::GT => bool_obj(va > vb),
                Tok::GE => bool_obj(va >= vb),
                Tok::LT => bool_obj(va < vb),
                Tok::LE => bool_obj(va <= vb),
                Tok::IS_EQ => bool_obj(va == vb),
                Tok::NOT_EQ => bool_obj(nan || va != vb),
                Tok::SHR => ObjRef::Int(va >> (vb & 31)),
                Tok::SHRZ => ObjRef::Int(((va as u32) >> (vb as u32 & 31)) as i32),
                Tok::SHL => ObjRef::Int(va << (vb & 31)),
                _ => {
                    log::error!("operator {} not defined for numbers", op);
                    UNDEF
                }
            }
        };
        self.put(obn);
        ret
    }

    fn undefined_do_op(&mut self, op: Tok, oa: ObjRef, ob: ObjRef) -> ObjRef {
        if matches!(self.class_of(ob), Class::String | Class::Num) {
            let ca = self.cast(oa, self.class_of(ob));
            let ob2 = self.get(ob);
            return self.do_op(op, ca, ob2);
        }
        match op {
            Tok::NOT_EQ => bool_obj(!(ob == UNDEF || ob == NULL)),
            Tok::IS_EQ => bool_obj(ob == UNDEF || ob == NULL),
            _ => UNDEF,
        }
    }

    fn null_do_op(&mut self, op: Tok, ob: ObjRef) -> ObjRef {
        match op {
            Tok::NOT_EQ => bool_obj(!(ob == NULL || ob == UNDEF)),
            Tok::IS_EQ => bool_obj(ob == NULL || ob == UNDEF),
            _ => NULL,
        }
    }

    fn bool_do_op(&mut self, op: Tok, oa: ObjRef, ob: ObjRef) -> ObjRef {
        if matches!(self.class_of(ob), Class::String | Class::Num) {
            let ca = self.cast(oa, self.class_of(ob));
            let ob2 = self.get(ob);
            return self.do_op(op, ca, ob2);
        }
        match op {
            Tok::NOT_EQ => bool_obj(oa != ob),
            Tok::IS_EQ => bool_obj(oa == ob),
            _ => {
                log::error!("operator {} not defined for booleans", op);
                UNDEF
            }
        }
    }

    fn string_do_op(&mut self, op: Tok, oa: ObjRef, ob: ObjRef) -> ObjRef {
        let a = self.str_value(oa).unwrap();
        let obs = self.cast(ob, Class::String);
        let b = self.str_value(obs).unwrap_or_else(|| "undefined".into());
        let ret = match op {
            Tok::NOT_EQ => bool_obj(a != b),
            Tok::IS_EQ => bool_obj(a == b),
            Tok::GT => bool_obj(*a > *b),
            Tok::LT => bool_obj(*a < *b),
            Tok::GE => bool_obj(*a >= *b),
            Tok::LE => bool_obj(*a <= *b),
            Tok::PLUS => {
                let mut s = a.to_string();
                s.push_str(&b);
                self.new_string(s.into())
            }
            _ => {
                log::error!("operator {} not defined for strings", op);
                UNDEF
            }
        };
        self.put(obs);
        ret
    }

    /*** Formatting ***/

    /// Debug-style rendering: strings quoted, containers expanded.
    pub fn format_value(&self, o: ObjRef) -> String {
        match o {
            ObjRef::Int(i) => i.to_string(),
            ObjRef::Slot(id) => {
                let slot = self.slot(id);
                match (&slot.payload, slot.class) {
                    (_, Class::Undefined) => "undefined".into(),
                    (_, Class::Null) => "null".into(),
                    (Payload::Bool(b), _) => b.to_string(),
                    (Payload::Num(n), _) => n.to_string(),
                    (Payload::Str(s), _) => format!("\"{s}\""),
                    (Payload::Func(f), _) => {
                        let params: Vec<&str> =
                            f.params.iter().skip(1).map(|p| p.as_ref()).collect();
                        format!("Function({})", params.join(", "))
                    }
                    (Payload::Buffer(b), _) => format!("ArrayBuffer({})", b.borrow().len()),
                    (Payload::View(v), _) => format!("ArrayBufferView({})", v.length),
                    (Payload::Args(items), _) => format!("Arguments({})", items.len()),
                    (Payload::Pointer(_), _) => "[pointer]".into(),
                    (Payload::Plain, Class::Array) => self.format_array(o),
                    (Payload::Plain, _) => self.format_object(id),
                }
            }
        }
    }

    fn format_object(&self, id: SlotId) -> String {
        let mut out = String::from("{ ");
        let mut first = true;
        for p in &self.slot(id).props {
            if p.internal {
                continue;
            }
            if !first {
                out.push_str(", ");
            }
            first = false;
            out.push_str(&p.key);
            out.push_str(" : ");
            out.push_str(&self.format_value(p.value));
        }
        out.push_str(" }");
        out
    }

    fn format_array(&self, arr: ObjRef) -> String {
        let ObjRef::Slot(id) = arr else { return "[ ]".into() };
        let len = self
            .slot(id)
            .props
            .iter()
            .find(|p| &*p.key == LENGTH)
            .and_then(|p| match p.value {
                ObjRef::Int(i) => Some(i),
                _ => None,
            })
            .unwrap_or(0);
        let mut out = String::from("[ ");
        let mut first = true;
        let mut undef_streak = 0;
        for k in 0..len {
            let key = k.to_string();
            let item = self.slot(id).props.iter().find(|p| &*p.key == key);
            let Some(item) = item else {
                undef_streak += 1;
                continue;
            };
            if !first {
                out.push_str(", ");
            }
            first = false;
            if undef_streak > 0 {
                out.push_str(&format!("undefined x {undef_streak}, "));
                undef_streak = 0;
            }
            out.push_str(&self.format_value(item.value));
        }
        out.push_str(" ]");
        out
    }
}

fn bool_obj(b: bool) -> ObjRef {
    if b { TRUE } else { FALSE }
}
