//! Two-color mark-sweep backup for the reference counter. Refcounting
//! frees acyclic garbage promptly; this pass reclaims cycles (an env
//! capturing a function whose scope is that env, objects pointing at
//! each other).
//!
//! The live color flips every run, so no clearing pass is needed: a
//! slot carrying the previous cycle's color is simply unmarked now.

use crate::core::value::{
    Heap, ObjRef, Payload, SlotId, F_DOOMED, F_MARK0, F_MARK1, F_STATIC,
};

impl Heap {
    /// Collect cycles: mark everything reachable from `roots` (class
    /// prototypes are implicit roots), then free the rest.
    pub(crate) fn gc(&mut self, roots: &[ObjRef]) {
        self.mark = if self.mark == F_MARK0 { F_MARK1 } else { F_MARK0 };
        let protos = self.class_protos;
        for r in protos {
            self.mark_from(r);
        }
        for &r in roots {
            self.mark_from(r);
        }
        self.sweep(false);
    }

    /// Tear down every non-static slot regardless of reachability.
    /// Interpreter shutdown path.
    pub(crate) fn sweep_all(&mut self) {
        self.sweep(true);
    }

    /// Iterative mark with an explicit worklist; recursion depth would
    /// otherwise track object-graph depth.
    fn mark_from(&mut self, root: ObjRef) {
        let mark = self.mark;
        let other = if mark == F_MARK0 { F_MARK1 } else { F_MARK0 };
        let mut work = vec![root];
        while let Some(r) = work.pop() {
            let ObjRef::Slot(id) = r else { continue };
            let slot = self.slot_mut(id);
            if slot.flags & mark != 0 {
                continue;
            }
            slot.flags = (slot.flags & !other) | mark;

            let slot = self.slot(id);
            for p in &slot.props {
                work.push(p.value);
            }
            match &slot.payload {
                Payload::Func(f) => work.push(f.scope),
                Payload::View(v) => work.push(v.buffer),
                Payload::Args(items) => work.extend(items.iter().copied()),
                _ => {}
            }
        }
    }

    /// Free unmarked slots in three phases: doom them all first, then
    /// release what they hold, then drop the storage. Dooming first
    /// keeps `put` from freeing a peer mid-sweep and invalidating the
    /// doomed list.
    fn sweep(&mut self, all: bool) {
        let mut doomed: Vec<SlotId> = Vec::new();
        for index in self.slab.used_indices() {
            let slot = self.slab.get_mut(index).expect("used index");
            if slot.flags & F_STATIC != 0 {
                continue;
            }
            if all || slot.flags & self.mark == 0 {
                slot.flags |= F_DOOMED;
                doomed.push(SlotId {
                    index: index as u32,
                    generation: self.generations[index],
                });
            }
        }

        for &id in &doomed {
            let slot = self.slot_mut(id);
            let props = std::mem::take(&mut slot.props);
            let payload = std::mem::replace(&mut slot.payload, Payload::Plain);
            for p in props {
                self.put(p.value);
            }
            match payload {
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

        if !doomed.is_empty() {
            log::debug!("gc sweep reclaimed {} slots", doomed.len());
        }
        for id in doomed {
            self.slab.remove(id.index as usize);
            self.generations[id.index as usize] += 1;
        }
    }
}
