//! Slab allocation for the object heap.
//!
//! The runtime targets devices where the heap is a hard budget, so every
//! block allocation is charged against a configured limit. When a block
//! would exceed the limit, registered "squeeze" callbacks are invoked in
//! registration order and asked to release memory (the slab's own squeezer
//! destroys any block whose slots are all free), then the reservation is
//! retried once. If it still does not fit, the allocator aborts: a partial
//! allocation failure mid-evaluation has no safe recovery point.

/// Byte accounting against a fixed limit.
pub struct MemAccount {
    used: usize,
    limit: usize,
}

impl MemAccount {
    pub fn new(limit: usize) -> Self {
        MemAccount { used: 0, limit }
    }

    fn reserve(&mut self, size: usize) -> bool {
        if self.used + size > self.limit {
            return false;
        }
        self.used += size;
        true
    }

    fn release(&mut self, size: usize) {
        debug_assert!(size <= self.used);
        self.used -= size;
    }

    pub fn used(&self) -> usize {
        self.used
    }
}

enum Entry<T> {
    Free { next: Option<usize> },
    Used(T),
}

struct Block<T> {
    slots: Vec<Entry<T>>,
    free_head: Option<usize>,
    free_count: usize,
}

impl<T> Block<T> {
    fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        for i in 0..capacity {
            let next = if i + 1 < capacity { Some(i + 1) } else { None };
            slots.push(Entry::Free { next });
        }
        Block {
            slots,
            free_head: Some(0),
            free_count: capacity,
        }
    }
}

/// A cache of fixed-size items, organized as a list of fixed-capacity
/// blocks, each with an intrusive free list. Item indices are stable for
/// the lifetime of the item.
pub struct Slab<T> {
    blocks: Vec<Option<Block<T>>>,
    block_capacity: usize,
    used: usize,
}

impl<T> Slab<T> {
    pub fn new(block_capacity: usize) -> Self {
        assert!(block_capacity > 0);
        Slab {
            blocks: Vec::new(),
            block_capacity,
            used: 0,
        }
    }

    /// Bytes charged for one block of this slab.
    pub fn block_bytes(&self) -> usize {
        self.block_capacity * std::mem::size_of::<Entry<T>>() + std::mem::size_of::<Block<T>>()
    }

    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Place `item` in an existing free slot. Gives the item back if every
    /// block is full; growing is the caller's (accounted) decision.
    pub fn try_insert(&mut self, item: T) -> Result<usize, T> {
        for (bi, block) in self.blocks.iter_mut().enumerate() {
            let Some(block) = block else { continue };
            if let Some(si) = block.free_head {
                match block.slots[si] {
                    Entry::Free { next } => block.free_head = next,
                    Entry::Used(_) => unreachable!("free list points at a used slot"),
                }
                block.slots[si] = Entry::Used(item);
                block.free_count -= 1;
                self.used += 1;
                return Ok(bi * self.block_capacity + si);
            }
        }
        Err(item)
    }

    /// Append a new (empty) block. The caller has already accounted for it.
    pub fn grow(&mut self) {
        let block = Block::new(self.block_capacity);
        // Reuse a squeezed-out hole if there is one, so indices stay compact.
        for slot in self.blocks.iter_mut() {
            if slot.is_none() {
                *slot = Some(block);
                return;
            }
        }
        self.blocks.push(Some(block));
    }

    pub fn remove(&mut self, index: usize) -> T {
        let (bi, si) = (index / self.block_capacity, index % self.block_capacity);
        let block = self.blocks[bi].as_mut().expect("slab index into a dead block");
        let old = std::mem::replace(&mut block.slots[si], Entry::Free { next: block.free_head });
        block.free_head = Some(si);
        block.free_count += 1;
        self.used -= 1;
        match old {
            Entry::Used(item) => item,
            Entry::Free { .. } => panic!("double free of slab index {index}"),
        }
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        let (bi, si) = (index / self.block_capacity, index % self.block_capacity);
        match self.blocks.get(bi)?.as_ref()?.slots.get(si)? {
            Entry::Used(item) => Some(item),
            Entry::Free { .. } => None,
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        let (bi, si) = (index / self.block_capacity, index % self.block_capacity);
        match self.blocks.get_mut(bi)?.as_mut()?.slots.get_mut(si)? {
            Entry::Used(item) => Some(item),
            Entry::Free { .. } => None,
        }
    }

    /// Indices of every occupied slot, in address order. The garbage
    /// collector snapshots this before sweeping so the walk never observes
    /// a list mutated mid-iteration.
    pub fn used_indices(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.used);
        for (bi, block) in self.blocks.iter().enumerate() {
            let Some(block) = block else { continue };
            for (si, entry) in block.slots.iter().enumerate() {
                if matches!(entry, Entry::Used(_)) {
                    out.push(bi * self.block_capacity + si);
                }
            }
        }
        out
    }

    /// Destroy blocks whose free list contains all of their items, until
    /// `goal` bytes have been released or no more blocks qualify. Returns
    /// the bytes released.
    pub fn squeeze(&mut self, goal: usize) -> usize {
        let block_bytes = self.block_bytes();
        let mut released = 0;
        for slot in self.blocks.iter_mut() {
            if released >= goal {
                break;
            }
            let fully_free = matches!(slot, Some(b) if b.free_count == self.block_capacity);
            if fully_free {
                *slot = None;
                released += block_bytes;
            }
        }
        released
    }
}

/// A squeeze callback: asked to release up to `goal` bytes from the slab,
/// returns how many it actually released.
pub type SqueezeFn<T> = fn(&mut Slab<T>, usize) -> usize;

/// Accounting front end for one slab: reservation, squeeze-on-failure,
/// fatal exhaustion.
pub struct Allocator<T> {
    account: MemAccount,
    squeezers: Vec<SqueezeFn<T>>,
}

impl<T> Allocator<T> {
    pub fn new(limit: usize) -> Self {
        Allocator {
            account: MemAccount::new(limit),
            squeezers: Vec::new(),
        }
    }

    pub fn register_squeezer(&mut self, f: SqueezeFn<T>) {
        self.squeezers.push(f);
    }

    /// Charge `size` bytes, squeezing the slab once if over budget.
    /// Aborts on exhaustion -- there is no partial-failure mode.
    pub fn reserve(&mut self, slab: &mut Slab<T>, size: usize) {
        if self.account.reserve(size) {
            return;
        }
        log::debug!("allocation of {size} bytes over budget, squeezing");
        for squeeze in &self.squeezers {
            let released = squeeze(slab, size);
            self.account.release(released);
        }
        if !self.account.reserve(size) {
            panic!(
                "out of memory: {size} bytes requested, {} of {} in use",
                self.account.used, self.account.limit
            );
        }
    }

    pub fn release(&mut self, size: usize) {
        self.account.release(size);
    }

    pub fn used(&self) -> usize {
        self.account.used()
    }
}
