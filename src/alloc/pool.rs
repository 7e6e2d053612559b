//! Generic description-keyed allocator.
//!
//! Entries are scanned linearly for one matching the requested descriptor that is currently idle;
//! a miss falls through to a real native allocation.

use crate::alloc::{Allocator, AllocatorKind, BackingRef};
use crate::descriptor::Descriptor;
use crate::error::Result;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    struct PoolEntryKey;
}

struct Entry {
    descriptor: Descriptor,
    in_use: bool,
    last_used_frame: u64,
}

#[derive(Default)]
pub struct PoolAllocator {
    entries: SlotMap<PoolEntryKey, Entry>,
    slot_of: Vec<PoolEntryKey>,
}

impl PoolAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn key_for_slot(&self, slot: u32) -> PoolEntryKey {
        self.slot_of[slot as usize]
    }
}

impl Allocator for PoolAllocator {
    fn collect(&mut self, descriptor: &Descriptor, frame: u64) -> Result<BackingRef> {
        let found = self.slot_of.iter().position(|&key| {
            let e = &self.entries[key];
            !e.in_use && &e.descriptor == descriptor
        });

        let slot = if let Some(index) = found {
            let entry = &mut self.entries[self.slot_of[index]];
            entry.in_use = true;
            entry.last_used_frame = frame;
            index as u32
        } else {
            let key = self.entries.insert(Entry {
                descriptor: descriptor.clone(),
                in_use: true,
                last_used_frame: frame,
            });
            self.slot_of.push(key);
            (self.slot_of.len() - 1) as u32
        };

        Ok(BackingRef { allocator: AllocatorKind::Pool, slot })
    }

    fn deposit(&mut self, backing: BackingRef, frame: u64) {
        let key = self.key_for_slot(backing.slot);
        if let Some(entry) = self.entries.get_mut(key) {
            entry.in_use = false;
            entry.last_used_frame = frame;
        }
    }

    fn trim(&mut self, current_frame: u64, max_age: u64) {
        self.entries.retain(|_, e| e.in_use || current_frame.saturating_sub(e.last_used_frame) <= max_age);
        self.slot_of.retain(|&key| self.entries.contains_key(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{BufferDescriptor, BufferUsage, CacheMode, StorageMode};

    fn descriptor(length: u64) -> Descriptor {
        Descriptor::Buffer(BufferDescriptor {
            length,
            storage_mode: StorageMode::Private,
            cache_mode: CacheMode::DefaultCache,
            usage: BufferUsage::SHADER_READ,
        })
    }

    #[test]
    fn deposited_entries_are_reused_for_a_matching_descriptor() {
        let mut pool = PoolAllocator::new();
        let a = pool.collect(&descriptor(256), 0).unwrap();
        pool.deposit(a, 0);
        let b = pool.collect(&descriptor(256), 1).unwrap();
        assert_eq!(a.slot, b.slot);
    }

    #[test]
    fn distinct_descriptors_get_distinct_entries() {
        let mut pool = PoolAllocator::new();
        let a = pool.collect(&descriptor(256), 0).unwrap();
        let b = pool.collect(&descriptor(512), 0).unwrap();
        assert_ne!(a.slot, b.slot);
    }
}
