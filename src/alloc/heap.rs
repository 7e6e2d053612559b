//! Heap allocator: aliases transient resources onto a rotating set of native heaps, evicting an
//! aliasing slot only once the fence covering its previous occupant has retired.
//!
//! Tracks a list of slots, each with a "last used frame" and an optional guard fence; a slot is
//! only handed out again once its guard fence has retired.

use crate::alloc::{Allocator, AllocatorKind, BackingRef};
use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::fence::FenceId;
use crate::purgeable::{PurgeabilityManager, PurgeableState};

struct Slot {
    descriptor: Option<Descriptor>,
    guard_fence: Option<FenceId>,
    last_used_frame: u64,
}

/// A single native heap plus the aliasing slots carved out of it so far this run.
pub struct HeapAllocator {
    kind: AllocatorKind,
    slots: Vec<Slot>,
    history_depth: usize,
    purgeability: PurgeabilityManager,
}

impl HeapAllocator {
    /// `kind` is stamped onto every [`BackingRef`] this instance hands out, so a router dispatching
    /// on `BackingRef::allocator` later returns the deposit to this same heap.
    pub fn new(kind: AllocatorKind) -> Self {
        HeapAllocator { kind, slots: Vec::new(), history_depth: 3, purgeability: PurgeabilityManager::new() }
    }

    pub fn purgeable_state(&self, slot: u32) -> PurgeableState {
        self.purgeability.state(slot)
    }

    /// Explicitly overrides a slot's purgeable state, e.g. in response to a device memory-pressure
    /// notification reclaiming its contents (`Empty`). Last write wins.
    pub fn set_purgeable_state(&mut self, slot: u32, state: PurgeableState) -> PurgeableState {
        self.purgeability.set_state(slot, state)
    }

    /// Marks the fence that must retire before `slot` may be reused by another resource, per the
    /// spec's "fence eviction" rule for heap aliasing.
    pub fn guard(&mut self, slot: u32, fence: FenceId) {
        if let Some(s) = self.slots.get_mut(slot as usize) {
            s.guard_fence = Some(fence);
        }
    }

    /// Whether `slot`'s guard fence (if any) has retired and the slot may be reused. The caller
    /// (the resource-command generator) is responsible for checking the fence registry; this
    /// allocator only records which fence to check.
    pub fn guard_fence(&self, slot: u32) -> Option<FenceId> {
        self.slots.get(slot as usize).and_then(|s| s.guard_fence)
    }

    fn find_free_slot(&self, descriptor: &Descriptor) -> Option<u32> {
        self.slots
            .iter()
            .position(|s| {
                s.guard_fence.is_none()
                    && s.descriptor.as_ref().map_or(true, |d| d.size() == descriptor.size())
            })
            .map(|i| i as u32)
    }
}

impl Allocator for HeapAllocator {
    fn collect(&mut self, descriptor: &Descriptor, frame: u64) -> Result<BackingRef> {
        let slot = if let Some(slot) = self.find_free_slot(descriptor) {
            let s = &mut self.slots[slot as usize];
            s.descriptor = Some(descriptor.clone());
            s.last_used_frame = frame;
            slot
        } else {
            self.slots.push(Slot {
                descriptor: Some(descriptor.clone()),
                guard_fence: None,
                last_used_frame: frame,
            });
            (self.slots.len() - 1) as u32
        };
        self.purgeability.set_state(slot, PurgeableState::NonVolatile);
        Ok(BackingRef { allocator: self.kind, slot })
    }

    fn deposit(&mut self, backing: BackingRef, frame: u64) {
        if let Some(s) = self.slots.get_mut(backing.slot as usize) {
            s.last_used_frame = frame;
        }
        self.purgeability.set_state(backing.slot, PurgeableState::Volatile);
    }

    /// Drops the guard fence of any slot untouched for longer than the rolling history depth,
    /// making it eligible for immediate reuse without a fence wait.
    fn trim(&mut self, current_frame: u64, _max_age: u64) {
        let history_depth = self.history_depth as u64;
        for slot in &mut self.slots {
            if current_frame.saturating_sub(slot.last_used_frame) > history_depth {
                slot.guard_fence = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{CacheMode, Dimensions, PixelFormat, StorageMode, TextureDescriptor, TextureUsage};

    fn descriptor() -> Descriptor {
        Descriptor::Texture(TextureDescriptor {
            dimensions: Dimensions::Tex2d { width: 512, height: 512 },
            format: PixelFormat(10),
            sample_count: 1,
            mip_levels: 1,
            storage_mode: StorageMode::Private,
            cache_mode: CacheMode::DefaultCache,
            usage: TextureUsage::RENDER_TARGET,
        })
    }

    #[test]
    fn a_slot_guarded_by_a_pending_fence_is_not_reused() {
        let mut heap = HeapAllocator::new(AllocatorKind::ColorHeap);
        let a = heap.collect(&descriptor(), 0).unwrap();
        heap.guard(a.slot, FenceId::default());
        let b = heap.collect(&descriptor(), 1).unwrap();
        assert_ne!(a.slot, b.slot);
    }

    #[test]
    fn an_unguarded_slot_is_reused() {
        let mut heap = HeapAllocator::new(AllocatorKind::ColorHeap);
        let a = heap.collect(&descriptor(), 0).unwrap();
        heap.deposit(a, 0);
        let b = heap.collect(&descriptor(), 1).unwrap();
        assert_eq!(a.slot, b.slot);
    }

    #[test]
    fn a_deposited_slot_becomes_volatile_and_a_reused_one_goes_back_to_non_volatile() {
        let mut heap = HeapAllocator::new(AllocatorKind::ColorHeap);
        let a = heap.collect(&descriptor(), 0).unwrap();
        assert_eq!(heap.purgeable_state(a.slot), PurgeableState::NonVolatile);
        heap.deposit(a, 0);
        assert_eq!(heap.purgeable_state(a.slot), PurgeableState::Volatile);
        let b = heap.collect(&descriptor(), 1).unwrap();
        assert_eq!(heap.purgeable_state(b.slot), PurgeableState::NonVolatile);
    }
}
