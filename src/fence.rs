//! Command-buffer completion fences.
//!
//! Fences follow a simple three-state lifecycle:
//! a fence is signalled when the command buffer that produced it has retired on the device, and
//! consumers wait on it before reusing the resources it guards.

use slotmap::new_key_type;
use std::collections::HashMap;

new_key_type! {
    pub struct FenceId;
}

/// Lifecycle of a single fence.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FenceState {
    /// Not yet attached to a submitted command buffer.
    Free,
    /// Attached to command buffer `command_buffer_index` on some queue; not yet retired.
    Pending { command_buffer_index: u64 },
    /// The command buffer has completed and everything it guards may be reused.
    Retired,
}

#[derive(Debug)]
pub struct Fence {
    pub queue: u32,
    pub encoder_index: u32,
    pub state: FenceState,
}

/// Pool of fences keyed by `(queue, encoder index)`, recycled through a slotmap-backed
/// allocator pattern rather than allocating a new fence object per frame.
#[derive(Default)]
pub struct FenceRegistry {
    fences: slotmap::SlotMap<FenceId, Fence>,
    by_queue_encoder: HashMap<(u32, u32), FenceId>,
    free_list: Vec<FenceId>,
}

impl FenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fence for `(queue, encoder_index)`, recycling a free fence if one is
    /// available rather than allocating a new slot.
    pub fn acquire(&mut self, queue: u32, encoder_index: u32) -> FenceId {
        if let Some(&id) = self.by_queue_encoder.get(&(queue, encoder_index)) {
            return id;
        }
        let id = if let Some(id) = self.free_list.pop() {
            let fence = &mut self.fences[id];
            fence.queue = queue;
            fence.encoder_index = encoder_index;
            fence.state = FenceState::Free;
            id
        } else {
            self.fences.insert(Fence { queue, encoder_index, state: FenceState::Free })
        };
        self.by_queue_encoder.insert((queue, encoder_index), id);
        id
    }

    pub fn signal_pending(&mut self, id: FenceId, command_buffer_index: u64) {
        if let Some(fence) = self.fences.get_mut(id) {
            fence.state = FenceState::Pending { command_buffer_index };
        }
    }

    pub fn retire(&mut self, id: FenceId) {
        if let Some(fence) = self.fences.get_mut(id) {
            fence.state = FenceState::Retired;
            self.by_queue_encoder.remove(&(fence.queue, fence.encoder_index));
            self.free_list.push(id);
        }
    }

    pub fn state(&self, id: FenceId) -> Option<FenceState> {
        self.fences.get(id).map(|f| f.state)
    }

    pub fn is_retired(&self, id: FenceId) -> bool {
        matches!(self.state(id), Some(FenceState::Retired))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquiring_the_same_queue_encoder_pair_returns_the_same_fence() {
        let mut registry = FenceRegistry::new();
        let a = registry.acquire(0, 3);
        let b = registry.acquire(0, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn retiring_a_fence_recycles_its_slot() {
        let mut registry = FenceRegistry::new();
        let id = registry.acquire(0, 0);
        registry.signal_pending(id, 42);
        assert_eq!(registry.state(id), Some(FenceState::Pending { command_buffer_index: 42 }));
        registry.retire(id);
        assert!(registry.is_retired(id));

        let reused = registry.acquire(1, 1);
        assert_eq!(reused, id);
        assert_eq!(registry.state(reused), Some(FenceState::Free));
    }
}
