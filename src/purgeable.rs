//! Purgeability: whether a transient heap slot's backing memory may be discarded by the OS under
//! memory pressure while the slot is not guarding a live resource.
//!
//! Scoped to heap slots rather than persistent resources: a persistent resource has an explicit,
//! caller-managed lifetime and is never marked purgeable by this crate.

use std::collections::HashMap;

/// `NonVolatile` while a slot backs a live resource, `Volatile` once it is idle and eligible for
/// the OS to reclaim, `Empty` once the OS has actually reclaimed it and its contents are gone.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PurgeableState {
    NonVolatile,
    Volatile,
    Empty,
}

/// Tracks purgeable state per heap slot. A later call to [`PurgeabilityManager::set_state`]
/// always wins over an earlier one, matching the device API's own idempotent
/// `updatePurgeableState` semantics: calling it with `x` then `y` leaves the slot in state `y`
/// regardless of what `x` was, so the manager never needs to reject or reorder a transition.
#[derive(Default)]
pub struct PurgeabilityManager {
    states: HashMap<u32, PurgeableState>,
}

impl PurgeabilityManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, slot: u32) -> PurgeableState {
        self.states.get(&slot).copied().unwrap_or(PurgeableState::NonVolatile)
    }

    /// Overwrites `slot`'s state, returning the state it held before. Last write wins
    /// unconditionally; there is no ordering to violate.
    pub fn set_state(&mut self, slot: u32, new_state: PurgeableState) -> PurgeableState {
        let previous = self.state(slot);
        self.states.insert(slot, new_state);
        previous
    }

    pub fn forget(&mut self, slot: u32) {
        self.states.remove(&slot);
    }
}
