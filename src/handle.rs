//! Resource handles.
//!
//! A resource is an opaque tagged handle. Persistent resources are keyed into a sparse,
//! generation-guarded [`slotmap`] so that stale handles from a previous lifetime are rejected;
//! transient resources index a dense per-frame array instead (see [`crate::registry`]).

use slotmap::new_key_type;

bitflags::bitflags! {
    /// Flags carried alongside a resource handle.
    pub struct ResourceFlags: u8 {
        /// The resource has an explicit, user-managed lifetime and survives across frames.
        const PERSISTENT = 0b0000_0001;
        /// A history buffer: lives exactly one frame past the frame it was written in.
        const HISTORY_BUFFER = 0b0000_0010;
        /// Backed by the windowing system; re-acquired every frame via the swapchain.
        const WINDOW_HANDLE = 0b0000_0100;
        /// Backing native object is owned by the caller, not by an allocator in this crate.
        const EXTERNAL_OWNERSHIP = 0b0000_1000;
        /// Once written for the first time, a second write is an invariant violation.
        const IMMUTABLE_ONCE_INITIALISED = 0b0001_0000;
    }
}

/// What kind of native object a [`Resource`] refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ResourceKind {
    Buffer,
    Texture,
    Heap,
    ArgumentBuffer,
    ArgumentBufferArray,
    AccelerationStructure,
    VisibleFunctionTable,
    IntersectionFunctionTable,
    Sampler,
    HazardTrackingGroup,
}

new_key_type! {
    /// Key into the sparse persistent-resource map. The slotmap generation guards against use of
    /// a handle from a resource that has since been disposed and its slot reused.
    pub struct PersistentKey;
}

/// Index of a resource in the dense, per-frame transient registry.
pub type TransientIndex = u32;

/// The storage location a handle points at. A resource is in exactly one of these, never both
/// simultaneously.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ResourceLocation {
    Persistent(PersistentKey),
    Transient(TransientIndex),
}

/// An opaque, typed resource handle: `(kind, index, flags, transient_registry_index?)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Resource {
    pub kind: ResourceKind,
    pub flags: ResourceFlags,
    pub location: ResourceLocation,
}

impl Resource {
    pub fn persistent(kind: ResourceKind, key: PersistentKey, flags: ResourceFlags) -> Resource {
        Resource {
            kind,
            flags: flags | ResourceFlags::PERSISTENT,
            location: ResourceLocation::Persistent(key),
        }
    }

    pub fn transient(kind: ResourceKind, index: TransientIndex, flags: ResourceFlags) -> Resource {
        debug_assert!(!flags.contains(ResourceFlags::PERSISTENT));
        Resource {
            kind,
            flags,
            location: ResourceLocation::Transient(index),
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.location, ResourceLocation::Persistent(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self.location, ResourceLocation::Transient(_))
    }

    pub fn transient_index(&self) -> Option<TransientIndex> {
        match self.location {
            ResourceLocation::Transient(i) => Some(i),
            ResourceLocation::Persistent(_) => None,
        }
    }

    pub fn persistent_key(&self) -> Option<PersistentKey> {
        match self.location {
            ResourceLocation::Persistent(k) => Some(k),
            ResourceLocation::Transient(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistent_resource_always_carries_the_persistent_flag() {
        let mut sm = slotmap::SlotMap::with_key();
        let key: PersistentKey = sm.insert(());
        let r = Resource::persistent(ResourceKind::Buffer, key, ResourceFlags::empty());
        assert!(r.flags.contains(ResourceFlags::PERSISTENT));
        assert!(r.is_persistent());
        assert!(!r.is_transient());
    }

    #[test]
    fn transient_resource_exposes_its_index() {
        let r = Resource::transient(ResourceKind::Texture, 7, ResourceFlags::HISTORY_BUFFER);
        assert_eq!(r.transient_index(), Some(7));
        assert!(r.persistent_key().is_none());
    }
}
