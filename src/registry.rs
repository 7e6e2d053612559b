//! Resource registry: the split between a sparse, generation-guarded map of persistent resources
//! and a dense, per-frame array of transient ones.
//!
//! The two halves never share storage: a persistent resource always has a generation-guarded key,
//! a transient one always indexes the dense frame array.

use crate::alloc::{Allocator, AllocatorRouter, BackingRef};
use crate::descriptor::Descriptor;
use crate::error::{invariant_violation, Error, Result};
use crate::handle::{PersistentKey, Resource, ResourceFlags, ResourceKind, ResourceLocation, TransientIndex};
use slotmap::SlotMap;

struct PersistentEntry {
    descriptor: Descriptor,
    kind: ResourceKind,
    flags: ResourceFlags,
    backing: Option<BackingRef>,
    initialised: bool,
}

struct TransientEntry {
    descriptor: Descriptor,
    kind: ResourceKind,
    flags: ResourceFlags,
    backing: Option<BackingRef>,
}

/// Owns every resource live this frame: the persistent map survives across frames, the transient
/// array is rebuilt (and its backing objects returned to the allocators) every frame.
pub struct Registry {
    persistent: SlotMap<PersistentKey, PersistentEntry>,
    transient: Vec<TransientEntry>,
    router: AllocatorRouter,
    frame: u64,
}

impl Registry {
    pub fn new(router: AllocatorRouter) -> Self {
        Registry { persistent: SlotMap::with_key(), transient: Vec::new(), router, frame: 0 }
    }

    /// Registers a new persistent resource. Its backing object is not materialised until first
    /// use (materialise-on-first-use lifecycle).
    pub fn create_persistent(&mut self, descriptor: Descriptor, flags: ResourceFlags) -> Resource {
        let kind = descriptor.kind();
        let key = self.persistent.insert(PersistentEntry {
            descriptor,
            kind,
            flags,
            backing: None,
            initialised: false,
        });
        Resource::persistent(kind, key, flags)
    }

    /// Declares a transient resource for the current frame; returns its dense index.
    pub fn create_transient(&mut self, descriptor: Descriptor, flags: ResourceFlags) -> Resource {
        let kind = descriptor.kind();
        debug_assert!(!flags.contains(ResourceFlags::PERSISTENT));
        self.transient.push(TransientEntry { descriptor, kind, flags, backing: None });
        Resource::transient(kind, (self.transient.len() - 1) as TransientIndex, flags)
    }

    pub fn descriptor(&self, resource: &Resource) -> Option<&Descriptor> {
        match resource.location {
            ResourceLocation::Persistent(key) => self.persistent.get(key).map(|e| &e.descriptor),
            ResourceLocation::Transient(i) => self.transient.get(i as usize).map(|e| &e.descriptor),
        }
    }

    pub fn backing(&self, resource: &Resource) -> Option<BackingRef> {
        match resource.location {
            ResourceLocation::Persistent(key) => self.persistent.get(key).and_then(|e| e.backing),
            ResourceLocation::Transient(i) => self.transient.get(i as usize).and_then(|e| e.backing),
        }
    }

    /// Materialises the backing object for `resource` if it does not already have one.
    pub fn materialise(&mut self, resource: &Resource) -> Result<BackingRef> {
        match resource.location {
            ResourceLocation::Persistent(key) => {
                let entry = self
                    .persistent
                    .get_mut(key)
                    .ok_or_else(|| Error::InvariantViolation("stale persistent resource handle".into()))?;
                if let Some(backing) = entry.backing {
                    return Ok(backing);
                }
                let backing = self.router.collect(&entry.descriptor, false, self.frame)?;
                entry.backing = Some(backing);
                Ok(backing)
            }
            ResourceLocation::Transient(i) => {
                let entry = self
                    .transient
                    .get_mut(i as usize)
                    .ok_or_else(|| Error::InvariantViolation("invalid transient resource index".into()))?;
                if let Some(backing) = entry.backing {
                    return Ok(backing);
                }
                let backing = self.router.collect(&entry.descriptor, true, self.frame)?;
                entry.backing = Some(backing);
                Ok(backing)
            }
        }
    }

    /// Records that `resource` was written for the first time, enforcing the
    /// `immutableOnceInitialised` invariant.
    pub fn mark_initialised(&mut self, resource: &Resource) -> Result<()> {
        if let ResourceLocation::Persistent(key) = resource.location {
            if let Some(entry) = self.persistent.get_mut(key) {
                if entry.flags.contains(ResourceFlags::IMMUTABLE_ONCE_INITIALISED) && entry.initialised {
                    return invariant_violation(format!(
                        "second write to immutable-once-initialised resource {:?}",
                        resource.kind
                    ));
                }
                entry.initialised = true;
            }
        }
        Ok(())
    }

    /// Explicitly disposes a persistent resource, returning its backing object to its allocator.
    pub fn dispose_persistent(&mut self, key: PersistentKey) {
        if let Some(entry) = self.persistent.remove(key) {
            if let Some(backing) = entry.backing {
                self.router.deposit(backing, self.frame);
            }
        }
    }

    /// Ends the frame: every transient resource's backing object is returned to its allocator and
    /// the dense array is cleared for the next frame.
    pub fn end_frame(&mut self) {
        for entry in self.transient.drain(..) {
            if let Some(backing) = entry.backing {
                self.router.deposit(backing, self.frame);
            }
        }
        self.frame += 1;
    }

    pub fn current_frame(&self) -> u64 {
        self.frame
    }

    /// Releases allocator entries idle for longer than `max_age` frames.
    pub fn trim_allocators(&mut self, max_age: u64) {
        self.router.pool.trim(self.frame, max_age);
        self.router.color_heap.trim(self.frame, max_age);
        self.router.depth_heap.trim(self.frame, max_age);
        self.router.sub_buffer.trim(self.frame, max_age);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{BufferDescriptor, BufferUsage, CacheMode, Descriptor, StorageMode};

    fn buffer_descriptor() -> Descriptor {
        Descriptor::Buffer(BufferDescriptor {
            length: 64,
            storage_mode: StorageMode::Private,
            cache_mode: CacheMode::DefaultCache,
            usage: BufferUsage::SHADER_READ,
        })
    }

    #[test]
    fn transient_resources_are_cleared_at_end_of_frame() {
        let mut registry = Registry::new(AllocatorRouter::new(1024));
        let resource = registry.create_transient(buffer_descriptor(), ResourceFlags::empty());
        registry.materialise(&resource).unwrap();
        assert!(registry.backing(&resource).is_some());
        registry.end_frame();
        assert!(registry.descriptor(&resource).is_none());
    }

    #[test]
    fn a_second_write_to_an_immutable_once_initialised_resource_is_rejected_in_release() {
        let mut registry = Registry::new(AllocatorRouter::new(1024));
        let resource = registry
            .create_persistent(buffer_descriptor(), ResourceFlags::IMMUTABLE_ONCE_INITIALISED);
        registry.mark_initialised(&resource).unwrap();
        if !cfg!(debug_assertions) {
            assert!(registry.mark_initialised(&resource).is_err());
        }
    }
}
