//! Native memory allocators.
//!
//! Each allocator owns a strategy for satisfying one class of the registry's requests: short-lived
//! transient resources keyed by descriptor equality ([`pool`]), heap-backed resources needing
//! aliasing and fence-gated eviction ([`heap`]), and small per-frame scratch allocations carved out
//! of a rotating set of large buffers ([`subbuffer`]).
//!
//! Each strategy keeps its own notion of idleness rather than one allocator trying to do
//! everything.

pub mod heap;
pub mod pool;
pub mod subbuffer;

use crate::descriptor::{Descriptor, StorageMode};
use crate::error::Result;

pub use heap::HeapAllocator;
pub use pool::PoolAllocator;
pub use subbuffer::SubBufferAllocator;

/// Opaque reference to a backing native allocation, as handed back to the registry by whichever
/// allocator satisfied the request.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BackingRef {
    pub allocator: AllocatorKind,
    pub slot: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AllocatorKind {
    Pool,
    ColorHeap,
    DepthHeap,
    SubBuffer,
}

/// Strategy for satisfying and reclaiming allocation requests of one resource class.
///
/// Named `collect`/`deposit` rather than `alloc`/`free`: an allocator is a pool that hands back an
/// already-idle backing object when one is compatible, and only falls through to a true native
/// allocation when the pool is dry.
pub trait Allocator {
    /// Produce a backing object for `descriptor`, reusing an idle one if a compatible one exists.
    fn collect(&mut self, descriptor: &Descriptor, frame: u64) -> Result<BackingRef>;

    /// Return a backing object to the pool once its last fence has retired. The allocator may keep
    /// it warm for reuse rather than releasing it to the device immediately.
    fn deposit(&mut self, backing: BackingRef, frame: u64);

    /// Release everything that has not been used in the last `max_age` frames.
    fn trim(&mut self, current_frame: u64, max_age: u64);
}

/// Dispatches an allocation request to the allocator appropriate for its descriptor, per the
/// selection policy: transient private-storage textures that carry depth/stencil formats go to
/// the depth heap, other transient private-storage resources go to the color heap, small transient
/// buffers that need CPU visibility go through the sub-buffer allocator, and anything persistent
/// or shared/managed falls back to the generic pool.
pub struct AllocatorRouter {
    pub pool: PoolAllocator,
    pub color_heap: HeapAllocator,
    pub depth_heap: HeapAllocator,
    pub sub_buffer: SubBufferAllocator,
}

impl AllocatorRouter {
    pub fn new(sub_buffer_block_size: u64) -> Self {
        AllocatorRouter {
            pool: PoolAllocator::new(),
            color_heap: HeapAllocator::new(AllocatorKind::ColorHeap),
            depth_heap: HeapAllocator::new(AllocatorKind::DepthHeap),
            sub_buffer: SubBufferAllocator::new(sub_buffer_block_size),
        }
    }

    pub fn route(&self, descriptor: &Descriptor, transient: bool) -> AllocatorKind {
        if !transient {
            return AllocatorKind::Pool;
        }
        match descriptor {
            Descriptor::Texture(t) if t.storage_mode == StorageMode::Private => {
                if t.format.is_depth_stencil() {
                    AllocatorKind::DepthHeap
                } else {
                    AllocatorKind::ColorHeap
                }
            }
            // A private buffer has no device-visible layout to distinguish depth from color, so it
            // aliases onto the same general-purpose heap as non-depth private textures.
            Descriptor::Buffer(b) if b.storage_mode == StorageMode::Private => AllocatorKind::ColorHeap,
            Descriptor::Buffer(b) if matches!(b.storage_mode, StorageMode::Shared | StorageMode::Managed) => {
                AllocatorKind::SubBuffer
            }
            Descriptor::ArgumentBuffer(_) => AllocatorKind::SubBuffer,
            _ => AllocatorKind::Pool,
        }
    }

    pub fn collect(&mut self, descriptor: &Descriptor, transient: bool, frame: u64) -> Result<BackingRef> {
        match self.route(descriptor, transient) {
            AllocatorKind::Pool => self.pool.collect(descriptor, frame),
            AllocatorKind::ColorHeap => self.color_heap.collect(descriptor, frame),
            AllocatorKind::DepthHeap => self.depth_heap.collect(descriptor, frame),
            AllocatorKind::SubBuffer => self.sub_buffer.collect(descriptor, frame),
        }
    }

    pub fn deposit(&mut self, backing: BackingRef, frame: u64) {
        match backing.allocator {
            AllocatorKind::Pool => self.pool.deposit(backing, frame),
            AllocatorKind::ColorHeap => self.color_heap.deposit(backing, frame),
            AllocatorKind::DepthHeap => self.depth_heap.deposit(backing, frame),
            AllocatorKind::SubBuffer => self.sub_buffer.deposit(backing, frame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{
        ArgumentBufferDescriptor, BufferDescriptor, BufferUsage, CacheMode, Dimensions, PixelFormat,
        TextureDescriptor, TextureUsage,
    };

    fn router() -> AllocatorRouter {
        AllocatorRouter::new(4 * 1024 * 1024)
    }

    #[test]
    fn transient_private_depth_texture_routes_to_the_depth_heap() {
        let descriptor = Descriptor::Texture(TextureDescriptor {
            dimensions: Dimensions::Tex2d { width: 1024, height: 1024 },
            format: PixelFormat(0),
            sample_count: 1,
            mip_levels: 1,
            storage_mode: StorageMode::Private,
            cache_mode: CacheMode::DefaultCache,
            usage: TextureUsage::RENDER_TARGET,
        });
        assert_eq!(router().route(&descriptor, true), AllocatorKind::DepthHeap);
    }

    #[test]
    fn transient_private_buffer_routes_to_the_color_heap() {
        let descriptor = Descriptor::Buffer(BufferDescriptor {
            length: 256,
            storage_mode: StorageMode::Private,
            cache_mode: CacheMode::DefaultCache,
            usage: BufferUsage::SHADER_READ,
        });
        assert_eq!(router().route(&descriptor, true), AllocatorKind::ColorHeap);
    }

    #[test]
    fn transient_managed_buffer_routes_to_the_sub_buffer_allocator() {
        let descriptor = Descriptor::Buffer(BufferDescriptor {
            length: 256,
            storage_mode: StorageMode::Managed,
            cache_mode: CacheMode::DefaultCache,
            usage: BufferUsage::SHADER_READ,
        });
        assert_eq!(router().route(&descriptor, true), AllocatorKind::SubBuffer);
    }

    #[test]
    fn transient_argument_buffers_route_to_the_sub_buffer_allocator() {
        let descriptor = Descriptor::ArgumentBuffer(ArgumentBufferDescriptor { encoded_length: 128 });
        assert_eq!(router().route(&descriptor, true), AllocatorKind::SubBuffer);
    }

    #[test]
    fn persistent_resources_always_route_to_the_pool() {
        let descriptor = Descriptor::Buffer(BufferDescriptor {
            length: 256,
            storage_mode: StorageMode::Private,
            cache_mode: CacheMode::DefaultCache,
            usage: BufferUsage::SHADER_READ,
        });
        assert_eq!(router().route(&descriptor, false), AllocatorKind::Pool);
    }
}
