//! Plain-data descriptors for the kinds of native object the registry can materialise.

use crate::handle::ResourceKind;

/// Where a resource's backing memory lives and how the CPU and GPU may access it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StorageMode {
    /// CPU and GPU visible, coherent.
    Shared,
    /// CPU and GPU visible; the CPU side must be explicitly synchronised (`didModifyRange`).
    Managed,
    /// GPU-only.
    Private,
    /// On-tile-only backing for render targets that are never read outside their render pass.
    Memoryless,
}

/// CPU-side caching behaviour for a mapped allocation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CacheMode {
    DefaultCache,
    WriteCombined,
}

/// The dimensionality and extent of a texture.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Dimensions {
    Tex1d { width: u32 },
    Tex1dArray { width: u32, array_layers: u32 },
    Tex2d { width: u32, height: u32 },
    Tex2dArray { width: u32, height: u32, array_layers: u32 },
    Tex3d { width: u32, height: u32, depth: u32 },
    Cube { size: u32 },
}

impl Dimensions {
    pub fn mip_level_count(&self) -> u32 {
        let longest = match *self {
            Dimensions::Tex1d { width } | Dimensions::Tex1dArray { width, .. } => width,
            Dimensions::Tex2d { width, height } | Dimensions::Tex2dArray { width, height, .. } => {
                width.max(height)
            }
            Dimensions::Tex3d { width, height, depth } => width.max(height).max(depth),
            Dimensions::Cube { size } => size,
        };
        32 - longest.max(1).leading_zeros()
    }
}

/// Opaque pixel format identifier; the concrete enumeration of supported formats is owned by the
/// device layer (see [`crate::external::Device::supports_pixel_format`]).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PixelFormat(pub u32);

impl PixelFormat {
    pub fn is_depth_stencil(&self) -> bool {
        // Depth/stencil formats are allocated a low id range by convention of the device layer.
        self.0 < 64
    }
}

bitflags::bitflags! {
    pub struct TextureUsage: u16 {
        const SHADER_READ = 0b0000_0001;
        const SHADER_WRITE = 0b0000_0010;
        const RENDER_TARGET = 0b0000_0100;
        const PIXEL_FORMAT_VIEW = 0b0000_1000;
    }
}

bitflags::bitflags! {
    pub struct BufferUsage: u16 {
        const SHADER_READ = 0b0000_0001;
        const SHADER_WRITE = 0b0000_0010;
        const VERTEX = 0b0000_0100;
        const INDEX = 0b0000_1000;
        const CONSTANT = 0b0001_0000;
        const INDIRECT = 0b0010_0000;
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct BufferDescriptor {
    pub length: u64,
    pub storage_mode: StorageMode,
    pub cache_mode: CacheMode,
    pub usage: BufferUsage,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TextureDescriptor {
    pub dimensions: Dimensions,
    pub format: PixelFormat,
    pub sample_count: u32,
    pub mip_levels: u32,
    pub storage_mode: StorageMode,
    pub cache_mode: CacheMode,
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Whether this texture can be eligible for memoryless storage: on-tile only backing is only
    /// meaningful for render targets (see §4.3.6 of the generator).
    pub fn is_render_target_only(&self) -> bool {
        self.usage == TextureUsage::RENDER_TARGET
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct HeapDescriptor {
    pub size: u64,
    pub storage_mode: StorageMode,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ArgumentBufferDescriptor {
    pub encoded_length: u64,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SamplerDescriptor {
    pub min_filter: u8,
    pub mag_filter: u8,
    pub mip_filter: u8,
    pub address_mode: u8,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AccelerationStructureDescriptor {
    pub size: u64,
}

/// Per-kind plain-data descriptor; which variant is valid depends on [`ResourceKind`].
#[derive(Clone, Debug, PartialEq)]
pub enum Descriptor {
    Buffer(BufferDescriptor),
    Texture(TextureDescriptor),
    Heap(HeapDescriptor),
    ArgumentBuffer(ArgumentBufferDescriptor),
    Sampler(SamplerDescriptor),
    AccelerationStructure(AccelerationStructureDescriptor),
}

impl Descriptor {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Descriptor::Buffer(_) => ResourceKind::Buffer,
            Descriptor::Texture(_) => ResourceKind::Texture,
            Descriptor::Heap(_) => ResourceKind::Heap,
            Descriptor::ArgumentBuffer(_) => ResourceKind::ArgumentBuffer,
            Descriptor::Sampler(_) => ResourceKind::Sampler,
            Descriptor::AccelerationStructure(_) => ResourceKind::AccelerationStructure,
        }
    }

    pub fn storage_mode(&self) -> Option<StorageMode> {
        match self {
            Descriptor::Buffer(b) => Some(b.storage_mode),
            Descriptor::Texture(t) => Some(t.storage_mode),
            Descriptor::Heap(h) => Some(h.storage_mode),
            _ => None,
        }
    }

    pub fn as_texture(&self) -> Option<&TextureDescriptor> {
        match self {
            Descriptor::Texture(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_texture_mut(&mut self) -> Option<&mut TextureDescriptor> {
        match self {
            Descriptor::Texture(t) => Some(t),
            _ => None,
        }
    }

    pub fn size(&self) -> Option<u64> {
        match self {
            Descriptor::Buffer(b) => Some(b.length),
            Descriptor::Heap(h) => Some(h.size),
            Descriptor::ArgumentBuffer(a) => Some(a.encoded_length),
            Descriptor::AccelerationStructure(a) => Some(a.size),
            Descriptor::Texture(_) | Descriptor::Sampler(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_level_count_matches_longest_edge() {
        let dim = Dimensions::Tex2d { width: 256, height: 256 };
        assert_eq!(dim.mip_level_count(), 9);
    }

    #[test]
    fn depth_stencil_formats_are_below_the_low_id_range() {
        assert!(PixelFormat(0).is_depth_stencil());
        assert!(!PixelFormat(64).is_depth_stencil());
    }
}
