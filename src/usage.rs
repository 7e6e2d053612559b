//! Per-resource usage tracking within a frame.
//!
//! Every pass that touches a resource appends a [`UsageRecord`] to that resource's chunked,
//! append-only history. The resource-command generator walks this history to decide where a
//! barrier or a cross-encoder fence is required (see [`crate::generator`]).

use crate::handle::Resource;
use fxhash::FxHashMap;
use smallvec::SmallVec;

bitflags::bitflags! {
    /// How a pass accesses a resource.
    pub struct UsageType: u16 {
        const SHADER_READ = 0b0000_0000_0001;
        const SHADER_WRITE = 0b0000_0000_0010;
        const COLOR_ATTACHMENT = 0b0000_0000_0100;
        const DEPTH_STENCIL_ATTACHMENT = 0b0000_0000_1000;
        const INPUT_ATTACHMENT = 0b0000_0001_0000;
        const BLIT_SOURCE = 0b0000_0010_0000;
        const BLIT_DESTINATION = 0b0000_0100_0000;
        const VERTEX_BUFFER = 0b0000_1000_0000;
        const INDEX_BUFFER = 0b0001_0000_0000;
        const CONSTANT_BUFFER = 0b0010_0000_0000;
        const CPU_READ = 0b0100_0000_0000;
        const CPU_WRITE = 0b1000_0000_0000;
    }
}

impl UsageType {
    const WRITE_MASK: UsageType = UsageType::from_bits_truncate(
        UsageType::SHADER_WRITE.bits()
            | UsageType::COLOR_ATTACHMENT.bits()
            | UsageType::DEPTH_STENCIL_ATTACHMENT.bits()
            | UsageType::BLIT_DESTINATION.bits()
            | UsageType::CPU_WRITE.bits(),
    );

    pub fn is_write(&self) -> bool {
        self.intersects(Self::WRITE_MASK)
    }

    pub fn is_read(&self) -> bool {
        !self.is_write() || self.intersects(UsageType::INPUT_ATTACHMENT | UsageType::SHADER_READ)
    }
}

bitflags::bitflags! {
    pub struct ShaderStages: u8 {
        const VERTEX = 0b0000_0001;
        const FRAGMENT = 0b0000_0010;
        const COMPUTE = 0b0000_0100;
        const TILE = 0b0000_1000;
        const OBJECT = 0b0001_0000;
        const MESH = 0b0010_0000;
    }
}

/// Subset of a resource actually touched by a pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ActiveRange {
    FullResource,
    Buffer { offset: u64, len: u64 },
    Texture { base_level: u32, level_count: u32, base_slice: u32, slice_count: u32 },
}

impl ActiveRange {
    /// Whether `self` and `other` could touch the same bytes/texels. Conservative: when either
    /// side is [`ActiveRange::FullResource`] they always overlap.
    pub fn overlaps(&self, other: &ActiveRange) -> bool {
        match (self, other) {
            (ActiveRange::FullResource, _) | (_, ActiveRange::FullResource) => true,
            (
                ActiveRange::Buffer { offset: o1, len: l1 },
                ActiveRange::Buffer { offset: o2, len: l2 },
            ) => o1 < &(o2 + l2) && o2 < &(o1 + l1),
            (
                ActiveRange::Texture { base_level: bl1, level_count: lc1, base_slice: bs1, slice_count: sc1 },
                ActiveRange::Texture { base_level: bl2, level_count: lc2, base_slice: bs2, slice_count: sc2 },
            ) => {
                let levels_overlap = bl1 < &(bl2 + lc2) && bl2 < &(bl1 + lc1);
                let slices_overlap = bs1 < &(bs2 + sc2) && bs2 < &(bs1 + sc1);
                levels_overlap && slices_overlap
            }
            _ => true,
        }
    }
}

/// A single pass's access to a resource.
#[derive(Copy, Clone, Debug)]
pub struct UsageRecord {
    pub pass_index: u32,
    pub usage: UsageType,
    pub stages: ShaderStages,
    pub range: ActiveRange,
}

/// Append-only, chunked history of every pass's access to every resource this frame.
///
/// Usage
/// history is always scoped to a single frame and cleared at frame boundaries.
#[derive(Default)]
pub struct UsageTracker {
    records: FxHashMap<Resource, SmallVec<[UsageRecord; 4]>>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, resource: Resource, record: UsageRecord) {
        self.records.entry(resource).or_default().push(record);
    }

    pub fn history(&self, resource: &Resource) -> &[UsageRecord] {
        self.records.get(resource).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Every resource with at least one recorded access this frame, in arbitrary order.
    pub fn resources(&self) -> impl Iterator<Item = Resource> + '_ {
        self.records.keys().copied()
    }

    /// The most recent write to `resource` that overlaps `range`, if any, occurring before
    /// `before_pass_index`.
    pub fn previous_write(
        &self,
        resource: &Resource,
        range: &ActiveRange,
        before_pass_index: u32,
    ) -> Option<&UsageRecord> {
        self.history(resource)
            .iter()
            .rev()
            .find(|r| r.pass_index < before_pass_index && r.usage.is_write() && r.range.overlaps(range))
    }

    /// All reads of `resource` overlapping `range` since the last write before `before_pass_index`.
    pub fn previous_reads(
        &self,
        resource: &Resource,
        range: &ActiveRange,
        before_pass_index: u32,
    ) -> SmallVec<[&UsageRecord; 4]> {
        let last_write_index = self
            .previous_write(resource, range, before_pass_index)
            .map(|r| r.pass_index);
        self.history(resource)
            .iter()
            .filter(|r| {
                r.pass_index < before_pass_index
                    && r.usage.is_read()
                    && r.range.overlaps(range)
                    && last_write_index.map_or(true, |w| r.pass_index >= w)
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_usage_types_are_detected() {
        assert!(UsageType::COLOR_ATTACHMENT.is_write());
        assert!(UsageType::SHADER_WRITE.is_write());
        assert!(!UsageType::SHADER_READ.is_write());
    }

    #[test]
    fn full_resource_range_overlaps_anything() {
        assert!(ActiveRange::FullResource.overlaps(&ActiveRange::Buffer { offset: 100, len: 4 }));
    }

    #[test]
    fn disjoint_buffer_ranges_do_not_overlap() {
        let a = ActiveRange::Buffer { offset: 0, len: 16 };
        let b = ActiveRange::Buffer { offset: 16, len: 16 };
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn previous_write_finds_the_most_recent_overlapping_write() {
        let mut tracker = UsageTracker::new();
        let resource = Resource::transient(
            crate::handle::ResourceKind::Buffer,
            0,
            crate::handle::ResourceFlags::empty(),
        );
        let range = ActiveRange::FullResource;
        tracker.record(
            resource,
            UsageRecord { pass_index: 0, usage: UsageType::SHADER_WRITE, stages: ShaderStages::COMPUTE, range },
        );
        tracker.record(
            resource,
            UsageRecord { pass_index: 1, usage: UsageType::SHADER_READ, stages: ShaderStages::FRAGMENT, range },
        );
        let write = tracker.previous_write(&resource, &range, 2).unwrap();
        assert_eq!(write.pass_index, 0);

        let reads = tracker.previous_reads(&resource, &range, 2);
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].pass_index, 1);
    }
}
