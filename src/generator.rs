//! Resource-command generation.
//!
//! Walks the usage history recorded for the frame and produces the stream of lifecycle and
//! synchronisation commands — materialisation, disposal, residency waits, barriers — that must be
//! interleaved with the pass commands before a command buffer can be assembled. This is the
//! busiest module in the crate; the algorithm below follows §4.3 of the design closely enough
//! that the section numbers in these comments point back at it.

use crate::dependency::{CrossQueueDependency, CrossQueueTable, DependencyTable, FenceDependency};
use crate::descriptor::StorageMode;
use crate::error::Result;
use crate::handle::{Resource, ResourceKind};
use crate::pass::FrameCommandInfo;
use crate::usage::{UsageTracker, UsageType};
use fxhash::FxHashMap;
use smallvec::SmallVec;
use std::collections::HashSet;

bitflags::bitflags! {
    /// Coarse resource categories a scoped barrier can cover, mirroring the device API's own
    /// barrier-scope bitset.
    pub struct BarrierScope: u8 {
        const BUFFERS = 0b001;
        const TEXTURES = 0b010;
        const RENDER_TARGETS = 0b100;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ResourceCommand {
    Materialise { resource: Resource },
    Dispose { resource: Resource },
    WaitForHeapAliasingFences { resources: SmallVec<[Resource; 4]> },
    UseResource { resource: Resource, usage: UsageType },
    /// Enumerates the resources a barrier must cover. Used when the barrier set is small and does
    /// not touch a render target (§4.3's "resource barrier" shape).
    ResourceBarrier { resources: SmallVec<[Resource; 8]> },
    /// A coarse barrier over whole resource categories instead of individual resources, used once
    /// a barrier set grows past the resource-barrier shape's sweet spot or covers a render target
    /// (§4.3's "scoped barrier" shape).
    ScopedBarrier { scope: BarrierScope },
    /// Signals a cross-queue event to `value`, to be waited on by encoders on other queues.
    SignalQueueEvent { queue: u32, value: u64 },
    /// Waits until `queue`'s event reaches `value` before the encoder carrying this command
    /// proceeds.
    WaitQueueEvent { queue: u32, value: u64 },
}

/// Commands emitted before the frame's passes begin executing: materialisation of resources first
/// used this frame and aliasing-fence waits for heap-backed transients.
#[derive(Default)]
pub struct PreFrameCommands {
    pub commands: Vec<ResourceCommand>,
}

/// Commands interleaved between passes within the frame: barriers, disposals and queue events,
/// indexed by the pass index they must be inserted before or after.
#[derive(Default)]
pub struct FrameCommandStream {
    pub before_pass: FxHashMap<u32, Vec<ResourceCommand>>,
    pub after_pass: FxHashMap<u32, Vec<ResourceCommand>>,
}

impl FrameCommandStream {
    fn push_before(&mut self, pass_index: u32, command: ResourceCommand) {
        self.before_pass.entry(pass_index).or_default().push(command);
    }

    fn push_after(&mut self, pass_index: u32, command: ResourceCommand) {
        self.after_pass.entry(pass_index).or_default().push(command);
    }
}

#[derive(Clone, Copy)]
struct PendingBarrierEntry {
    resource: Resource,
    render_target: bool,
}

/// Barriers a resource's usage history calls for, collected per pass rather than emitted directly,
/// so the shape (resource vs. scoped) can be decided once the full set touching that pass is known.
#[derive(Default)]
pub struct PendingBarriers {
    by_pass: FxHashMap<u32, SmallVec<[PendingBarrierEntry; 8]>>,
}

impl PendingBarriers {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, pass_index: u32, resource: Resource, render_target: bool) {
        self.by_pass.entry(pass_index).or_default().push(PendingBarrierEntry { resource, render_target });
    }
}

/// Walks every resource touched this frame and produces the pre-frame and in-frame resource
/// command streams, plus the cross-encoder dependency tables needed for fence and event
/// generation.
pub struct Generator<'a> {
    tracker: &'a UsageTracker,
    frame_info: &'a FrameCommandInfo,
}

impl<'a> Generator<'a> {
    pub fn new(tracker: &'a UsageTracker, frame_info: &'a FrameCommandInfo) -> Self {
        Generator { tracker, frame_info }
    }

    /// Generates resource commands for a single resource's full usage history this frame.
    ///
    /// `first_use_this_frame` controls whether a materialise command is emitted; `disposed_after`
    /// marks the pass index (if any) after which the resource should be disposed, per its
    /// lifetime flags (transient resources are disposed at the end of the frame by the registry
    /// instead, so this is normally only set for `historyBuffer` resources). Barriers are not
    /// written to `stream` directly; they accumulate in `pending_barriers` until every resource has
    /// been walked and [`Generator::finalize_barriers`] picks their final shape.
    #[allow(clippy::too_many_arguments)]
    pub fn generate_for_resource(
        &self,
        resource: Resource,
        first_use_this_frame: bool,
        disposed_after: Option<u32>,
        storage_mode: StorageMode,
        pre_frame: &mut PreFrameCommands,
        stream: &mut FrameCommandStream,
        pending_barriers: &mut PendingBarriers,
        dependencies: &mut DependencyTable,
        cross_queue: &mut CrossQueueTable,
    ) -> Result<()> {
        let history = self.tracker.history(&resource);
        if history.is_empty() {
            return Ok(());
        }

        if first_use_this_frame {
            pre_frame.commands.push(ResourceCommand::Materialise { resource });
            if storage_mode == StorageMode::Private && resource.is_transient() {
                pre_frame.commands.push(ResourceCommand::WaitForHeapAliasingFences {
                    resources: smallvec::smallvec![resource],
                });
            }
        }

        const RENDER_TARGET_USAGE: UsageType =
            UsageType::from_bits_truncate(UsageType::COLOR_ATTACHMENT.bits() | UsageType::DEPTH_STENCIL_ATTACHMENT.bits());

        for record in history {
            let before_pass = record.pass_index;

            if let Some(previous_write) = self
                .tracker
                .previous_write(&resource, &record.range, before_pass)
            {
                let render_target = previous_write.usage.intersects(RENDER_TARGET_USAGE)
                    || record.usage.intersects(RENDER_TARGET_USAGE);
                pending_barriers.push(before_pass, resource, render_target);
                self.register_encoder_dependency(previous_write.pass_index, before_pass, dependencies, cross_queue);
            }

            // Emulate an input-attachment read with an extra, conservative barrier: the backend
            // abstraction this crate targets has no native input-attachment concept.
            if record.usage.contains(UsageType::INPUT_ATTACHMENT) {
                pending_barriers.push(before_pass, resource, true);
            }

            stream.push_before(before_pass, ResourceCommand::UseResource { resource, usage: record.usage });
        }

        if let Some(after_pass) = disposed_after {
            stream.push_after(after_pass, ResourceCommand::Dispose { resource });
        }

        Ok(())
    }

    /// Registers the ordering edge between the encoder that last wrote a resource and the encoder
    /// about to read or rewrite it: a same-queue edge is a fence dependency resolved by
    /// [`Generator::compact`]; a cross-queue edge needs an explicit event, resolved by
    /// [`Generator::stamp_cross_queue_events`].
    fn register_encoder_dependency(
        &self,
        signal_pass: u32,
        wait_pass: u32,
        dependencies: &mut DependencyTable,
        cross_queue: &mut CrossQueueTable,
    ) {
        let (signal_encoder, wait_encoder) =
            match (self.frame_info.encoder_of(signal_pass), self.frame_info.encoder_of(wait_pass)) {
                (Some(signal_encoder), Some(wait_encoder)) => (signal_encoder, wait_encoder),
                _ => return,
            };
        if signal_encoder == wait_encoder {
            return;
        }

        let signal_queue = self.frame_info.encoders[signal_encoder as usize].queue;
        let wait_queue = self.frame_info.encoders[wait_encoder as usize].queue;
        if signal_queue == wait_queue {
            dependencies.add(FenceDependency { signal_encoder, wait_encoder });
        } else {
            cross_queue.add(CrossQueueDependency { signal_encoder, wait_encoder, signal_queue, wait_queue });
        }
    }

    /// Converts the barriers accumulated per pass into their final commands: a pass whose pending
    /// set has more than `resource_threshold` distinct resources, or touches a render target, gets
    /// one coarse [`ResourceCommand::ScopedBarrier`]; otherwise it gets a single
    /// [`ResourceCommand::ResourceBarrier`] enumerating them.
    pub fn finalize_barriers(&self, pending: PendingBarriers, resource_threshold: usize, stream: &mut FrameCommandStream) {
        for (pass_index, entries) in pending.by_pass {
            let mut seen = HashSet::with_capacity(entries.len());
            let mut resources = SmallVec::<[Resource; 8]>::new();
            let mut scope = BarrierScope::empty();

            for entry in entries {
                if !seen.insert(entry.resource) {
                    continue;
                }
                resources.push(entry.resource);
                if entry.render_target {
                    scope |= BarrierScope::RENDER_TARGETS;
                }
                scope |= match entry.resource.kind {
                    ResourceKind::Buffer => BarrierScope::BUFFERS,
                    ResourceKind::Texture => BarrierScope::TEXTURES,
                    _ => BarrierScope::BUFFERS | BarrierScope::TEXTURES,
                };
            }

            let command = if scope.contains(BarrierScope::RENDER_TARGETS) || resources.len() > resource_threshold {
                ResourceCommand::ScopedBarrier { scope }
            } else {
                ResourceCommand::ResourceBarrier { resources }
            };
            stream.push_before(pass_index, command);
        }
    }

    /// After every resource has been walked, reduces the collected dependency table and assigns
    /// fences, returning the minimal set of cross-encoder waits that preserve ordering.
    pub fn compact(&self, dependencies: &DependencyTable) -> Vec<FenceDependency> {
        let mut reduced = dependencies.transitive_reduce();
        reduced.sort_by_key(|d| (d.signal_encoder, d.wait_encoder));
        reduced
    }

    /// Stamps a persistent, monotonically increasing wait index onto each cross-queue edge and
    /// emits the matching signal/wait commands: a `SignalQueueEvent` right after the signalling
    /// encoder's last pass, a `WaitQueueEvent` right before the waiting encoder's first pass.
    /// `queue_event_counters` is owned by the caller and expected to survive across frames, since
    /// the wait index it hands out must keep increasing for the life of the queue, not reset every
    /// frame.
    pub fn stamp_cross_queue_events(
        &self,
        table: &CrossQueueTable,
        queue_event_counters: &mut FxHashMap<u32, u64>,
        stream: &mut FrameCommandStream,
    ) {
        for dependency in table.edges() {
            let counter = queue_event_counters.entry(dependency.signal_queue).or_insert(0);
            *counter += 1;
            let value = *counter;

            if let Some(&last_pass) = self.frame_info.encoders[dependency.signal_encoder as usize].passes.last() {
                stream.push_after(last_pass, ResourceCommand::SignalQueueEvent { queue: dependency.signal_queue, value });
            }
            if let Some(&first_pass) = self.frame_info.encoders[dependency.wait_encoder as usize].passes.first() {
                stream.push_before(
                    first_pass,
                    ResourceCommand::WaitQueueEvent { queue: dependency.signal_queue, value },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{ResourceFlags, ResourceKind};
    use crate::pass::{FrameCommandInfo, PassKind, PassRecord};
    use crate::usage::{ActiveRange, ShaderStages, UsageRecord};

    fn harness() -> (PendingBarriers, DependencyTable, CrossQueueTable, PreFrameCommands, FrameCommandStream) {
        (
            PendingBarriers::new(),
            DependencyTable::new(),
            CrossQueueTable::new(),
            PreFrameCommands::default(),
            FrameCommandStream::default(),
        )
    }

    #[test]
    fn a_write_followed_by_a_read_emits_a_barrier_and_a_cross_encoder_dependency() {
        let passes = vec![
            PassRecord::new(0, PassKind::Compute, "write", 0),
            PassRecord::new(1, PassKind::Draw, "read", 0),
        ];
        let frame_info = FrameCommandInfo::build(&passes);

        let resource = Resource::transient(ResourceKind::Buffer, 0, ResourceFlags::empty());
        let mut tracker = UsageTracker::new();
        tracker.record(
            resource,
            UsageRecord {
                pass_index: 0,
                usage: UsageType::SHADER_WRITE,
                stages: ShaderStages::COMPUTE,
                range: ActiveRange::FullResource,
            },
        );
        tracker.record(
            resource,
            UsageRecord {
                pass_index: 1,
                usage: UsageType::SHADER_READ,
                stages: ShaderStages::FRAGMENT,
                range: ActiveRange::FullResource,
            },
        );

        let generator = Generator::new(&tracker, &frame_info);
        let (mut pending_barriers, mut dependencies, mut cross_queue, mut pre_frame, mut stream) = harness();

        generator
            .generate_for_resource(
                resource,
                true,
                None,
                StorageMode::Private,
                &mut pre_frame,
                &mut stream,
                &mut pending_barriers,
                &mut dependencies,
                &mut cross_queue,
            )
            .unwrap();
        generator.finalize_barriers(pending_barriers, 8, &mut stream);

        assert!(pre_frame.commands.iter().any(|c| matches!(c, ResourceCommand::Materialise { .. })));
        let before_read = stream.before_pass.get(&1).unwrap();
        assert!(before_read.iter().any(|c| matches!(c, ResourceCommand::ResourceBarrier { .. })));
        assert!(cross_queue.edges().is_empty());

        // Both passes land in the same encoder (same queue, but kind differs -> two encoders).
        let compacted = generator.compact(&dependencies);
        assert_eq!(compacted.len(), 1);
    }

    #[test]
    fn eight_resources_before_a_pass_stay_a_resource_barrier_nine_become_scoped() {
        let passes = vec![PassRecord::new(0, PassKind::Draw, "consume", 0)];
        let frame_info = FrameCommandInfo::build(&passes);
        let tracker = UsageTracker::new();
        let generator = Generator::new(&tracker, &frame_info);

        let mut pending = PendingBarriers::new();
        for i in 0..8u32 {
            let resource = Resource::transient(ResourceKind::Buffer, i, ResourceFlags::empty());
            pending.push(0, resource, false);
        }
        let mut stream = FrameCommandStream::default();
        generator.finalize_barriers(pending, 8, &mut stream);
        let commands = stream.before_pass.get(&0).unwrap();
        assert!(commands.iter().any(|c| matches!(c, ResourceCommand::ResourceBarrier { resources } if resources.len() == 8)));

        let mut pending = PendingBarriers::new();
        for i in 0..9u32 {
            let resource = Resource::transient(ResourceKind::Buffer, i, ResourceFlags::empty());
            pending.push(0, resource, false);
        }
        let mut stream = FrameCommandStream::default();
        generator.finalize_barriers(pending, 8, &mut stream);
        let commands = stream.before_pass.get(&0).unwrap();
        assert!(commands.iter().any(|c| matches!(c, ResourceCommand::ScopedBarrier { .. })));
    }

    #[test]
    fn a_render_target_forces_a_scoped_barrier_even_with_a_single_resource() {
        let passes = vec![PassRecord::new(0, PassKind::Draw, "consume", 0)];
        let frame_info = FrameCommandInfo::build(&passes);
        let tracker = UsageTracker::new();
        let generator = Generator::new(&tracker, &frame_info);

        let mut pending = PendingBarriers::new();
        let resource = Resource::transient(ResourceKind::Texture, 0, ResourceFlags::empty());
        pending.push(0, resource, true);

        let mut stream = FrameCommandStream::default();
        generator.finalize_barriers(pending, 8, &mut stream);
        let commands = stream.before_pass.get(&0).unwrap();
        assert!(commands.iter().any(|c| matches!(
            c,
            ResourceCommand::ScopedBarrier { scope } if scope.contains(BarrierScope::RENDER_TARGETS)
        )));
    }

    #[test]
    fn cross_queue_writes_are_stamped_with_a_persistent_monotonic_event_value() {
        let passes = vec![
            PassRecord::new(0, PassKind::Compute, "write", 0),
            PassRecord::new(1, PassKind::Draw, "read", 1),
        ];
        let frame_info = FrameCommandInfo::build(&passes);

        let resource = Resource::transient(ResourceKind::Buffer, 0, ResourceFlags::empty());
        let mut tracker = UsageTracker::new();
        tracker.record(
            resource,
            UsageRecord {
                pass_index: 0,
                usage: UsageType::SHADER_WRITE,
                stages: ShaderStages::COMPUTE,
                range: ActiveRange::FullResource,
            },
        );
        tracker.record(
            resource,
            UsageRecord {
                pass_index: 1,
                usage: UsageType::SHADER_READ,
                stages: ShaderStages::FRAGMENT,
                range: ActiveRange::FullResource,
            },
        );

        let generator = Generator::new(&tracker, &frame_info);
        let (mut pending_barriers, mut dependencies, mut cross_queue, mut pre_frame, mut stream) = harness();

        generator
            .generate_for_resource(
                resource,
                true,
                None,
                StorageMode::Private,
                &mut pre_frame,
                &mut stream,
                &mut pending_barriers,
                &mut dependencies,
                &mut cross_queue,
            )
            .unwrap();

        assert!(dependencies.transitive_reduce().is_empty());
        assert_eq!(cross_queue.edges().len(), 1);

        let mut counters = FxHashMap::default();
        generator.stamp_cross_queue_events(&cross_queue, &mut counters, &mut stream);

        let signalled = stream.after_pass.get(&0).unwrap();
        assert!(signalled.iter().any(|c| matches!(c, ResourceCommand::SignalQueueEvent { queue: 0, value: 1 })));
        let waited = stream.before_pass.get(&1).unwrap();
        assert!(waited.iter().any(|c| matches!(c, ResourceCommand::WaitQueueEvent { queue: 0, value: 1 })));
    }
}
