//! Per-queue frame context: the top-level loop that drives passes through usage tracking,
//! resource-command generation, compaction, assembly, submission, and allocator cycling.

use crate::alloc::AllocatorRouter;
use crate::assembler::{Backend, CommandBufferAssembler};
use crate::dependency::{CrossQueueTable, DependencyTable};
use crate::error::Result;
use crate::generator::{FrameCommandStream, Generator, PendingBarriers, PreFrameCommands};
use crate::pass::{FrameCommandInfo, PassRecord};
use crate::registry::Registry;
use crate::usage::UsageTracker;

/// Ties together everything a single queue needs to take a declared graph through to submission.
pub struct Context {
    pub registry: Registry,
    pub tracker: UsageTracker,
    frame: u64,
    allocator_max_age: u64,
    scoped_barrier_resource_threshold: usize,
    /// Per-queue cross-queue event counters. Deliberately not reset at the end of a frame: the
    /// wait index a queue hands out must keep increasing for the life of the context, not just
    /// within one frame, or a late-arriving wait could match an earlier frame's signal.
    queue_event_counters: fxhash::FxHashMap<u32, u64>,
}

impl Context {
    pub fn new(router: AllocatorRouter, allocator_max_age: u64, scoped_barrier_resource_threshold: usize) -> Self {
        Context {
            registry: Registry::new(router),
            tracker: UsageTracker::new(),
            frame: 0,
            allocator_max_age,
            scoped_barrier_resource_threshold,
            queue_event_counters: fxhash::FxHashMap::default(),
        }
    }

    /// Runs one full frame: builds the encoder assignment, generates resource commands for every
    /// resource recorded in the tracker, reduces cross-encoder dependencies, and submits the
    /// assembled command buffers to `backend`.
    pub fn run_frame(&mut self, passes: &[PassRecord], backend: &dyn Backend) -> Result<Vec<u64>> {
        let frame_info = FrameCommandInfo::build(passes);

        let mut pre_frame = PreFrameCommands::default();
        let mut stream = FrameCommandStream::default();
        let mut pending_barriers = PendingBarriers::new();
        let mut dependencies = DependencyTable::new();
        let mut cross_queue = CrossQueueTable::new();

        let generator = Generator::new(&self.tracker, &frame_info);
        for resource in self.resources_touched_this_frame() {
            let descriptor = self.registry.descriptor(&resource).cloned();
            let storage_mode = descriptor.as_ref().and_then(|d| d.storage_mode()).unwrap_or(crate::descriptor::StorageMode::Private);
            let first_use = self.registry.backing(&resource).is_none();
            generator.generate_for_resource(
                resource,
                first_use,
                None,
                storage_mode,
                &mut pre_frame,
                &mut stream,
                &mut pending_barriers,
                &mut dependencies,
                &mut cross_queue,
            )?;
            self.registry.materialise(&resource)?;
        }

        generator.finalize_barriers(pending_barriers, self.scoped_barrier_resource_threshold, &mut stream);
        generator.stamp_cross_queue_events(&cross_queue, &mut self.queue_event_counters, &mut stream);

        let _fences = generator.compact(&dependencies);

        let assembler = CommandBufferAssembler::new(backend);
        let submissions = assembler.assemble(&frame_info, &pre_frame, &stream)?;

        self.end_frame();
        Ok(submissions)
    }

    /// Every resource the tracker recorded at least one access for this frame; this is exactly the
    /// set `run_frame` must walk to materialise, barrier, dispose and fence.
    fn resources_touched_this_frame(&self) -> Vec<crate::handle::Resource> {
        self.tracker.resources().collect()
    }

    fn end_frame(&mut self) {
        self.tracker.clear();
        self.registry.end_frame();
        self.registry.trim_allocators(self.allocator_max_age);
        self.frame += 1;
    }

    pub fn current_frame(&self) -> u64 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{CommandBuffer, CommandEncoder};
    use crate::generator::ResourceCommand;
    use crate::pass::PassKind;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct NoopCommandBuffer(u32);
    impl CommandBuffer for NoopCommandBuffer {
        fn queue(&self) -> u32 {
            self.0
        }
    }

    #[derive(Debug)]
    struct NoopEncoder;
    impl CommandEncoder for NoopEncoder {
        fn apply_resource_command(&mut self, _command: &ResourceCommand) -> Result<()> {
            Ok(())
        }
        fn encode_pass(&mut self, _pass_index: u32) -> Result<()> {
            Ok(())
        }
        fn end(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct NoopBackend;
    impl Backend for NoopBackend {
        fn create_command_buffer(&self, queue: u32) -> Result<Box<dyn CommandBuffer>> {
            Ok(Box::new(NoopCommandBuffer(queue)))
        }
        fn create_encoder(&self, _cb: &dyn CommandBuffer, _kind: PassKind) -> Result<Box<dyn CommandEncoder>> {
            Ok(Box::new(NoopEncoder))
        }
        fn commit(&self, _cb: Box<dyn CommandBuffer>) -> Result<u64> {
            Ok(0)
        }
    }

    #[derive(Debug)]
    struct RecordingEncoder {
        applied: Rc<Cell<usize>>,
    }
    impl CommandEncoder for RecordingEncoder {
        fn apply_resource_command(&mut self, _command: &ResourceCommand) -> Result<()> {
            self.applied.set(self.applied.get() + 1);
            Ok(())
        }
        fn encode_pass(&mut self, _pass_index: u32) -> Result<()> {
            Ok(())
        }
        fn end(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct RecordingBackend {
        applied: Rc<Cell<usize>>,
    }
    impl Backend for RecordingBackend {
        fn create_command_buffer(&self, queue: u32) -> Result<Box<dyn CommandBuffer>> {
            Ok(Box::new(NoopCommandBuffer(queue)))
        }
        fn create_encoder(&self, _cb: &dyn CommandBuffer, _kind: PassKind) -> Result<Box<dyn CommandEncoder>> {
            Ok(Box::new(RecordingEncoder { applied: self.applied.clone() }))
        }
        fn commit(&self, _cb: Box<dyn CommandBuffer>) -> Result<u64> {
            Ok(0)
        }
    }

    #[test]
    fn a_resource_touched_this_frame_actually_drives_materialisation_and_barriers() {
        use crate::descriptor::{BufferDescriptor, BufferUsage, CacheMode, Descriptor, StorageMode};
        use crate::handle::ResourceFlags;
        use crate::usage::{ActiveRange, ShaderStages, UsageRecord, UsageType};

        let router = AllocatorRouter::new(1024 * 1024);
        let mut context = Context::new(router, 3, 8);
        let resource = context.registry.create_persistent(
            Descriptor::Buffer(BufferDescriptor {
                length: 256,
                storage_mode: StorageMode::Private,
                cache_mode: CacheMode::DefaultCache,
                usage: BufferUsage::SHADER_READ,
            }),
            ResourceFlags::empty(),
        );
        context.tracker.record(
            resource,
            UsageRecord {
                pass_index: 0,
                usage: UsageType::SHADER_WRITE,
                stages: ShaderStages::COMPUTE,
                range: ActiveRange::FullResource,
            },
        );
        context.tracker.record(
            resource,
            UsageRecord {
                pass_index: 1,
                usage: UsageType::SHADER_READ,
                stages: ShaderStages::FRAGMENT,
                range: ActiveRange::FullResource,
            },
        );

        let passes = vec![
            PassRecord::new(0, PassKind::Compute, "write", 0),
            PassRecord::new(1, PassKind::Draw, "read", 0),
        ];
        let backend = RecordingBackend::default();
        let applied = backend.applied.clone();
        context.run_frame(&passes, &backend).unwrap();

        assert!(applied.get() > 0, "run_frame must drive materialise/barrier/use commands through the backend");
        assert!(context.registry.backing(&resource).is_some());
    }

    #[test]
    fn running_an_empty_frame_produces_no_submissions_and_advances_the_frame_counter() {
        let router = AllocatorRouter::new(1024 * 1024);
        let mut context = Context::new(router, 3, 8);
        let backend = NoopBackend::default();
        let submissions = context.run_frame(&[], &backend).unwrap();
        assert!(submissions.is_empty());
        assert_eq!(context.current_frame(), 1);
    }

    #[test]
    fn running_a_frame_with_passes_but_no_recorded_resource_usage_still_submits_one_command_buffer() {
        let router = AllocatorRouter::new(1024 * 1024);
        let mut context = Context::new(router, 3, 8);
        let backend = NoopBackend::default();
        let passes = vec![PassRecord::new(0, PassKind::Draw, "clear", 0)];
        let submissions = context.run_frame(&passes, &backend).unwrap();
        assert_eq!(submissions.len(), 1);
    }
}
