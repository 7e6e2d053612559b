//! Command-buffer assembly.
//!
//! Drives the encoders produced by [`crate::pass::FrameCommandInfo`] in sequence, feeding each
//! resource command and pass command to a [`Backend`] trait object. The backend abstraction
//! follows a dyn-trait-object design: this crate never talks to a native
//! graphics API directly, only through `dyn` trait objects downcastable with `downcast_rs`.

use crate::error::Result;
use crate::generator::{FrameCommandStream, PreFrameCommands, ResourceCommand};
use crate::pass::FrameCommandInfo;
use downcast_rs::{impl_downcast, Downcast};
use std::fmt::Debug;

/// A native command buffer handle, as produced by a [`Backend`].
pub trait CommandBuffer: Downcast + Debug {
    fn queue(&self) -> u32;
}
impl_downcast!(CommandBuffer);

/// A native command encoder for one contiguous run of same-kind passes.
pub trait CommandEncoder: Downcast + Debug {
    fn apply_resource_command(&mut self, command: &ResourceCommand) -> Result<()>;
    fn encode_pass(&mut self, pass_index: u32) -> Result<()>;
    fn end(self: Box<Self>) -> Result<()>;
}
impl_downcast!(CommandEncoder);

/// Abstraction over a native GPU backend. A real implementation wraps Metal/Vulkan/D3D12 command
/// buffer creation; tests and this crate's own logic only need the scheduling contract below.
pub trait Backend: Debug {
    fn create_command_buffer(&self, queue: u32) -> Result<Box<dyn CommandBuffer>>;
    fn create_encoder(&self, command_buffer: &dyn CommandBuffer, kind: crate::pass::PassKind) -> Result<Box<dyn CommandEncoder>>;
    fn commit(&self, command_buffer: Box<dyn CommandBuffer>) -> Result<u64>;
}

/// Drives a frame's encoders against a [`Backend`], interleaving resource commands emitted by the
/// generator with the pass commands themselves.
pub struct CommandBufferAssembler<'a> {
    backend: &'a dyn Backend,
}

impl<'a> CommandBufferAssembler<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        CommandBufferAssembler { backend }
    }

    /// Assembles and commits every command buffer for the frame, returning one native submission
    /// index per command buffer in submission order.
    pub fn assemble(
        &self,
        frame_info: &FrameCommandInfo,
        pre_frame: &PreFrameCommands,
        stream: &FrameCommandStream,
    ) -> Result<Vec<u64>> {
        let mut submissions = Vec::new();
        let mut current_command_buffer: Option<Box<dyn CommandBuffer>> = None;
        let mut current_command_buffer_index: Option<u64> = None;
        let mut pre_frame_applied = false;

        for encoder_record in &frame_info.encoders {
            let command_buffer_index = frame_info
                .command_buffer_of(encoder_record.index)
                .expect("every encoder has an assigned command buffer");

            if current_command_buffer_index != Some(command_buffer_index) {
                if let Some(cb) = current_command_buffer.take() {
                    submissions.push(self.backend.commit(cb)?);
                }
                current_command_buffer = Some(self.backend.create_command_buffer(encoder_record.queue)?);
                current_command_buffer_index = Some(command_buffer_index);
            }

            let command_buffer = current_command_buffer.as_deref().expect("just created above");
            let mut encoder = self.backend.create_encoder(command_buffer, encoder_record.kind)?;

            if !pre_frame_applied {
                for command in &pre_frame.commands {
                    encoder.apply_resource_command(command)?;
                }
                pre_frame_applied = true;
            }

            for &pass_index in &encoder_record.passes {
                if let Some(commands) = stream.before_pass.get(&pass_index) {
                    for command in commands {
                        encoder.apply_resource_command(command)?;
                    }
                }
                encoder.encode_pass(pass_index)?;
                if let Some(commands) = stream.after_pass.get(&pass_index) {
                    for command in commands {
                        encoder.apply_resource_command(command)?;
                    }
                }
            }

            encoder.end()?;
        }

        if let Some(cb) = current_command_buffer.take() {
            submissions.push(self.backend.commit(cb)?);
        }

        Ok(submissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::{PassKind, PassRecord};
    use std::cell::RefCell;

    #[derive(Debug)]
    struct FakeCommandBuffer {
        queue: u32,
    }
    impl CommandBuffer for FakeCommandBuffer {
        fn queue(&self) -> u32 {
            self.queue
        }
    }

    #[derive(Debug)]
    struct FakeEncoder {
        applied: usize,
        encoded: usize,
    }
    impl CommandEncoder for FakeEncoder {
        fn apply_resource_command(&mut self, _command: &ResourceCommand) -> Result<()> {
            self.applied += 1;
            Ok(())
        }
        fn encode_pass(&mut self, _pass_index: u32) -> Result<()> {
            self.encoded += 1;
            Ok(())
        }
        fn end(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct FakeBackend {
        commits: RefCell<u64>,
    }
    impl Backend for FakeBackend {
        fn create_command_buffer(&self, queue: u32) -> Result<Box<dyn CommandBuffer>> {
            Ok(Box::new(FakeCommandBuffer { queue }))
        }
        fn create_encoder(&self, _cb: &dyn CommandBuffer, _kind: PassKind) -> Result<Box<dyn CommandEncoder>> {
            Ok(Box::new(FakeEncoder { applied: 0, encoded: 0 }))
        }
        fn commit(&self, _cb: Box<dyn CommandBuffer>) -> Result<u64> {
            let mut commits = self.commits.borrow_mut();
            *commits += 1;
            Ok(*commits)
        }
    }

    #[test]
    fn encoders_on_the_same_command_buffer_are_committed_once() {
        let passes = vec![
            PassRecord::new(0, PassKind::Draw, "a", 0),
            PassRecord::new(1, PassKind::Draw, "b", 0),
        ];
        let frame_info = FrameCommandInfo::build(&passes);
        let pre_frame = PreFrameCommands::default();
        let stream = FrameCommandStream::default();

        let backend = FakeBackend::default();
        let assembler = CommandBufferAssembler::new(&backend);
        let submissions = assembler.assemble(&frame_info, &pre_frame, &stream).unwrap();
        assert_eq!(submissions.len(), 1);
    }

    #[test]
    fn passes_on_different_queues_produce_separate_command_buffers() {
        let passes = vec![
            PassRecord::new(0, PassKind::Draw, "a", 0),
            PassRecord::new(1, PassKind::Compute, "b", 1),
        ];
        let frame_info = FrameCommandInfo::build(&passes);
        let pre_frame = PreFrameCommands::default();
        let stream = FrameCommandStream::default();

        let backend = FakeBackend::default();
        let assembler = CommandBufferAssembler::new(&backend);
        let submissions = assembler.assemble(&frame_info, &pre_frame, &stream).unwrap();
        assert_eq!(submissions.len(), 2);
    }
}
