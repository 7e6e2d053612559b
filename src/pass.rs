//! Passes, encoders, and the frame-wide mapping between them.

use smallvec::SmallVec;

/// The kind of GPU work a pass performs, and so which encoder type it must be grouped into.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PassKind {
    Draw,
    Compute,
    Blit,
    AccelerationStructureBuild,
    External,
    Cpu,
}

/// A single declared unit of GPU work within the graph, as recorded during graph construction.
#[derive(Clone, Debug)]
pub struct PassRecord {
    pub index: u32,
    pub kind: PassKind,
    pub name: SmallVec<[u8; 24]>,
    pub queue: u32,
}

impl PassRecord {
    pub fn new(index: u32, kind: PassKind, name: &str, queue: u32) -> Self {
        PassRecord { index, kind, name: SmallVec::from_slice(name.as_bytes()), queue }
    }
}

/// A contiguous run of same-kind, same-queue passes sharing one native command encoder.
#[derive(Clone, Debug)]
pub struct Encoder {
    pub index: u32,
    pub queue: u32,
    pub kind: PassKind,
    pub passes: SmallVec<[u32; 8]>,
}

impl Encoder {
    pub fn contains_pass(&self, pass_index: u32) -> bool {
        self.passes.contains(&pass_index)
    }
}

/// The assignment of every pass to an encoder, and every encoder to a command buffer, computed
/// once per frame before resource commands are generated.
#[derive(Default)]
pub struct FrameCommandInfo {
    pub encoders: Vec<Encoder>,
    /// `encoder_index -> command_buffer_index`. Multiple encoders share a command buffer when
    /// they run on the same queue with no intervening cross-queue dependency.
    pub encoder_command_buffer: Vec<u64>,
    /// `pass_index -> encoder_index`.
    pass_to_encoder: Vec<u32>,
    /// Monotonically increasing across the whole frame, assigned in submission order.
    next_global_index: u32,
    /// Per-queue index of the next command buffer to wait on, used to express submission-order
    /// dependencies between command buffers on the same queue without an explicit fence.
    pub per_queue_wait_index: SmallVec<[u64; 4]>,
}

impl FrameCommandInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups `passes` into encoders: a new encoder starts whenever the queue or pass kind
    /// changes, matching the "contiguous same-kind same-queue run" rule from the scheduler.
    pub fn build(passes: &[PassRecord]) -> Self {
        let mut info = FrameCommandInfo::new();
        let mut command_buffer_for_queue: Vec<(u32, u64)> = Vec::new();

        for pass in passes {
            let needs_new_encoder = match info.encoders.last() {
                Some(last) => last.queue != pass.queue || last.kind != pass.kind,
                None => true,
            };

            if needs_new_encoder {
                let encoder_index = info.encoders.len() as u32;
                let command_buffer_index = if let Some((_, cb)) =
                    command_buffer_for_queue.iter().find(|(q, _)| *q == pass.queue)
                {
                    *cb
                } else {
                    let cb = command_buffer_for_queue.len() as u64;
                    command_buffer_for_queue.push((pass.queue, cb));
                    cb
                };
                info.encoders.push(Encoder {
                    index: encoder_index,
                    queue: pass.queue,
                    kind: pass.kind,
                    passes: SmallVec::new(),
                });
                info.encoder_command_buffer.push(command_buffer_index);
            }

            let encoder_index = (info.encoders.len() - 1) as u32;
            info.encoders[encoder_index as usize].passes.push(pass.index);
            info.pass_to_encoder.push(encoder_index);
            info.next_global_index += 1;
        }

        info
    }

    pub fn encoder_of(&self, pass_index: u32) -> Option<u32> {
        self.pass_to_encoder.get(pass_index as usize).copied()
    }

    pub fn command_buffer_of(&self, encoder_index: u32) -> Option<u64> {
        self.encoder_command_buffer.get(encoder_index as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_passes_of_the_same_kind_and_queue_share_an_encoder() {
        let passes = vec![
            PassRecord::new(0, PassKind::Draw, "shadow", 0),
            PassRecord::new(1, PassKind::Draw, "opaque", 0),
            PassRecord::new(2, PassKind::Compute, "ssao", 0),
        ];
        let info = FrameCommandInfo::build(&passes);
        assert_eq!(info.encoders.len(), 2);
        assert_eq!(info.encoder_of(0), info.encoder_of(1));
        assert_ne!(info.encoder_of(1), info.encoder_of(2));
    }

    #[test]
    fn different_queues_never_share_an_encoder_even_if_the_kind_matches() {
        let passes = vec![
            PassRecord::new(0, PassKind::Compute, "particles", 0),
            PassRecord::new(1, PassKind::Compute, "particles-async", 1),
        ];
        let info = FrameCommandInfo::build(&passes);
        assert_eq!(info.encoders.len(), 2);
        assert_ne!(info.encoder_of(0), info.encoder_of(1));
    }
}
