//! Bump-pointer allocator for small, short-lived, CPU-visible buffers (uniform/constant data,
//! per-draw argument scratch). Carves fixed-size blocks out of a small rotating set, matching the
//! teacher's `LinearMemoryPool`: append to the current block until it's full, then rotate.

use crate::alloc::{Allocator, AllocatorKind, BackingRef};
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};

struct Block {
    capacity: u64,
    cursor: u64,
    last_used_frame: u64,
}

pub struct SubBufferAllocator {
    block_size: u64,
    blocks: Vec<Block>,
    current: usize,
}

impl SubBufferAllocator {
    pub fn new(block_size: u64) -> Self {
        SubBufferAllocator { block_size, blocks: Vec::new(), current: 0 }
    }

    fn new_block(&mut self, frame: u64) -> usize {
        self.blocks.push(Block { capacity: self.block_size, cursor: 0, last_used_frame: frame });
        self.blocks.len() - 1
    }
}

impl Allocator for SubBufferAllocator {
    fn collect(&mut self, descriptor: &Descriptor, frame: u64) -> Result<BackingRef> {
        let size = descriptor.size().ok_or_else(|| Error::InvariantViolation(
            "sub-buffer allocator requires a sized descriptor".into(),
        ))?;
        if size > self.block_size {
            return Err(Error::ResourceAllocationFailure {
                resource: crate::handle::Resource::transient(
                    descriptor.kind(),
                    0,
                    crate::handle::ResourceFlags::empty(),
                ),
                reason: format!("requested {size} bytes exceeds sub-buffer block size {}", self.block_size),
            });
        }

        if self.blocks.is_empty() {
            self.new_block(frame);
        }

        let block_index = if self.blocks[self.current].cursor + size <= self.blocks[self.current].capacity {
            self.current
        } else {
            let next = self.new_block(frame);
            self.current = next;
            next
        };

        let block = &mut self.blocks[block_index];
        let offset = block.cursor;
        block.cursor += size;
        block.last_used_frame = frame;

        Ok(BackingRef { allocator: AllocatorKind::SubBuffer, slot: (block_index as u32) << 16 | (offset as u32 & 0xffff) })
    }

    fn deposit(&mut self, _backing: BackingRef, _frame: u64) {
        // Bump allocations are reclaimed wholesale when their block rotates out, not individually.
    }

    /// Rewinds every block whose last use predates `current_frame - max_age`, making its capacity
    /// available again.
    fn trim(&mut self, current_frame: u64, max_age: u64) {
        for block in &mut self.blocks {
            if current_frame.saturating_sub(block.last_used_frame) > max_age {
                block.cursor = 0;
            }
        }
    }
}
