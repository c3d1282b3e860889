use thiserror::Error;

use crate::threaded::HostInsn;

/// The code buffer has no room for another host instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("code buffer full ({capacity} host instructions)")]
pub struct CodeBufferFull {
    pub capacity: usize,
}

/// Bump-allocated arena of lowered host code.
///
/// Space is never freed piecemeal; [`CodeBuffer::reset`] drops everything
/// and bumps the generation so stale offsets can be detected.
pub struct CodeBuffer {
    insns: Vec<HostInsn>,
    capacity: usize,
    generation: u64,
}

impl CodeBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            insns: Vec::with_capacity(capacity.min(1 << 16)),
            capacity,
            generation: 0,
        }
    }

    /// Current write offset.
    #[inline]
    pub fn offset(&self) -> usize {
        self.insns.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.insns.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Append one instruction, returning its offset.
    pub fn emit(&mut self, insn: HostInsn) -> Result<usize, CodeBufferFull> {
        if self.insns.len() >= self.capacity {
            return Err(CodeBufferFull {
                capacity: self.capacity,
            });
        }
        self.insns.push(insn);
        Ok(self.insns.len() - 1)
    }

    #[inline]
    pub fn get(&self, offset: usize) -> &HostInsn {
        &self.insns[offset]
    }

    pub fn get_mut(&mut self, offset: usize) -> &mut HostInsn {
        &mut self.insns[offset]
    }

    /// Instructions in `[start, start + len)`.
    pub fn slice(&self, start: usize, len: usize) -> &[HostInsn] {
        &self.insns[start..start + len]
    }

    /// Roll the write offset back, discarding a partial block.
    pub fn set_offset(&mut self, offset: usize) {
        self.insns.truncate(offset);
    }

    pub fn reset(&mut self) {
        self.insns.clear();
        self.generation += 1;
    }
}
