//! Compiled block storage and lookup.
//!
//! Blocks live in an append-only table indexed by block id. Three
//! indexes point into it:
//! - the instruction-cache tag table, the fast `pc -> id` path;
//! - a start map `(pc, mode) -> id` that revives blocks whose tag slot
//!   was overwritten by an aliasing address;
//! - a range set ordered by physical end address, used to find every
//!   block overlapping an invalidated range.
//!
//! Destroyed blocks stay in the table (marked invalid) and their code
//! stays in the buffer until [`BlockCache::clear`].

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

use ppc_backend::translate::translate;
use ppc_backend::{CodeBuffer, HostCodeGen};
use ppc_core::{AddressingMode, BlockChecksum, CompiledBlock, Context, ICacheTagTable};
use ppc_frontend::{BlockTranslator, TranslateRequest};
use ppc_memory::{Access, GuestMemory};
use tracing::debug;

use crate::config::JitConfig;
use crate::error::CompileError;

pub struct BlockCache {
    blocks: Vec<CompiledBlock>,
    tags: ICacheTagTable,
    starts: HashMap<(u32, AddressingMode), u32>,
    /// `(phys_end, phys_start, id)` of every live block.
    ranges: BTreeSet<(u32, u32, u32)>,
    code: CodeBuffer,
    max_blocks: usize,
    check: bool,
    /// Longest guest range of any live block, bounding range scans.
    max_span: u32,
}

impl BlockCache {
    pub fn new(config: &JitConfig) -> Self {
        Self {
            blocks: Vec::new(),
            tags: ICacheTagTable::new(config.icache, config.extended_ram),
            starts: HashMap::new(),
            ranges: BTreeSet::new(),
            code: CodeBuffer::new(config.code_buffer_capacity),
            max_blocks: config.max_blocks,
            check: config.icache_check,
            max_span: 0,
        }
    }

    /// Number of live blocks.
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn get(&self, id: u32) -> &CompiledBlock {
        &self.blocks[id as usize]
    }

    pub fn code(&self) -> &CodeBuffer {
        &self.code
    }

    pub fn code_mut(&mut self) -> &mut CodeBuffer {
        &mut self.code
    }

    pub fn tags(&self) -> &ICacheTagTable {
        &self.tags
    }

    pub fn checking(&self) -> bool {
        self.check
    }

    pub fn set_checking(&mut self, on: bool) {
        self.check = on;
    }

    /// Find a live block for `(pc, mode)`.
    pub fn lookup(&mut self, pc: u32, mode: AddressingMode) -> Option<u32> {
        if let Some(id) = self.tags.lookup(pc) {
            let b = &self.blocks[id as usize];
            if !b.invalid && b.address == pc && b.mode == mode {
                return Some(id);
            }
        }
        let id = *self.starts.get(&(pc, mode))?;
        self.tags.insert(pc, id);
        Some(id)
    }

    /// Translate and lower the block at `req.pc`.
    pub fn compile<B: HostCodeGen>(
        &mut self,
        ir: &mut Context,
        frontend: &mut dyn BlockTranslator,
        backend: &mut B,
        mem: &dyn GuestMemory,
        req: &TranslateRequest<'_>,
    ) -> Result<u32, CompileError> {
        if self.blocks.len() >= self.max_blocks {
            return Err(CompileError::BlockTableFull {
                max: self.max_blocks,
            });
        }
        let pc = req.pc;
        let tb = frontend
            .gen_code(ir, mem, req)
            .map_err(|fault| CompileError::Fetch { pc, fault })?;
        let phys = mem
            .translate_address(pc, Access::Fetch, req.mode)
            .unwrap_or(pc);

        let host_offset = translate(ir, backend, &mut self.code)?;
        let host_size = self.code.offset() - host_offset;

        if let Some(&old) = self.starts.get(&(pc, req.mode)) {
            self.destroy(old);
        }

        let id = self.blocks.len() as u32;
        let block = CompiledBlock {
            address: pc,
            phys_address: phys,
            mode: req.mode,
            num_insns: tb.num_insns,
            checksum: tb.checksum,
            host_offset,
            host_size,
            cost: tb.cost,
            generation: self.code.generation(),
            invalid: false,
        };
        self.max_span = self.max_span.max(block.guest_len());
        self.ranges.insert((block.phys_end(), phys, id));
        self.starts.insert((pc, req.mode), id);
        self.tags.insert(pc, id);
        self.blocks.push(block);

        debug!(
            pc = format_args!("{pc:#010x}"),
            id,
            insns = tb.num_insns,
            host = host_size,
            "compiled block"
        );
        Ok(id)
    }

    /// Whether the block's guest code is unchanged since compilation.
    pub fn validate(&self, id: u32, mem: &dyn GuestMemory) -> bool {
        if !self.check {
            return true;
        }
        let b = &self.blocks[id as usize];
        let mut sum = BlockChecksum::new();
        for i in 0..b.num_insns {
            match mem.fetch_insn(b.address.wrapping_add(i * 4), b.mode) {
                Ok(word) => sum.push(word),
                Err(_) => return false,
            }
        }
        sum.finish() == b.checksum
    }

    /// Destroy every block whose physical range overlaps
    /// `[start, start + len)`. Returns the number destroyed.
    pub fn invalidate(&mut self, start: u32, len: u32) -> usize {
        if len == 0 {
            return 0;
        }
        let end = start.saturating_add(len);
        let scan_end = end.saturating_add(self.max_span);
        let hits: Vec<u32> = self
            .ranges
            .range((Bound::Excluded((start, u32::MAX, u32::MAX)), Bound::Unbounded))
            .take_while(|&&(e, _, _)| e <= scan_end)
            .filter(|&&(_, s, _)| s < end)
            .map(|&(_, _, id)| id)
            .collect();
        for &id in &hits {
            self.destroy(id);
        }
        if !hits.is_empty() {
            debug!(
                start = format_args!("{start:#010x}"),
                len,
                blocks = hits.len(),
                "invalidated range"
            );
        }
        hits.len()
    }

    fn destroy(&mut self, id: u32) {
        let b = &mut self.blocks[id as usize];
        if b.invalid {
            return;
        }
        b.invalid = true;
        let (pc, mode, phys, end) = (b.address, b.mode, b.phys_address, b.phys_end());
        self.ranges.remove(&(end, phys, id));
        if self.starts.get(&(pc, mode)) == Some(&id) {
            self.starts.remove(&(pc, mode));
        }
        self.tags.remove_if(pc, id);
    }

    /// Drop every block and reclaim all code space.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.tags.reset();
        self.starts.clear();
        self.ranges.clear();
        self.code.reset();
        self.max_span = 0;
        debug!(generation = self.code.generation(), "block cache cleared");
    }
}
