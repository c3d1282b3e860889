//! Host code emission and execution.
//!
//! Lowers block IR into a host representation held in a [`CodeBuffer`]
//! and runs it against a `CpuState`. The shipped backend is threaded
//! code: a compact instruction array interpreted by a tight dispatch
//! routine, entered and left only through the block prologue and its
//! exits.

pub mod code_buffer;
pub mod optimize;
pub mod threaded;
pub mod translate;

pub use code_buffer::{CodeBuffer, CodeBufferFull};
pub use threaded::{HostInsn, Loc, ThreadedBackend};

use ppc_core::{AddressingMode, BlockExit, Context, CpuState, Op};
use ppc_memory::GuestMemory;

/// Everything a running block may touch.
pub struct ExecCtx<'a> {
    pub state: &'a mut CpuState,
    pub mem: &'a mut dyn GuestMemory,
    /// Addressing mode the block was compiled for.
    pub mode: AddressingMode,
}

/// Trait for host code generators.
///
/// [`translate::translate`] drives it: `emit_prologue` once per block,
/// `emit_op` for every IR op except labels, then `patch_jump` to
/// resolve forward branches.
pub trait HostCodeGen {
    /// Emit the block prologue and assign frame slots for the block's
    /// locals.
    fn emit_prologue(&mut self, buf: &mut CodeBuffer, ctx: &Context) -> Result<(), CodeBufferFull>;

    /// Emit host code for one IR op. Returns the offset of the last
    /// instruction emitted; for branches this is the one to patch.
    fn emit_op(&mut self, buf: &mut CodeBuffer, ctx: &Context, op: &Op) -> Result<usize, CodeBufferFull>;

    /// Point the branch at `jump_offset` to `target_offset`.
    fn patch_jump(&self, buf: &mut CodeBuffer, jump_offset: usize, target_offset: usize);

    /// Run the block whose prologue is at `offset` until it exits.
    fn exec_block(&mut self, buf: &CodeBuffer, offset: usize, cx: ExecCtx<'_>) -> BlockExit;
}
