//! Frontend: guest instruction decoding and IR generation.
//!
//! Provides the generic translation framework (`TranslatorOps` trait
//! and `translator_loop`), the object-safe [`BlockTranslator`] seam the
//! dispatcher compiles through, and the Gekko decoder/translator.

pub mod gekko;

use ppc_core::{AddressingMode, Context};
use ppc_memory::{GuestMemory, MemFault};

// ---------------------------------------------------------------
// Generic translation framework
// ---------------------------------------------------------------

/// Block termination reason set by `translate_insn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisasJumpType {
    /// Continue to the next sequential instruction.
    Next,
    /// Reached the maximum number of instructions per block.
    TooMany,
    /// The next instruction cannot join this block (fetch fault or a
    /// hooked address); exit to it.
    Stop,
    /// Unconditional branch / exit, no fall-through.
    NoReturn,
}

/// Base context shared by all guest architectures.
pub struct DisasContextBase {
    /// PC of the first instruction in this block.
    pub pc_first: u32,
    /// PC of the *next* instruction to decode.
    pub pc_next: u32,
    /// How the current instruction terminates.
    pub is_jmp: DisasJumpType,
    /// Number of guest instructions translated so far.
    pub num_insns: u32,
    /// Maximum instructions allowed in one block.
    pub max_insns: u32,
}

impl DisasContextBase {
    pub fn new(pc: u32, max_insns: u32) -> Self {
        Self {
            pc_first: pc,
            pc_next: pc,
            is_jmp: DisasJumpType::Next,
            num_insns: 0,
            max_insns: max_insns.max(1),
        }
    }
}

/// Per-architecture translation operations.
pub trait TranslatorOps {
    /// Architecture-specific disassembly context.
    type DisasContext;

    /// One-time setup before the translation loop.
    fn init_disas_context(ctx: &mut Self::DisasContext, ir: &mut Context);

    /// Called once at the start of the block (after init).
    fn tb_start(ctx: &mut Self::DisasContext, ir: &mut Context);

    /// Whether the instruction at `base().pc_next` may be translated
    /// into this block. Called before `insn_start`.
    fn insn_available(ctx: &mut Self::DisasContext) -> bool;

    /// Emit the `insn_start` marker for the current guest PC.
    fn insn_start(ctx: &mut Self::DisasContext, ir: &mut Context);

    /// Decode and translate one guest instruction.
    ///
    /// Must advance `base().pc_next` and set `base().is_jmp`
    /// when the instruction terminates the block.
    fn translate_insn(ctx: &mut Self::DisasContext, ir: &mut Context);

    /// Emit the block epilogue for fall-through exits.
    fn tb_stop(ctx: &mut Self::DisasContext, ir: &mut Context);

    fn base(ctx: &Self::DisasContext) -> &DisasContextBase;

    fn base_mut(ctx: &mut Self::DisasContext) -> &mut DisasContextBase;
}

/// Generic translation loop: drives the decode -> translate cycle.
pub fn translator_loop<T: TranslatorOps>(ctx: &mut T::DisasContext, ir: &mut Context) {
    T::init_disas_context(ctx, ir);
    T::tb_start(ctx, ir);

    loop {
        if !T::insn_available(ctx) {
            T::base_mut(ctx).is_jmp = DisasJumpType::Stop;
            break;
        }
        T::insn_start(ctx, ir);
        T::translate_insn(ctx, ir);

        let base = T::base(ctx);
        if base.is_jmp != DisasJumpType::Next {
            break;
        }
        if base.num_insns >= base.max_insns {
            T::base_mut(ctx).is_jmp = DisasJumpType::TooMany;
            break;
        }
    }

    T::tb_stop(ctx, ir);
}

// ---------------------------------------------------------------
// Dispatcher-facing seam
// ---------------------------------------------------------------

/// HLE hook lookup consulted while translating.
pub trait HookQuery {
    /// Hook id registered at `pc`, if any.
    fn hook_at(&self, pc: u32) -> Option<u32>;
}

/// A hook table with no entries.
pub struct NoHooks;

impl HookQuery for NoHooks {
    fn hook_at(&self, _pc: u32) -> Option<u32> {
        None
    }
}

pub struct TranslateRequest<'a> {
    pub pc: u32,
    pub mode: AddressingMode,
    pub max_insns: u32,
    pub hooks: &'a dyn HookQuery,
}

/// Summary of a translated block; the IR is left in the `Context`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslatedBlock {
    pub num_insns: u32,
    /// Cost charged when the block runs to its final exit.
    pub cost: u32,
    /// Checksum of the fetched instruction words.
    pub checksum: u64,
}

/// Produces IR for one guest block.
pub trait BlockTranslator: Send {
    /// Translate the block at `req.pc` into `ir` (which is reset first).
    ///
    /// Fails only when the first instruction cannot be fetched.
    fn gen_code(
        &mut self,
        ir: &mut Context,
        mem: &dyn GuestMemory,
        req: &TranslateRequest<'_>,
    ) -> Result<TranslatedBlock, MemFault>;
}
