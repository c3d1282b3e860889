//! Gekko frontend: PowerPC 750CL integer subset.

pub mod insn;
pub mod interp;
mod trans;

use std::marker::PhantomData;

use ppc_core::state::{NUM_GPRS, SPR_CTR, SPR_LR, SPR_SRR0, SPR_SRR1, SPR_XER};
use ppc_core::{AddressingMode, BlockChecksum, Context, ExitKind, GlobalReg, TempIdx};
use ppc_memory::{GuestMemory, MemFault, PAGE_SIZE};

use crate::{
    translator_loop, BlockTranslator, DisasContextBase, DisasJumpType, HookQuery,
    TranslateRequest, TranslatedBlock, TranslatorOps,
};
use insn::Insn;

// ---------------------------------------------------------------
// Disassembly context
// ---------------------------------------------------------------

pub struct GekkoDisasContext<'m> {
    pub base: DisasContextBase,
    mem: &'m dyn GuestMemory,
    mode: AddressingMode,
    hooks: &'m dyn HookQuery,

    // -- Globals --
    pub gpr: [TempIdx; NUM_GPRS],
    pub cr: TempIdx,
    pub xer: TempIdx,
    pub lr: TempIdx,
    pub ctr: TempIdx,
    pub msr: TempIdx,
    pub srr0: TempIdx,
    pub srr1: TempIdx,
    pub pc: TempIdx,
    pub npc: TempIdx,

    /// Raw word of the instruction being translated.
    pub opcode: u32,
    /// Hook id at the current PC.
    hook: Option<u32>,
    /// Cycle total through the current instruction.
    pub cost: u32,
    checksum: BlockChecksum,
    /// Fault raised fetching the first instruction.
    fault: Option<MemFault>,
}

impl<'m> GekkoDisasContext<'m> {
    pub fn new(
        mem: &'m dyn GuestMemory,
        req: &TranslateRequest<'m>,
    ) -> Self {
        Self {
            base: DisasContextBase::new(req.pc, req.max_insns),
            mem,
            mode: req.mode,
            hooks: req.hooks,
            gpr: [TempIdx(0); NUM_GPRS],
            cr: TempIdx(0),
            xer: TempIdx(0),
            lr: TempIdx(0),
            ctr: TempIdx(0),
            msr: TempIdx(0),
            srr0: TempIdx(0),
            srr1: TempIdx(0),
            pc: TempIdx(0),
            npc: TempIdx(0),
            opcode: 0,
            hook: None,
            cost: 0,
            checksum: BlockChecksum::new(),
            fault: None,
        }
    }

    /// PC of the instruction being translated.
    pub fn cur_pc(&self) -> u32 {
        self.base.pc_next
    }
}

// ---------------------------------------------------------------
// TranslatorOps implementation
// ---------------------------------------------------------------

pub struct GekkoTranslator<'m>(PhantomData<&'m ()>);

impl<'m> TranslatorOps for GekkoTranslator<'m> {
    type DisasContext = GekkoDisasContext<'m>;

    fn init_disas_context(ctx: &mut GekkoDisasContext<'m>, ir: &mut Context) {
        for i in 0..NUM_GPRS {
            ctx.gpr[i] = ir.global(GlobalReg::Gpr(i as u8));
        }
        ctx.cr = ir.global(GlobalReg::Cr);
        ctx.xer = ir.global(GlobalReg::Spr(SPR_XER as u16));
        ctx.lr = ir.global(GlobalReg::Spr(SPR_LR as u16));
        ctx.ctr = ir.global(GlobalReg::Spr(SPR_CTR as u16));
        ctx.msr = ir.global(GlobalReg::Msr);
        ctx.srr0 = ir.global(GlobalReg::Spr(SPR_SRR0 as u16));
        ctx.srr1 = ir.global(GlobalReg::Spr(SPR_SRR1 as u16));
        ctx.pc = ir.global(GlobalReg::Pc);
        ctx.npc = ir.global(GlobalReg::Npc);
    }

    fn tb_start(_ctx: &mut GekkoDisasContext<'m>, _ir: &mut Context) {}

    fn insn_available(ctx: &mut GekkoDisasContext<'m>) -> bool {
        let pc = ctx.base.pc_next;
        let first = ctx.base.num_insns == 0;
        // Blocks never cross a page: the range index holds one contiguous
        // physical span per block.
        if !first && pc & (PAGE_SIZE - 1) == 0 {
            return false;
        }
        ctx.hook = ctx.hooks.hook_at(pc);
        if ctx.hook.is_some() {
            // A hooked function always starts its own block. The word
            // still feeds the checksum so validation covers it.
            if !first {
                return false;
            }
            return match ctx.mem.fetch_insn(pc, ctx.mode) {
                Ok(word) => {
                    ctx.checksum.push(word);
                    true
                }
                Err(fault) => {
                    ctx.fault = Some(fault);
                    false
                }
            };
        }
        match ctx.mem.fetch_insn(pc, ctx.mode) {
            Ok(word) => {
                ctx.opcode = word;
                true
            }
            Err(fault) => {
                if first {
                    ctx.fault = Some(fault);
                }
                false
            }
        }
    }

    fn insn_start(ctx: &mut GekkoDisasContext<'m>, ir: &mut Context) {
        let cost = match ctx.hook {
            Some(_) => 0,
            None => Insn::decode(ctx.opcode).cost(),
        };
        ctx.cost += cost;
        ir.gen_insn_start(ctx.base.pc_next, ctx.cost);
        ctx.base.num_insns += 1;
    }

    fn translate_insn(ctx: &mut GekkoDisasContext<'m>, ir: &mut Context) {
        if let Some(id) = ctx.hook {
            let pc = ctx.cur_pc();
            ctx.gen_set_pc(ir, pc);
            let v = ir.new_const(id);
            ir.gen_exit_tb(ExitKind::Hle, v, ctx.cost);
            ctx.base.is_jmp = DisasJumpType::NoReturn;
            ctx.base.pc_next = pc.wrapping_add(4);
            return;
        }
        ctx.checksum.push(ctx.opcode);
        let insn = Insn::decode(ctx.opcode);
        ctx.translate(ir, insn);
        ctx.base.pc_next = ctx.base.pc_next.wrapping_add(4);
    }

    fn tb_stop(ctx: &mut GekkoDisasContext<'m>, ir: &mut Context) {
        match ctx.base.is_jmp {
            DisasJumpType::NoReturn => {}
            DisasJumpType::Next | DisasJumpType::TooMany | DisasJumpType::Stop => {
                if ctx.fault.is_some() {
                    return;
                }
                let pc = ctx.base.pc_next;
                ctx.gen_set_pc(ir, pc);
                let v = ir.new_const(pc);
                ir.gen_exit_tb(ExitKind::Branch, v, ctx.cost);
            }
        }
    }

    fn base(ctx: &Self::DisasContext) -> &DisasContextBase {
        &ctx.base
    }

    fn base_mut(ctx: &mut Self::DisasContext) -> &mut DisasContextBase {
        &mut ctx.base
    }
}

// ---------------------------------------------------------------
// Block translator
// ---------------------------------------------------------------

/// The Gekko [`BlockTranslator`].
#[derive(Default)]
pub struct GekkoFrontend;

impl GekkoFrontend {
    pub fn new() -> Self {
        Self
    }
}

impl BlockTranslator for GekkoFrontend {
    fn gen_code(
        &mut self,
        ir: &mut Context,
        mem: &dyn GuestMemory,
        req: &TranslateRequest<'_>,
    ) -> Result<TranslatedBlock, MemFault> {
        ir.reset();
        let mut ctx = GekkoDisasContext::new(mem, req);
        translator_loop::<GekkoTranslator<'_>>(&mut ctx, ir);
        if let Some(fault) = ctx.fault {
            ir.reset();
            return Err(fault);
        }
        tracing::trace!(
            pc = format_args!("{:#010x}", req.pc),
            insns = ctx.base.num_insns,
            ops = ir.num_ops(),
            "translated block"
        );
        Ok(TranslatedBlock {
            num_insns: ctx.base.num_insns,
            cost: ctx.cost,
            checksum: ctx.checksum.finish(),
        })
    }
}
