//! Gekko instruction translation: IR generation.
//!
//! Repetitive logic is factored into small `gen_*` helpers on the
//! disassembly context. Every helper computes into fresh temps and
//! writes guest registers last, so `rD == rA` aliasing is harmless.

use ppc_core::state::XER_CA;
use ppc_core::{Cond, Context, ExceptionFlags, ExitKind, GlobalReg, MemOp, TempIdx};

use super::insn::{
    crm_mask, rotate_mask, ArithOp, ArithUnaryOp, CrOp, Ea, Insn, LogicImmOp, LogicOp, UnaryOp,
};
use super::GekkoDisasContext;
use crate::DisasJumpType;

/// Binary IR operation: `fn(ir, dst, lhs, rhs) -> dst`.
type BinOp = fn(&mut Context, TempIdx, TempIdx, TempIdx) -> TempIdx;

/// MSR bits restored from SRR1 by `rfi`.
const RFI_MSR_MASK: u32 = 0x87C0_FFFF;

// ── Helpers ────────────────────────────────────────────────────

impl GekkoDisasContext<'_> {
    // -- Register access -----------------------------------

    /// Read GPR `r` as a base register; r0 reads as zero.
    fn gpr_or_zero(&self, ir: &mut Context, r: u8) -> TempIdx {
        if r == 0 {
            ir.new_const(0)
        } else {
            self.gpr[r as usize]
        }
    }

    fn set_gpr(&self, ir: &mut Context, r: u8, val: TempIdx) {
        ir.gen_mov(self.gpr[r as usize], val);
    }

    pub(super) fn gen_set_pc(&self, ir: &mut Context, pc: u32) {
        ir.gen_movi(self.pc, pc);
    }

    fn binop(&self, ir: &mut Context, op: BinOp, a: TempIdx, b: TempIdx) -> TempIdx {
        let d = ir.new_temp();
        op(ir, d, a, b)
    }

    fn binop_imm(&self, ir: &mut Context, op: BinOp, a: TempIdx, imm: u32) -> TempIdx {
        let c = ir.new_const(imm);
        self.binop(ir, op, a, c)
    }

    fn setcond(&self, ir: &mut Context, cond: Cond, a: TempIdx, b: TempIdx) -> TempIdx {
        let d = ir.new_temp();
        ir.gen_setcond(cond, d, a, b)
    }

    // -- Condition register --------------------------------

    /// LT/GT/EQ/SO nibble for comparing `a` with `b`.
    fn gen_compare(&self, ir: &mut Context, a: TempIdx, b: TempIdx, signed: bool) -> TempIdx {
        let (lt, gt) = if signed {
            (Cond::Lt, Cond::Gt)
        } else {
            (Cond::Ltu, Cond::Gtu)
        };
        let lt = self.setcond(ir, lt, a, b);
        let gt = self.setcond(ir, gt, a, b);
        let eq = self.setcond(ir, Cond::Eq, a, b);
        let so = self.binop_imm(ir, Context::gen_shr, self.xer, 31);
        let lt = self.binop_imm(ir, Context::gen_shl, lt, 3);
        let gt = self.binop_imm(ir, Context::gen_shl, gt, 2);
        let eq = self.binop_imm(ir, Context::gen_shl, eq, 1);
        let f = self.binop(ir, Context::gen_or, lt, gt);
        let f = self.binop(ir, Context::gen_or, f, eq);
        self.binop(ir, Context::gen_or, f, so)
    }

    /// Replace CR field `crf` with the low nibble of `f`.
    fn gen_set_cr_field(&self, ir: &mut Context, crf: u8, f: TempIdx) {
        let shift = (7 - crf as u32) * 4;
        let kept = self.binop_imm(ir, Context::gen_and, self.cr, !(0xF << shift));
        let field = self.binop_imm(ir, Context::gen_shl, f, shift);
        ir.gen_or(self.cr, kept, field);
    }

    /// Update CR0 from a result (`Rc = 1`).
    fn gen_record(&self, ir: &mut Context, val: TempIdx) {
        let zero = ir.new_const(0);
        let f = self.gen_compare(ir, val, zero, true);
        self.gen_set_cr_field(ir, 0, f);
    }

    /// CR bit `n` (0 = most significant) as 0/1.
    fn gen_cr_bit(&self, ir: &mut Context, n: u8) -> TempIdx {
        let t = self.binop_imm(ir, Context::gen_shr, self.cr, 31 - n as u32);
        self.binop_imm(ir, Context::gen_and, t, 1)
    }

    // -- Carry ---------------------------------------------

    fn gen_get_ca(&self, ir: &mut Context) -> TempIdx {
        let t = self.binop_imm(ir, Context::gen_shr, self.xer, 29);
        self.binop_imm(ir, Context::gen_and, t, 1)
    }

    fn gen_set_ca(&self, ir: &mut Context, ca: TempIdx) {
        let kept = self.binop_imm(ir, Context::gen_and, self.xer, !XER_CA);
        let bit = self.binop_imm(ir, Context::gen_shl, ca, 29);
        ir.gen_or(self.xer, kept, bit);
    }

    /// `a + b (+ ca_in)` returning `(sum, carry_out)`.
    fn gen_add_carry(
        &self,
        ir: &mut Context,
        a: TempIdx,
        b: TempIdx,
        ca_in: Option<TempIdx>,
    ) -> (TempIdx, TempIdx) {
        let t = self.binop(ir, Context::gen_add, a, b);
        let c1 = self.setcond(ir, Cond::Ltu, t, a);
        match ca_in {
            None => (t, c1),
            Some(ci) => {
                let r = self.binop(ir, Context::gen_add, t, ci);
                let c2 = self.setcond(ir, Cond::Ltu, r, t);
                let ca = self.binop(ir, Context::gen_or, c1, c2);
                (r, ca)
            }
        }
    }

    // -- Memory --------------------------------------------

    fn gen_ea(&self, ir: &mut Context, ra: u8, ea: Ea) -> TempIdx {
        let base = self.gpr_or_zero(ir, ra);
        match ea {
            Ea::Disp(d) => self.binop_imm(ir, Context::gen_add, base, d as i32 as u32),
            Ea::Indexed(rb) => self.binop(ir, Context::gen_add, base, self.gpr[rb as usize]),
        }
    }

    // -- Exits ---------------------------------------------

    fn gen_exit(&mut self, ir: &mut Context, kind: ExitKind, val: TempIdx) {
        ir.gen_exit_tb(kind, val, self.cost);
    }

    fn gen_branch_exit(&mut self, ir: &mut Context, target: TempIdx) {
        ir.gen_mov(self.pc, target);
        self.gen_exit(ir, ExitKind::Branch, target);
    }

    /// Raise `flags` at the current instruction. `npc` is the resume
    /// address for causes that return past the instruction.
    fn gen_raise(&mut self, ir: &mut Context, flags: ExceptionFlags, npc: u32) {
        let pc = self.cur_pc();
        self.gen_set_pc(ir, pc);
        ir.gen_movi(self.npc, npc);
        let v = ir.new_const(flags.bits());
        self.gen_exit(ir, ExitKind::Exception, v);
        self.base.is_jmp = DisasJumpType::NoReturn;
    }

    /// Common tail of `bc`, `bclr` and `bcctr`.
    ///
    /// `target` must already hold the branch address. CTR is
    /// decremented when BO says so; a conditional branch that is not
    /// taken continues in this block unless it links.
    fn gen_bc(&mut self, ir: &mut Context, bo: u8, bi: u8, lk: bool, target: TempIdx) {
        let pc = self.cur_pc();
        let next = pc.wrapping_add(4);
        if bo & 0x04 == 0 {
            let one = ir.new_const(1);
            ir.gen_sub(self.ctr, self.ctr, one);
        }
        if lk {
            ir.gen_movi(self.lr, next);
        }

        let always = bo & 0x14 == 0x14;
        let skip = (!always).then(|| ir.new_label());
        if let Some(skip) = skip {
            if bo & 0x04 == 0 {
                // Branch requires CTR != 0, or CTR == 0 when BO[2] is set.
                let cond = if bo & 0x02 != 0 { Cond::Ne } else { Cond::Eq };
                ir.gen_brcondi(cond, self.ctr, 0, skip);
            }
            if bo & 0x10 == 0 {
                let mask = 0x8000_0000u32 >> bi;
                let cond = if bo & 0x08 != 0 {
                    Cond::TstEq
                } else {
                    Cond::TstNe
                };
                ir.gen_brcondi(cond, self.cr, mask, skip);
            }
        }

        self.gen_branch_exit(ir, target);

        match skip {
            None => self.base.is_jmp = DisasJumpType::NoReturn,
            Some(skip) => {
                ir.gen_set_label(skip);
                if lk {
                    let t = ir.new_const(next);
                    self.gen_branch_exit(ir, t);
                    self.base.is_jmp = DisasJumpType::NoReturn;
                }
            }
        }
    }
}

// ── Per-instruction translation ────────────────────────────────

impl GekkoDisasContext<'_> {
    pub(super) fn translate(&mut self, ir: &mut Context, insn: Insn) {
        match insn {
            Insn::Addi { rd, ra, simm } => {
                let a = self.gpr_or_zero(ir, ra);
                let r = self.binop_imm(ir, Context::gen_add, a, simm as i32 as u32);
                self.set_gpr(ir, rd, r);
            }
            Insn::Addis { rd, ra, simm } => {
                let a = self.gpr_or_zero(ir, ra);
                let r = self.binop_imm(ir, Context::gen_add, a, (simm as i32 as u32) << 16);
                self.set_gpr(ir, rd, r);
            }
            Insn::Addic { rd, ra, simm, rc } => {
                let b = ir.new_const(simm as i32 as u32);
                let (r, ca) = self.gen_add_carry(ir, self.gpr[ra as usize], b, None);
                self.gen_set_ca(ir, ca);
                self.set_gpr(ir, rd, r);
                if rc {
                    self.gen_record(ir, r);
                }
            }
            Insn::Subfic { rd, ra, simm } => {
                let imm = ir.new_const(simm as i32 as u32);
                let a = self.gpr[ra as usize];
                let r = self.binop(ir, Context::gen_sub, imm, a);
                let ca = self.setcond(ir, Cond::Geu, imm, a);
                self.gen_set_ca(ir, ca);
                self.set_gpr(ir, rd, r);
            }
            Insn::Mulli { rd, ra, simm } => {
                let r = self.binop_imm(ir, Context::gen_mul, self.gpr[ra as usize], simm as i32 as u32);
                self.set_gpr(ir, rd, r);
            }

            Insn::Cmpi { crf, ra, simm } => {
                let b = ir.new_const(simm as i32 as u32);
                let f = self.gen_compare(ir, self.gpr[ra as usize], b, true);
                self.gen_set_cr_field(ir, crf, f);
            }
            Insn::Cmpli { crf, ra, uimm } => {
                let b = ir.new_const(uimm as u32);
                let f = self.gen_compare(ir, self.gpr[ra as usize], b, false);
                self.gen_set_cr_field(ir, crf, f);
            }
            Insn::Cmp { crf, ra, rb } => {
                let f = self.gen_compare(ir, self.gpr[ra as usize], self.gpr[rb as usize], true);
                self.gen_set_cr_field(ir, crf, f);
            }
            Insn::Cmpl { crf, ra, rb } => {
                let f = self.gen_compare(ir, self.gpr[ra as usize], self.gpr[rb as usize], false);
                self.gen_set_cr_field(ir, crf, f);
            }

            Insn::LogicImm { op, ra, rs, uimm } => {
                let s = self.gpr[rs as usize];
                let imm = uimm as u32;
                let r = match op {
                    LogicImmOp::Ori => self.binop_imm(ir, Context::gen_or, s, imm),
                    LogicImmOp::Oris => self.binop_imm(ir, Context::gen_or, s, imm << 16),
                    LogicImmOp::Xori => self.binop_imm(ir, Context::gen_xor, s, imm),
                    LogicImmOp::Xoris => self.binop_imm(ir, Context::gen_xor, s, imm << 16),
                    LogicImmOp::Andi => self.binop_imm(ir, Context::gen_and, s, imm),
                    LogicImmOp::Andis => self.binop_imm(ir, Context::gen_and, s, imm << 16),
                };
                self.set_gpr(ir, ra, r);
                if matches!(op, LogicImmOp::Andi | LogicImmOp::Andis) {
                    self.gen_record(ir, r);
                }
            }

            Insn::Arith { op, rd, ra, rb, rc } => {
                let a = self.gpr[ra as usize];
                let b = self.gpr[rb as usize];
                let r = match op {
                    ArithOp::Add => self.binop(ir, Context::gen_add, a, b),
                    ArithOp::Addc => {
                        let (r, ca) = self.gen_add_carry(ir, a, b, None);
                        self.gen_set_ca(ir, ca);
                        r
                    }
                    ArithOp::Adde => {
                        let ci = self.gen_get_ca(ir);
                        let (r, ca) = self.gen_add_carry(ir, a, b, Some(ci));
                        self.gen_set_ca(ir, ca);
                        r
                    }
                    ArithOp::Subf => self.binop(ir, Context::gen_sub, b, a),
                    ArithOp::Subfc => {
                        let r = self.binop(ir, Context::gen_sub, b, a);
                        let ca = self.setcond(ir, Cond::Geu, b, a);
                        self.gen_set_ca(ir, ca);
                        r
                    }
                    ArithOp::Subfe => {
                        let ci = self.gen_get_ca(ir);
                        let na = ir.new_temp();
                        ir.gen_not(na, a);
                        let (r, ca) = self.gen_add_carry(ir, na, b, Some(ci));
                        self.gen_set_ca(ir, ca);
                        r
                    }
                    ArithOp::Mullw => self.binop(ir, Context::gen_mul, a, b),
                    ArithOp::Mulhw => self.binop(ir, Context::gen_mulsh, a, b),
                    ArithOp::Mulhwu => self.binop(ir, Context::gen_muluh, a, b),
                    ArithOp::Divw => self.binop(ir, Context::gen_divs, a, b),
                    ArithOp::Divwu => self.binop(ir, Context::gen_divu, a, b),
                };
                self.set_gpr(ir, rd, r);
                if rc {
                    self.gen_record(ir, r);
                }
            }
            Insn::ArithUnary { op, rd, ra, rc } => {
                let a = self.gpr[ra as usize];
                let r = match op {
                    ArithUnaryOp::Neg => {
                        let d = ir.new_temp();
                        ir.gen_neg(d, a)
                    }
                    _ => {
                        let src = match op {
                            ArithUnaryOp::Subfme | ArithUnaryOp::Subfze => {
                                let na = ir.new_temp();
                                ir.gen_not(na, a)
                            }
                            _ => a,
                        };
                        let addend = match op {
                            ArithUnaryOp::Addme | ArithUnaryOp::Subfme => ir.new_const(u32::MAX),
                            _ => ir.new_const(0),
                        };
                        let ci = self.gen_get_ca(ir);
                        let (r, ca) = self.gen_add_carry(ir, src, addend, Some(ci));
                        self.gen_set_ca(ir, ca);
                        r
                    }
                };
                self.set_gpr(ir, rd, r);
                if rc {
                    self.gen_record(ir, r);
                }
            }

            Insn::Logic { op, ra, rs, rb, rc } => {
                let s = self.gpr[rs as usize];
                let b = self.gpr[rb as usize];
                let r = match op {
                    LogicOp::And => self.binop(ir, Context::gen_and, s, b),
                    LogicOp::Andc => self.binop(ir, Context::gen_andc, s, b),
                    LogicOp::Or => self.binop(ir, Context::gen_or, s, b),
                    LogicOp::Orc => self.binop(ir, Context::gen_orc, s, b),
                    LogicOp::Xor => self.binop(ir, Context::gen_xor, s, b),
                    LogicOp::Nor => self.binop(ir, Context::gen_nor, s, b),
                    LogicOp::Nand => self.binop(ir, Context::gen_nand, s, b),
                    LogicOp::Eqv => self.binop(ir, Context::gen_eqv, s, b),
                    LogicOp::Slw => self.binop(ir, Context::gen_shl, s, b),
                    LogicOp::Srw => self.binop(ir, Context::gen_shr, s, b),
                    LogicOp::Sraw => {
                        let r = self.binop(ir, Context::gen_sar, s, b);
                        let back = self.binop(ir, Context::gen_shl, r, b);
                        let zero = ir.new_const(0);
                        let neg = self.setcond(ir, Cond::Lt, s, zero);
                        let lost = self.setcond(ir, Cond::Ne, back, s);
                        let ca = self.binop(ir, Context::gen_and, neg, lost);
                        self.gen_set_ca(ir, ca);
                        r
                    }
                };
                self.set_gpr(ir, ra, r);
                if rc {
                    self.gen_record(ir, r);
                }
            }
            Insn::Srawi { ra, rs, sh, rc } => {
                let s = self.gpr[rs as usize];
                let r = self.binop_imm(ir, Context::gen_sar, s, sh as u32);
                let ca = if sh == 0 {
                    ir.new_const(0)
                } else {
                    let zero = ir.new_const(0);
                    let neg = self.setcond(ir, Cond::Lt, s, zero);
                    let low = self.binop_imm(ir, Context::gen_and, s, (1u32 << sh) - 1);
                    let lost = self.setcond(ir, Cond::Ne, low, zero);
                    self.binop(ir, Context::gen_and, neg, lost)
                };
                self.gen_set_ca(ir, ca);
                self.set_gpr(ir, ra, r);
                if rc {
                    self.gen_record(ir, r);
                }
            }
            Insn::Unary { op, ra, rs, rc } => {
                let s = self.gpr[rs as usize];
                let d = ir.new_temp();
                let r = match op {
                    UnaryOp::Cntlzw => ir.gen_clz(d, s),
                    UnaryOp::Extsb => ir.gen_ext8s(d, s),
                    UnaryOp::Extsh => ir.gen_ext16s(d, s),
                };
                self.set_gpr(ir, ra, r);
                if rc {
                    self.gen_record(ir, r);
                }
            }

            Insn::Rlwinm { ra, rs, sh, mb, me, rc } => {
                let rot = self.binop_imm(ir, Context::gen_rotl, self.gpr[rs as usize], sh as u32);
                let r = self.binop_imm(ir, Context::gen_and, rot, rotate_mask(mb as u32, me as u32));
                self.set_gpr(ir, ra, r);
                if rc {
                    self.gen_record(ir, r);
                }
            }
            Insn::Rlwnm { ra, rs, rb, mb, me, rc } => {
                let rot = self.binop(ir, Context::gen_rotl, self.gpr[rs as usize], self.gpr[rb as usize]);
                let r = self.binop_imm(ir, Context::gen_and, rot, rotate_mask(mb as u32, me as u32));
                self.set_gpr(ir, ra, r);
                if rc {
                    self.gen_record(ir, r);
                }
            }
            Insn::Rlwimi { ra, rs, sh, mb, me, rc } => {
                let mask = rotate_mask(mb as u32, me as u32);
                let rot = self.binop_imm(ir, Context::gen_rotl, self.gpr[rs as usize], sh as u32);
                let ins = self.binop_imm(ir, Context::gen_and, rot, mask);
                let kept = self.binop_imm(ir, Context::gen_and, self.gpr[ra as usize], !mask);
                let r = self.binop(ir, Context::gen_or, ins, kept);
                self.set_gpr(ir, ra, r);
                if rc {
                    self.gen_record(ir, r);
                }
            }

            Insn::Load { op, rd, ra, ea, update } => {
                let addr = self.gen_ea(ir, ra, ea);
                let v = ir.new_temp();
                ir.gen_ld(op, v, addr);
                self.set_gpr(ir, rd, v);
                if update {
                    self.set_gpr(ir, ra, addr);
                }
            }
            Insn::Store { op, rs, ra, ea, update } => {
                let addr = self.gen_ea(ir, ra, ea);
                ir.gen_st(op, self.gpr[rs as usize], addr);
                if update {
                    self.set_gpr(ir, ra, addr);
                }
            }
            Insn::Lmw { rd, ra, d } => {
                let base = self.gen_ea(ir, ra, Ea::Disp(d));
                for (i, r) in (rd..32).enumerate() {
                    let addr = self.binop_imm(ir, Context::gen_add, base, 4 * i as u32);
                    let v = ir.new_temp();
                    ir.gen_ld(MemOp::U32, v, addr);
                    self.set_gpr(ir, r, v);
                }
            }
            Insn::Stmw { rs, ra, d } => {
                let base = self.gen_ea(ir, ra, Ea::Disp(d));
                for (i, r) in (rs..32).enumerate() {
                    let addr = self.binop_imm(ir, Context::gen_add, base, 4 * i as u32);
                    ir.gen_st(MemOp::U32, self.gpr[r as usize], addr);
                }
            }

            Insn::B { li, aa, lk } => {
                let pc = self.cur_pc();
                let target = if aa {
                    li as u32
                } else {
                    pc.wrapping_add(li as u32)
                };
                if lk {
                    ir.gen_movi(self.lr, pc.wrapping_add(4));
                }
                let t = ir.new_const(target);
                self.gen_branch_exit(ir, t);
                self.base.is_jmp = DisasJumpType::NoReturn;
            }
            Insn::Bc { bo, bi, bd, aa, lk } => {
                let disp = bd as i32 as u32;
                let target = if aa {
                    disp
                } else {
                    self.cur_pc().wrapping_add(disp)
                };
                let t = ir.new_const(target);
                self.gen_bc(ir, bo, bi, lk, t);
            }
            Insn::Bclr { bo, bi, lk } => {
                let t = self.binop_imm(ir, Context::gen_and, self.lr, !3);
                self.gen_bc(ir, bo, bi, lk, t);
            }
            Insn::Bcctr { bo, bi, lk } => {
                let t = self.binop_imm(ir, Context::gen_and, self.ctr, !3);
                self.gen_bc(ir, bo, bi, lk, t);
            }

            Insn::CrLogic { op, bt, ba, bb } => {
                let a = self.gen_cr_bit(ir, ba);
                let b = self.gen_cr_bit(ir, bb);
                let r = match op {
                    CrOp::And => self.binop(ir, Context::gen_and, a, b),
                    CrOp::Or => self.binop(ir, Context::gen_or, a, b),
                    CrOp::Xor => self.binop(ir, Context::gen_xor, a, b),
                    CrOp::Nand => self.binop(ir, Context::gen_nand, a, b),
                    CrOp::Nor => self.binop(ir, Context::gen_nor, a, b),
                    CrOp::Eqv => self.binop(ir, Context::gen_eqv, a, b),
                    CrOp::Andc => self.binop(ir, Context::gen_andc, a, b),
                    CrOp::Orc => self.binop(ir, Context::gen_orc, a, b),
                };
                let r = self.binop_imm(ir, Context::gen_and, r, 1);
                let shift = 31 - bt as u32;
                let kept = self.binop_imm(ir, Context::gen_and, self.cr, !(1u32 << shift));
                let bit = self.binop_imm(ir, Context::gen_shl, r, shift);
                ir.gen_or(self.cr, kept, bit);
            }
            Insn::Mcrf { crfd, crfs } => {
                let t = self.binop_imm(ir, Context::gen_shr, self.cr, (7 - crfs as u32) * 4);
                let f = self.binop_imm(ir, Context::gen_and, t, 0xF);
                self.gen_set_cr_field(ir, crfd, f);
            }

            Insn::Mfspr { rd, spr } => {
                let s = ir.global(GlobalReg::Spr(spr));
                self.set_gpr(ir, rd, s);
            }
            Insn::Mtspr { rs, spr } => {
                if spr as usize != ppc_core::state::SPR_PVR {
                    let s = ir.global(GlobalReg::Spr(spr));
                    ir.gen_mov(s, self.gpr[rs as usize]);
                }
            }
            Insn::Mfmsr { rd } => self.set_gpr(ir, rd, self.msr),
            Insn::Mfcr { rd } => self.set_gpr(ir, rd, self.cr),
            Insn::Mtcrf { rs, crm } => {
                let mask = crm_mask(crm);
                let kept = self.binop_imm(ir, Context::gen_and, self.cr, !mask);
                let ins = self.binop_imm(ir, Context::gen_and, self.gpr[rs as usize], mask);
                ir.gen_or(self.cr, kept, ins);
            }
            Insn::Mtmsr { rs } => {
                ir.gen_mov(self.msr, self.gpr[rs as usize]);
                let next = self.cur_pc().wrapping_add(4);
                self.gen_set_pc(ir, next);
                let v = ir.new_const(next);
                self.gen_exit(ir, ExitKind::CheckExternal, v);
                self.base.is_jmp = DisasJumpType::NoReturn;
            }
            Insn::Rfi => {
                let kept = self.binop_imm(ir, Context::gen_and, self.msr, !RFI_MSR_MASK);
                let restored = self.binop_imm(ir, Context::gen_and, self.srr1, RFI_MSR_MASK);
                let m = self.binop(ir, Context::gen_or, kept, restored);
                ir.gen_andi(self.msr, m, 0xFFFB_FFFF);
                let t = self.binop_imm(ir, Context::gen_and, self.srr0, !3);
                ir.gen_mov(self.pc, t);
                self.gen_exit(ir, ExitKind::CheckExternal, t);
                self.base.is_jmp = DisasJumpType::NoReturn;
            }
            Insn::Sc => {
                let next = self.cur_pc().wrapping_add(4);
                self.gen_raise(ir, ExceptionFlags::SYSCALL, next);
            }

            Insn::Icbi { ra, rb } => {
                let addr = self.gen_ea(ir, ra, Ea::Indexed(rb));
                let next = self.cur_pc().wrapping_add(4);
                self.gen_set_pc(ir, next);
                self.gen_exit(ir, ExitKind::InvalidateLine, addr);
                self.base.is_jmp = DisasJumpType::NoReturn;
            }
            Insn::Dcbz { ra, rb } => {
                let ea = self.gen_ea(ir, ra, Ea::Indexed(rb));
                let line = self.binop_imm(ir, Context::gen_and, ea, !31);
                let zero = ir.new_const(0);
                for i in 0..8u32 {
                    let addr = self.binop_imm(ir, Context::gen_add, line, i * 4);
                    ir.gen_st(MemOp::U32, zero, addr);
                }
            }
            Insn::Nop => {}
            Insn::Illegal(word) => {
                tracing::warn!(
                    pc = format_args!("{:#010x}", self.cur_pc()),
                    word = format_args!("{word:#010x}"),
                    "unimplemented instruction"
                );
                let pc = self.cur_pc();
                self.gen_raise(ir, ExceptionFlags::PROGRAM, pc);
            }
        }
    }
}
