use crate::context::Context;
use crate::op::Op;
use crate::opcode::Opcode;
use crate::temp::TempIdx;
use crate::types::{Cond, ExitKind, MemOp};

// Constant args are encoded as TempIdx(raw_value).
fn carg(val: u32) -> TempIdx {
    TempIdx(val)
}

impl Context {
    // -- Internal helpers --

    fn emit_binary(&mut self, opc: Opcode, dst: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        let idx = self.next_op_idx();
        self.emit_op(Op::with_args(idx, opc, &[dst, a, b]));
        dst
    }

    fn emit_unary(&mut self, opc: Opcode, dst: TempIdx, src: TempIdx) -> TempIdx {
        let idx = self.next_op_idx();
        self.emit_op(Op::with_args(idx, opc, &[dst, src]));
        dst
    }

    fn emit_binary_imm(&mut self, opc: Opcode, dst: TempIdx, a: TempIdx, imm: u32) -> TempIdx {
        let c = self.new_const(imm);
        self.emit_binary(opc, dst, a, c)
    }

    // -- Data movement --

    pub fn gen_mov(&mut self, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::Mov, d, s)
    }

    pub fn gen_movi(&mut self, d: TempIdx, val: u32) -> TempIdx {
        let c = self.new_const(val);
        self.emit_unary(Opcode::Mov, d, c)
    }

    pub fn gen_setcond(&mut self, cond: Cond, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        let idx = self.next_op_idx();
        self.emit_op(Op::with_args(
            idx,
            Opcode::SetCond,
            &[d, a, b, carg(cond as u32)],
        ));
        d
    }

    // -- Binary ALU (1 oarg, 2 iargs) --

    pub fn gen_add(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::Add, d, a, b)
    }

    pub fn gen_sub(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::Sub, d, a, b)
    }

    pub fn gen_mul(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::Mul, d, a, b)
    }

    pub fn gen_mulsh(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::MulSH, d, a, b)
    }

    pub fn gen_muluh(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::MulUH, d, a, b)
    }

    pub fn gen_divs(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::DivS, d, a, b)
    }

    pub fn gen_divu(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::DivU, d, a, b)
    }

    pub fn gen_and(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::And, d, a, b)
    }

    pub fn gen_or(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::Or, d, a, b)
    }

    pub fn gen_xor(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::Xor, d, a, b)
    }

    pub fn gen_andc(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::AndC, d, a, b)
    }

    pub fn gen_orc(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::OrC, d, a, b)
    }

    pub fn gen_eqv(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::Eqv, d, a, b)
    }

    pub fn gen_nand(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::Nand, d, a, b)
    }

    pub fn gen_nor(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::Nor, d, a, b)
    }

    pub fn gen_shl(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::Shl, d, a, b)
    }

    pub fn gen_shr(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::Shr, d, a, b)
    }

    pub fn gen_sar(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::Sar, d, a, b)
    }

    pub fn gen_rotl(&mut self, d: TempIdx, a: TempIdx, b: TempIdx) -> TempIdx {
        self.emit_binary(Opcode::RotL, d, a, b)
    }

    // -- Binary ALU with an immediate second operand --

    pub fn gen_addi(&mut self, d: TempIdx, a: TempIdx, imm: u32) -> TempIdx {
        self.emit_binary_imm(Opcode::Add, d, a, imm)
    }

    pub fn gen_muli(&mut self, d: TempIdx, a: TempIdx, imm: u32) -> TempIdx {
        self.emit_binary_imm(Opcode::Mul, d, a, imm)
    }

    pub fn gen_andi(&mut self, d: TempIdx, a: TempIdx, imm: u32) -> TempIdx {
        self.emit_binary_imm(Opcode::And, d, a, imm)
    }

    pub fn gen_ori(&mut self, d: TempIdx, a: TempIdx, imm: u32) -> TempIdx {
        self.emit_binary_imm(Opcode::Or, d, a, imm)
    }

    pub fn gen_xori(&mut self, d: TempIdx, a: TempIdx, imm: u32) -> TempIdx {
        self.emit_binary_imm(Opcode::Xor, d, a, imm)
    }

    pub fn gen_shli(&mut self, d: TempIdx, a: TempIdx, imm: u32) -> TempIdx {
        self.emit_binary_imm(Opcode::Shl, d, a, imm)
    }

    pub fn gen_shri(&mut self, d: TempIdx, a: TempIdx, imm: u32) -> TempIdx {
        self.emit_binary_imm(Opcode::Shr, d, a, imm)
    }

    pub fn gen_sari(&mut self, d: TempIdx, a: TempIdx, imm: u32) -> TempIdx {
        self.emit_binary_imm(Opcode::Sar, d, a, imm)
    }

    pub fn gen_rotli(&mut self, d: TempIdx, a: TempIdx, imm: u32) -> TempIdx {
        self.emit_binary_imm(Opcode::RotL, d, a, imm)
    }

    // -- Unary --

    pub fn gen_neg(&mut self, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::Neg, d, s)
    }

    pub fn gen_not(&mut self, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::Not, d, s)
    }

    pub fn gen_clz(&mut self, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::Clz, d, s)
    }

    pub fn gen_ext8s(&mut self, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::Ext8S, d, s)
    }

    pub fn gen_ext16s(&mut self, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit_unary(Opcode::Ext16S, d, s)
    }

    // -- Guest memory --

    pub fn gen_ld(&mut self, memop: MemOp, d: TempIdx, addr: TempIdx) -> TempIdx {
        let idx = self.next_op_idx();
        self.emit_op(Op::with_args(
            idx,
            Opcode::Ld,
            &[d, addr, carg(memop as u32)],
        ));
        d
    }

    pub fn gen_st(&mut self, memop: MemOp, val: TempIdx, addr: TempIdx) {
        let idx = self.next_op_idx();
        self.emit_op(Op::with_args(
            idx,
            Opcode::St,
            &[val, addr, carg(memop as u32)],
        ));
    }

    // -- Control flow --

    pub fn gen_br(&mut self, label: u32) {
        let idx = self.next_op_idx();
        self.emit_op(Op::with_args(idx, Opcode::Br, &[carg(label)]));
    }

    pub fn gen_brcond(&mut self, cond: Cond, a: TempIdx, b: TempIdx, label: u32) {
        let idx = self.next_op_idx();
        self.emit_op(Op::with_args(
            idx,
            Opcode::BrCond,
            &[a, b, carg(cond as u32), carg(label)],
        ));
    }

    pub fn gen_brcondi(&mut self, cond: Cond, a: TempIdx, imm: u32, label: u32) {
        let c = self.new_const(imm);
        self.gen_brcond(cond, a, c, label);
    }

    pub fn gen_set_label(&mut self, label: u32) {
        self.label_mut(label).placed = true;
        let idx = self.next_op_idx();
        self.emit_op(Op::with_args(idx, Opcode::SetLabel, &[carg(label)]));
    }

    /// Return to the dispatcher, charging `cost` cycles.
    pub fn gen_exit_tb(&mut self, kind: ExitKind, val: TempIdx, cost: u32) {
        let idx = self.next_op_idx();
        self.emit_op(Op::with_args(
            idx,
            Opcode::ExitTb,
            &[val, carg(kind as u32), carg(cost)],
        ));
    }

    // -- Misc --

    /// Mark a guest instruction boundary. `cost` is the cycle total
    /// charged if the block stops inside this instruction.
    pub fn gen_insn_start(&mut self, pc: u32, cost: u32) {
        let idx = self.next_op_idx();
        self.emit_op(Op::with_args(
            idx,
            Opcode::InsnStart,
            &[carg(pc), carg(cost)],
        ));
    }

    pub fn gen_nop(&mut self) {
        let idx = self.next_op_idx();
        self.emit_op(Op::new(idx, Opcode::Nop));
    }
}
