// Block IR optimizer: single forward pass of constant folding, copy
// propagation and algebraic simplification. Runs before lowering.

use ppc_core::{Cond, Context, OpFlags, OpIdx, Opcode, TempIdx, MAX_OP_ARGS};

/// Per-temp optimization info tracked during the pass.
#[derive(Clone, Copy, Default)]
struct TempInfo {
    is_const: bool,
    val: u32,
    /// Canonical copy source (None = no known copy).
    copy_of: Option<TempIdx>,
}

type Args = [TempIdx; MAX_OP_ARGS];

/// Main optimizer entry point.
///
/// Facts are only carried forward within a straight-line region; any
/// label, branch or exit starts over with nothing known except the
/// constant temps themselves.
pub fn optimize(ctx: &mut Context) {
    let mut info = seed(ctx);

    for oi in 0..ctx.num_ops() {
        let op_idx = OpIdx(oi as u32);
        let opc = ctx.op(op_idx).opc;
        let def = opc.def();

        if matches!(opc, Opcode::SetLabel | Opcode::Br | Opcode::ExitTb) {
            if opc == Opcode::ExitTb {
                propagate_inputs(ctx, &info, op_idx);
            }
            info = seed(ctx);
            continue;
        }
        if matches!(opc, Opcode::Nop | Opcode::InsnStart) {
            continue;
        }

        propagate_inputs(ctx, &info, op_idx);
        let args = ctx.op(op_idx).args;

        match opc {
            Opcode::Mov => fold_mov(&mut info, args),
            Opcode::BrCond => fold_brcond(ctx, &info, op_idx, args),
            Opcode::SetCond => fold_setcond(ctx, &mut info, op_idx, args),
            _ if opc.is_binary_alu() => fold_binary(ctx, &mut info, op_idx, opc, args),
            _ if opc.is_unary_alu() => fold_unary(ctx, &mut info, op_idx, opc, args),
            _ => {
                debug_assert!(def.flags.contains(OpFlags::MEM) || def.nb_oargs == 0);
                for &t in &args[..def.nb_oargs as usize] {
                    invalidate_one(&mut info, t);
                }
            }
        }
    }
}

/// Fresh info vector knowing only the constant temps.
fn seed(ctx: &Context) -> Vec<TempInfo> {
    ctx.temps()
        .iter()
        .map(|t| TempInfo {
            is_const: t.is_const(),
            val: t.val,
            copy_of: None,
        })
        .collect()
}

/// Rewrite input arguments to their canonical copy sources.
fn propagate_inputs(ctx: &mut Context, info: &[TempInfo], op_idx: OpIdx) {
    let def = ctx.op(op_idx).opc.def();
    let start = def.nb_oargs as usize;
    let end = start + def.nb_iargs as usize;
    for slot in start..end {
        let t = ctx.op(op_idx).args[slot];
        if let Some(src) = ti(info, t).copy_of {
            ctx.op_mut(op_idx).args[slot] = src;
        }
    }
}

// ---- Helper functions ----

fn ti(info: &[TempInfo], tidx: TempIdx) -> TempInfo {
    info.get(tidx.0 as usize).copied().unwrap_or_default()
}

fn ensure_info(info: &mut Vec<TempInfo>, idx: usize) {
    if idx >= info.len() {
        info.resize(idx + 1, TempInfo::default());
    }
}

/// Forget everything about `dst` and any temp copied from it.
fn invalidate_one(info: &mut Vec<TempInfo>, dst: TempIdx) {
    let i = dst.0 as usize;
    ensure_info(info, i);
    info[i].is_const = false;
    info[i].copy_of = None;
    for t in info.iter_mut() {
        if t.copy_of == Some(dst) {
            t.copy_of = None;
        }
    }
}

fn set_const(info: &mut Vec<TempInfo>, dst: TempIdx, val: u32) {
    invalidate_one(info, dst);
    let i = dst.0 as usize;
    info[i].is_const = true;
    info[i].val = val;
}

/// Replace op with `mov dst, $val`.
fn replace_with_const(
    ctx: &mut Context,
    info: &mut Vec<TempInfo>,
    op_idx: OpIdx,
    dst: TempIdx,
    val: u32,
) {
    let c = ctx.new_const(val);
    ensure_info(info, c.0 as usize);
    info[c.0 as usize].is_const = true;
    info[c.0 as usize].val = val;

    let op = ctx.op_mut(op_idx);
    op.opc = Opcode::Mov;
    op.args[0] = dst;
    op.args[1] = c;
    op.nargs = 2;

    set_const(info, dst, val);
}

/// Replace op with `mov dst, src`.
fn replace_with_mov(
    ctx: &mut Context,
    info: &mut Vec<TempInfo>,
    op_idx: OpIdx,
    dst: TempIdx,
    src: TempIdx,
) {
    let op = ctx.op_mut(op_idx);
    op.opc = Opcode::Mov;
    op.args[0] = dst;
    op.args[1] = src;
    op.nargs = 2;
    fold_mov(info, op.args);
}

// ---- Per-opcode fold functions ----

fn fold_mov(info: &mut Vec<TempInfo>, args: Args) {
    let (dst, src) = (args[0], args[1]);
    let si = ti(info, src);
    invalidate_one(info, dst);
    if dst == src {
        return;
    }
    let i = dst.0 as usize;
    if si.is_const {
        info[i].is_const = true;
        info[i].val = si.val;
    } else {
        info[i].copy_of = Some(src);
    }
}

fn fold_unary(ctx: &mut Context, info: &mut Vec<TempInfo>, op_idx: OpIdx, opc: Opcode, args: Args) {
    let (dst, src) = (args[0], args[1]);
    let si = ti(info, src);
    match opc.eval_unary(si.val) {
        Some(val) if si.is_const => replace_with_const(ctx, info, op_idx, dst, val),
        _ => invalidate_one(info, dst),
    }
}

fn fold_binary(ctx: &mut Context, info: &mut Vec<TempInfo>, op_idx: OpIdx, opc: Opcode, args: Args) {
    let (dst, a_idx, b_idx) = (args[0], args[1], args[2]);
    let ai = ti(info, a_idx);
    let bi = ti(info, b_idx);

    if ai.is_const && bi.is_const {
        if let Some(val) = opc.eval_binary(ai.val, bi.val) {
            replace_with_const(ctx, info, op_idx, dst, val);
            return;
        }
    }

    if bi.is_const {
        let b = bi.val;
        match opc {
            // x op 0 -> x
            Opcode::Add
            | Opcode::Sub
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Shl
            | Opcode::Shr
            | Opcode::Sar
            | Opcode::RotL
                if b == 0 =>
            {
                return replace_with_mov(ctx, info, op_idx, dst, a_idx);
            }
            Opcode::Mul | Opcode::And if b == 0 => {
                return replace_with_const(ctx, info, op_idx, dst, 0);
            }
            Opcode::Mul if b == 1 => return replace_with_mov(ctx, info, op_idx, dst, a_idx),
            Opcode::And if b == u32::MAX => return replace_with_mov(ctx, info, op_idx, dst, a_idx),
            Opcode::Or if b == u32::MAX => {
                return replace_with_const(ctx, info, op_idx, dst, u32::MAX);
            }
            _ => {}
        }
    }

    if ai.is_const {
        let a = ai.val;
        match opc {
            Opcode::Add | Opcode::Or | Opcode::Xor if a == 0 => {
                return replace_with_mov(ctx, info, op_idx, dst, b_idx);
            }
            Opcode::Mul | Opcode::And | Opcode::Shl | Opcode::Shr if a == 0 => {
                return replace_with_const(ctx, info, op_idx, dst, 0);
            }
            _ => {}
        }
    }

    if a_idx == b_idx {
        match opc {
            Opcode::And | Opcode::Or => return replace_with_mov(ctx, info, op_idx, dst, a_idx),
            Opcode::Xor | Opcode::Sub => return replace_with_const(ctx, info, op_idx, dst, 0),
            _ => {}
        }
    }

    invalidate_one(info, dst);
}

fn fold_setcond(ctx: &mut Context, info: &mut Vec<TempInfo>, op_idx: OpIdx, args: Args) {
    let (dst, a_idx, b_idx) = (args[0], args[1], args[2]);
    let ai = ti(info, a_idx);
    let bi = ti(info, b_idx);
    match Cond::from_u32(args[3].0) {
        Some(cond) if ai.is_const && bi.is_const => {
            let val = cond.eval(ai.val, bi.val) as u32;
            replace_with_const(ctx, info, op_idx, dst, val);
        }
        _ => invalidate_one(info, dst),
    }
}

/// Fold `brcond` when both inputs are constant.
fn fold_brcond(ctx: &mut Context, info: &[TempInfo], op_idx: OpIdx, args: Args) {
    let ai = ti(info, args[0]);
    let bi = ti(info, args[1]);
    if !ai.is_const || !bi.is_const {
        return;
    }
    let Some(cond) = Cond::from_u32(args[2].0) else {
        return;
    };
    let label = args[3];
    let op = ctx.op_mut(op_idx);
    if cond.eval(ai.val, bi.val) {
        op.opc = Opcode::Br;
        op.args[0] = label;
        op.nargs = 1;
    } else {
        op.opc = Opcode::Nop;
        op.nargs = 0;
    }
}
